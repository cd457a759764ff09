//! Discord rich-text document tree.
//!
//! [`parse`] turns message content into a list of [`Node`]s; [`walk`]
//! visits them in pre-order, reporting container nodes twice (enter and
//! exit) and leaves once.

mod parser;

pub use parser::parse;

/// One node of a parsed Discord message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Literal text.
    Text(String),
    /// `**…**`
    Bold(Vec<Node>),
    /// `*…*` or `_…_`
    Italic(Vec<Node>),
    /// `__…__`
    Underline(Vec<Node>),
    /// `~~…~~`
    Strikethrough(Vec<Node>),
    /// `||…||`
    Spoiler(Vec<Node>),
    /// `> …` (one line) or `>>> …` (rest of the message)
    BlockQuote(Vec<Node>),
    /// Inline code or a fenced block with an optional language tag.
    Code {
        language: Option<String>,
        content: String,
    },
    /// A bare or `<…>`-wrapped link.
    Url(String),
    /// Custom emoji `<:name:id>` / `<a:name:id>`.
    Emoji {
        name: String,
        id: String,
        animated: bool,
    },
    /// `<#id>`
    ChannelMention(String),
    /// `<@&id>`
    RoleMention(String),
    /// `<@id>` or `<@!id>`
    UserMention(String),
    /// `@everyone` / `@here`, stored without the `@`.
    SpecialMention(String),
    /// `<t:stamp>` or `<t:stamp:style>`; `stamp` is kept unparsed.
    Timestamp {
        stamp: String,
        format: Option<String>,
    },
}

impl Node {
    /// Children of a container node; `None` for leaves.
    pub fn children(&self) -> Option<&[Node]> {
        match self {
            Node::Bold(children)
            | Node::Italic(children)
            | Node::Underline(children)
            | Node::Strikethrough(children)
            | Node::Spoiler(children)
            | Node::BlockQuote(children) => Some(children),
            Node::Text(_)
            | Node::Code { .. }
            | Node::Url(_)
            | Node::Emoji { .. }
            | Node::ChannelMention(_)
            | Node::RoleMention(_)
            | Node::UserMention(_)
            | Node::SpecialMention(_)
            | Node::Timestamp { .. } => None,
        }
    }
}

/// Visit `nodes` in pre-order.
///
/// The callback receives `(node, entering)`. Containers are reported with
/// `entering == true` before their children and `false` after; leaves are
/// reported once with `true`.
pub fn walk<'a, F>(nodes: &'a [Node], visit: &mut F)
where
    F: FnMut(&'a Node, bool),
{
    for node in nodes {
        match node.children() {
            Some(children) => {
                visit(node, true);
                walk(children, visit);
                visit(node, false);
            }
            None => visit(node, true),
        }
    }
}
