//! Discord document tree to IRC control-code text.

use chrono::{DateTime, FixedOffset, Offset, Utc};

use crate::codes::{self, ch};
use crate::markdown::{self, Node};
use crate::roster::GuildSnapshot;
use crate::timestamp;

/// Lookup and clock state for one rendering.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'g> {
    /// Guild the message was posted in; `None` renders every mention as
    /// a placeholder.
    pub guild: Option<&'g GuildSnapshot>,
    pub now: DateTime<Utc>,
    /// Zone timestamps are shown in.
    pub offset: FixedOffset,
}

impl<'g> RenderContext<'g> {
    /// Context rendering timestamps in UTC relative to the current time.
    pub fn new(guild: Option<&'g GuildSnapshot>) -> Self {
        Self {
            guild,
            now: Utc::now(),
            offset: Utc.fix(),
        }
    }
}

/// Parse Discord message content and render it for IRC.
pub fn discord_to_irc(content: &str, ctx: &RenderContext<'_>) -> String {
    render_irc(&markdown::parse(content), ctx)
}

/// Render a document tree as IRC control-code text.
///
/// Emphasis containers emit the same toggle byte on entry and exit.
/// Unresolvable mentions and timestamps become placeholders.
///
/// Mentions are looked up in `ctx.guild` only. A channel or role from
/// another guild renders as a placeholder even if the roster cache knows
/// it.
pub fn render_irc(nodes: &[Node], ctx: &RenderContext<'_>) -> String {
    let mut out = String::new();
    markdown::walk(nodes, &mut |node, entering| match node {
        Node::Bold(_) => out.push(ch(codes::BOLD)),
        Node::Italic(_) => out.push(ch(codes::ITALIC)),
        Node::Underline(_) => out.push(ch(codes::UNDERLINE)),
        Node::Strikethrough(_) => out.push(ch(codes::STRIKETHROUGH)),
        Node::Spoiler(_) if entering => {
            out.push(ch(codes::REVERSE));
            out.push_str("||");
        }
        Node::Spoiler(_) => {
            out.push_str("||");
            out.push(ch(codes::REVERSE));
        }
        Node::BlockQuote(_) => out.push(if entering { '“' } else { '”' }),
        Node::Text(text) | Node::Url(text) => out.push_str(text),
        Node::Code { language, content } => {
            out.push(ch(codes::MONOSPACE));
            out.push('`');
            if let Some(lang) = language {
                out.push_str(lang);
                out.push(' ');
            }
            out.push_str(content);
            out.push('`');
            out.push(ch(codes::MONOSPACE));
        }
        Node::Emoji { name, .. } => {
            out.push(':');
            out.push_str(name);
            out.push(':');
        }
        Node::ChannelMention(id) => {
            match ctx.guild.and_then(|g| g.channel(id)).and_then(|c| c.name.as_deref()) {
                Some(name) => {
                    out.push('#');
                    out.push_str(name);
                }
                None => out.push_str("#invalid-channel"),
            }
        }
        Node::RoleMention(id) => match ctx.guild.and_then(|g| g.role(id)) {
            Some(role) => {
                out.push('@');
                out.push_str(&role.name);
            }
            None => out.push_str("@invalid-role"),
        },
        Node::UserMention(id) => match ctx.guild.and_then(|g| g.member(id)) {
            Some(member) => {
                out.push('@');
                out.push_str(member.display_name());
            }
            None => out.push_str("@invalid-user"),
        },
        Node::SpecialMention(name) => {
            out.push('@');
            out.push_str(name);
        }
        Node::Timestamp { stamp, format } => {
            match timestamp::render(stamp, format.as_deref(), ctx.now, ctx.offset) {
                Some(text) => out.push_str(&text),
                None => out.push_str("<invalid-timestamp>"),
            }
        }
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::{ChannelEntry, Member, Role, User};

    fn text(s: &str) -> Node {
        Node::Text(s.into())
    }

    fn guild() -> GuildSnapshot {
        GuildSnapshot {
            id: "1".into(),
            members: vec![
                Member {
                    user: User {
                        id: "100".into(),
                        username: "alice".into(),
                        ..User::default()
                    },
                    nick: Some("Ally".into()),
                    roles: vec![],
                },
                Member {
                    user: User {
                        id: "101".into(),
                        username: "bob".into(),
                        ..User::default()
                    },
                    nick: None,
                    roles: vec![],
                },
            ],
            roles: vec![Role {
                id: "10".into(),
                name: "mods".into(),
                ..Role::default()
            }],
            emojis: vec![],
            channels: vec![ChannelEntry {
                id: "50".into(),
                name: Some("general".into()),
            }],
        }
    }

    fn ctx(guild: Option<&GuildSnapshot>) -> RenderContext<'_> {
        RenderContext {
            guild,
            now: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            offset: Utc.fix(),
        }
    }

    #[test]
    fn bold_toggles_on_both_sides() {
        let tree = vec![Node::Bold(vec![text("hi")])];
        assert_eq!(render_irc(&tree, &ctx(None)), "\x02hi\x02");
    }

    #[test]
    fn nested_emphasis() {
        let tree = vec![Node::Italic(vec![
            text("a "),
            Node::Underline(vec![text("b")]),
            Node::Strikethrough(vec![text("c")]),
        ])];
        assert_eq!(
            render_irc(&tree, &ctx(None)),
            "\x1Da \x1Fb\x1F\x1Ec\x1E\x1D"
        );
    }

    #[test]
    fn code_quote_and_spoiler() {
        let tree = vec![
            Node::Code {
                language: Some("rs".into()),
                content: "x".into(),
            },
            Node::BlockQuote(vec![text("q")]),
            Node::Spoiler(vec![text("s")]),
        ];
        assert_eq!(
            render_irc(&tree, &ctx(None)),
            "\x11`rs x`\x11“q”\x16||s||\x16"
        );
    }

    #[test]
    fn mentions_resolve_against_guild() {
        let g = guild();
        let tree = vec![
            Node::UserMention("100".into()),
            text(" "),
            Node::UserMention("101".into()),
            text(" "),
            Node::RoleMention("10".into()),
            text(" "),
            Node::ChannelMention("50".into()),
            text(" "),
            Node::SpecialMention("here".into()),
            text(" "),
            Node::Emoji {
                name: "kek".into(),
                id: "9".into(),
                animated: false,
            },
        ];
        assert_eq!(
            render_irc(&tree, &ctx(Some(&g))),
            "@Ally @bob @mods #general @here :kek:"
        );
    }

    #[test]
    fn channel_of_another_guild_is_a_placeholder() {
        let other = GuildSnapshot {
            id: "2".into(),
            channels: vec![ChannelEntry {
                id: "77".into(),
                name: Some("elsewhere".into()),
            }],
            ..GuildSnapshot::default()
        };
        let tree = vec![Node::ChannelMention("77".into())];
        assert_eq!(render_irc(&tree, &ctx(Some(&other))), "#elsewhere");
        assert_eq!(render_irc(&tree, &ctx(Some(&guild()))), "#invalid-channel");
    }

    #[test]
    fn unresolved_references_use_placeholders() {
        let g = guild();
        let tree = vec![
            Node::UserMention("999".into()),
            Node::RoleMention("999".into()),
            Node::ChannelMention("999".into()),
            Node::Timestamp {
                stamp: "nope".into(),
                format: None,
            },
        ];
        let expected = "@invalid-user@invalid-role#invalid-channel<invalid-timestamp>";
        assert_eq!(render_irc(&tree, &ctx(Some(&g))), expected);
        assert_eq!(render_irc(&tree, &ctx(None)), expected);
    }

    #[test]
    fn timestamps_render() {
        let tree = vec![Node::Timestamp {
            stamp: "1700000000".into(),
            format: Some("t".into()),
        }];
        assert_eq!(render_irc(&tree, &ctx(None)), "22:13 UTC");
    }

    #[test]
    fn parse_and_render() {
        let g = guild();
        assert_eq!(
            discord_to_irc("**hey** <@100>, see <#50>", &ctx(Some(&g))),
            "\x02hey\x02 @Ally, see #general"
        );
    }
}
