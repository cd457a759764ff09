//! Parser for the Discord markdown dialect.
//!
//! Recursive descent with backtracking: an opening delimiter becomes a
//! container only if its closer is found at the same nesting level,
//! otherwise it is kept as literal text. A step budget bounds the work
//! spent on adversarial inputs; once it runs out, remaining delimiters
//! are treated as text.

use std::sync::LazyLock;

use regex::Regex;

use super::Node;

const MAX_DEPTH: usize = 16;

static BARE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^https?://[^\s<]+[^<.,:;"')\]\s]"#).expect("valid URL regex")
});

static ANGLE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^<(?:",
        r"@&(?P<role>\d+)",
        r"|@!?(?P<user>\d+)",
        r"|#(?P<channel>\d+)",
        r"|(?P<anim>a?):(?P<ename>\w+):(?P<eid>\d+)",
        r"|t:(?P<stamp>-?\d+)(?::(?P<style>[A-Za-z]))?",
        r"|(?P<url>https?://[^\s>]+)",
        r")>",
    ))
    .expect("valid token regex")
});

/// Language tag of a fenced code block.
static CODE_LANG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z0-9_+#.\-]+)\n").expect("valid language regex"));

/// Parse Discord message content into a document tree.
pub fn parse(input: &str) -> Vec<Node> {
    let mut parser = Parser {
        src: input,
        pos: 0,
        end: input.len(),
        depth: 0,
        budget: input.len().saturating_mul(64).saturating_add(1024),
    };
    parser.document()
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    /// Exclusive limit for the current inline run.
    end: usize,
    depth: usize,
    budget: usize,
}

impl<'a> Parser<'a> {
    fn document(&mut self) -> Vec<Node> {
        let len = self.src.len();
        let mut nodes = Vec::new();
        while self.pos < len {
            let rest = &self.src[self.pos..];
            if rest.starts_with(">>> ") {
                self.pos += 4;
                self.end = len;
                let inner = self.inline_run();
                nodes.push(Node::BlockQuote(inner));
                break;
            }
            if rest.starts_with("> ") {
                let line_end = rest.find('\n').map_or(len, |i| self.pos + i);
                self.pos += 2;
                self.end = line_end;
                let inner = self.inline_run();
                nodes.push(Node::BlockQuote(inner));
                self.pos = line_end;
                if line_end < len {
                    push_text(&mut nodes, "\n");
                    self.pos += 1;
                }
                continue;
            }
            self.end = self.next_quote_line().unwrap_or(len);
            for node in self.inline_run() {
                match node {
                    Node::Text(text) => push_text(&mut nodes, &text),
                    other => nodes.push(other),
                }
            }
            self.pos = self.end;
        }
        nodes
    }

    /// Start of the next line (after the current position) that opens a quote.
    fn next_quote_line(&self) -> Option<usize> {
        let rest = &self.src[self.pos..];
        rest.match_indices('\n')
            .map(|(i, _)| self.pos + i + 1)
            .find(|&start| {
                let line = &self.src[start..];
                line.starts_with("> ") || line.starts_with(">>> ")
            })
    }

    fn inline_run(&mut self) -> Vec<Node> {
        self.inline(None).unwrap_or_default()
    }

    /// Parse inline content until `closer` (or the end for `None`).
    ///
    /// Returns `None` when a closer was required but not found.
    fn inline(&mut self, closer: Option<&'static str>) -> Option<Vec<Node>> {
        let mut nodes = Vec::new();
        let mut text = String::new();

        while self.pos < self.end {
            self.budget = self.budget.saturating_sub(1);
            let rest = &self.src[self.pos..self.end];

            if let Some(escaped) = escaped_char(rest) {
                text.push(escaped);
                self.pos += 1 + escaped.len_utf8();
                continue;
            }

            if let Some(delim) = closer
                && rest.starts_with(delim)
            {
                if let Some(double) = doubled(delim)
                    && rest.starts_with(double)
                    && let Some(node) = self.container(double)
                {
                    flush(&mut nodes, &mut text);
                    nodes.push(node);
                    continue;
                }
                if delim != "_" || !self.word_char_at(self.pos + 1) {
                    self.pos += delim.len();
                    flush(&mut nodes, &mut text);
                    return Some(nodes);
                }
            }

            if let Some(node) = self.leaf(rest) {
                flush(&mut nodes, &mut text);
                nodes.push(node);
                continue;
            }

            let mut matched = false;
            for delim in ["||", "~~", "**", "__", "*", "_"] {
                if rest.starts_with(delim)
                    && let Some(node) = self.container(delim)
                {
                    flush(&mut nodes, &mut text);
                    nodes.push(node);
                    matched = true;
                    break;
                }
            }
            if matched {
                continue;
            }

            // Unmatched delimiter runs are consumed whole so a later
            // attempt does not split them.
            let literal_len = ["||", "~~", "**", "__"]
                .iter()
                .find(|d| rest.starts_with(**d))
                .map_or_else(|| rest.chars().next().map_or(1, char::len_utf8), |d| d.len());
            text.push_str(&rest[..literal_len]);
            self.pos += literal_len;
        }

        if closer.is_some() {
            return None;
        }
        flush(&mut nodes, &mut text);
        Some(nodes)
    }

    /// Try to open a container at the current position.
    fn container(&mut self, delim: &'static str) -> Option<Node> {
        if self.depth >= MAX_DEPTH || self.budget == 0 {
            return None;
        }
        let after = self.pos + delim.len();
        if !self.src[after..self.end].contains(delim) {
            return None;
        }
        if delim == "_" && self.pos > 0 && self.word_char_before(self.pos) {
            return None;
        }

        let saved = self.pos;
        self.pos = after;
        self.depth += 1;
        let inner = self.inline(Some(delim));
        self.depth -= 1;

        match inner {
            Some(children) if !children.is_empty() => Some(wrap(delim, children)),
            _ => {
                self.pos = saved;
                None
            }
        }
    }

    /// Leaf constructs: code, angle-bracket tokens, bare URLs, `@everyone`.
    fn leaf(&mut self, rest: &str) -> Option<Node> {
        match rest.as_bytes().first()? {
            b'`' => self.code(rest),
            b'<' => self.angle_token(rest),
            b'h' => {
                let m = BARE_URL.find(rest)?;
                self.pos += m.end();
                Some(Node::Url(m.as_str().to_owned()))
            }
            b'@' => ["everyone", "here"].into_iter().find_map(|name| {
                rest[1..].starts_with(name).then(|| {
                    self.pos += 1 + name.len();
                    Node::SpecialMention(name.to_owned())
                })
            }),
            _ => None,
        }
    }

    fn code(&mut self, rest: &str) -> Option<Node> {
        if let Some(body) = rest.strip_prefix("```")
            && let Some(close) = body.find("```")
            && close > 0
        {
            let inner = &body[..close];
            self.pos += 3 + close + 3;
            let (language, content) = match CODE_LANG.captures(inner) {
                Some(caps) if caps.get(0).is_some_and(|m| m.end() < inner.len()) => {
                    let whole = caps.get(0).map_or(0, |m| m.end());
                    (caps.get(1).map(|m| m.as_str().to_owned()), &inner[whole..])
                }
                _ => (None, inner.strip_prefix('\n').unwrap_or(inner)),
            };
            let content = content.strip_suffix('\n').unwrap_or(content);
            return Some(Node::Code {
                language,
                content: content.to_owned(),
            });
        }

        let ticks = if rest.starts_with("``") { "``" } else { "`" };
        let body = &rest[ticks.len()..];
        let close = body.find(ticks)?;
        if close == 0 {
            return None;
        }
        self.pos += ticks.len() * 2 + close;
        Some(Node::Code {
            language: None,
            content: body[..close].to_owned(),
        })
    }

    fn angle_token(&mut self, rest: &str) -> Option<Node> {
        let caps = ANGLE_TOKEN.captures(rest)?;
        let whole = caps.get(0)?;
        let text = |name: &str| caps.name(name).map(|m| m.as_str().to_owned());

        let node = if let Some(id) = text("role") {
            Node::RoleMention(id)
        } else if let Some(id) = text("user") {
            Node::UserMention(id)
        } else if let Some(id) = text("channel") {
            Node::ChannelMention(id)
        } else if let (Some(name), Some(id)) = (text("ename"), text("eid")) {
            Node::Emoji {
                name,
                id,
                animated: caps.name("anim").is_some_and(|m| !m.as_str().is_empty()),
            }
        } else if let Some(stamp) = text("stamp") {
            Node::Timestamp {
                stamp,
                format: text("style"),
            }
        } else {
            Node::Url(text("url")?)
        };
        self.pos += whole.end();
        Some(node)
    }

    fn word_char_at(&self, at: usize) -> bool {
        self.src[at.min(self.end)..self.end]
            .chars()
            .next()
            .is_some_and(char::is_alphanumeric)
    }

    fn word_char_before(&self, at: usize) -> bool {
        self.src[..at].chars().next_back().is_some_and(char::is_alphanumeric)
    }
}

/// A backslash followed by ASCII punctuation yields that character.
fn escaped_char(rest: &str) -> Option<char> {
    let mut chars = rest.chars();
    if chars.next()? != '\\' {
        return None;
    }
    chars.next().filter(char::is_ascii_punctuation)
}

fn doubled(delim: &str) -> Option<&'static str> {
    match delim {
        "*" => Some("**"),
        "_" => Some("__"),
        _ => None,
    }
}

fn wrap(delim: &str, children: Vec<Node>) -> Node {
    match delim {
        "**" => Node::Bold(children),
        "__" => Node::Underline(children),
        "~~" => Node::Strikethrough(children),
        "||" => Node::Spoiler(children),
        _ => Node::Italic(children),
    }
}

fn flush(nodes: &mut Vec<Node>, text: &mut String) {
    if !text.is_empty() {
        push_text(nodes, text);
        text.clear();
    }
}

fn push_text(nodes: &mut Vec<Node>, text: &str) {
    if let Some(Node::Text(last)) = nodes.last_mut() {
        last.push_str(text);
    } else {
        nodes.push(Node::Text(text.to_owned()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Node {
        Node::Text(s.into())
    }

    #[test]
    fn plain_text() {
        assert_eq!(parse("hello world"), vec![text("hello world")]);
        assert!(parse("").is_empty());
    }

    #[test]
    fn bold_italic_underline_strike_spoiler() {
        assert_eq!(parse("**b**"), vec![Node::Bold(vec![text("b")])]);
        assert_eq!(parse("*i*"), vec![Node::Italic(vec![text("i")])]);
        assert_eq!(parse("_i_"), vec![Node::Italic(vec![text("i")])]);
        assert_eq!(parse("__u__"), vec![Node::Underline(vec![text("u")])]);
        assert_eq!(parse("~~s~~"), vec![Node::Strikethrough(vec![text("s")])]);
        assert_eq!(parse("||x||"), vec![Node::Spoiler(vec![text("x")])]);
    }

    #[test]
    fn nested_bold_in_italic() {
        assert_eq!(
            parse("*a **b** c*"),
            vec![Node::Italic(vec![
                text("a "),
                Node::Bold(vec![text("b")]),
                text(" c"),
            ])]
        );
    }

    #[test]
    fn triple_star_is_bold_italic() {
        assert_eq!(
            parse("***x***"),
            vec![Node::Bold(vec![Node::Italic(vec![text("x")])])]
        );
    }

    #[test]
    fn unmatched_delimiters_stay_literal() {
        assert_eq!(parse("2 * 3 = 6"), vec![text("2 * 3 = 6")]);
        assert_eq!(parse("**open"), vec![text("**open")]);
        assert_eq!(parse("****"), vec![text("****")]);
    }

    #[test]
    fn snake_case_is_not_italic() {
        assert_eq!(parse("snake_case_name"), vec![text("snake_case_name")]);
    }

    #[test]
    fn escapes() {
        assert_eq!(parse(r"\*not italic\*"), vec![text("*not italic*")]);
        assert_eq!(parse(r"a\b"), vec![text(r"a\b")]);
    }

    #[test]
    fn inline_code_is_opaque() {
        assert_eq!(
            parse("use `**x**` here"),
            vec![
                text("use "),
                Node::Code {
                    language: None,
                    content: "**x**".into()
                },
                text(" here"),
            ]
        );
        assert_eq!(
            parse("``a`b``"),
            vec![Node::Code {
                language: None,
                content: "a`b".into()
            }]
        );
    }

    #[test]
    fn fenced_code_with_language() {
        assert_eq!(
            parse("```rust\nfn main() {}\n```"),
            vec![Node::Code {
                language: Some("rust".into()),
                content: "fn main() {}".into()
            }]
        );
        assert_eq!(
            parse("```plain words```"),
            vec![Node::Code {
                language: None,
                content: "plain words".into()
            }]
        );
    }

    #[test]
    fn mentions_and_emoji() {
        assert_eq!(
            parse("<@123> <@!456> <@&789> <#42> <:kek:99> <a:party:100>"),
            vec![
                Node::UserMention("123".into()),
                text(" "),
                Node::UserMention("456".into()),
                text(" "),
                Node::RoleMention("789".into()),
                text(" "),
                Node::ChannelMention("42".into()),
                text(" "),
                Node::Emoji {
                    name: "kek".into(),
                    id: "99".into(),
                    animated: false
                },
                text(" "),
                Node::Emoji {
                    name: "party".into(),
                    id: "100".into(),
                    animated: true
                },
            ]
        );
    }

    #[test]
    fn special_mentions() {
        assert_eq!(
            parse("hey @everyone and @here"),
            vec![
                text("hey "),
                Node::SpecialMention("everyone".into()),
                text(" and "),
                Node::SpecialMention("here".into()),
            ]
        );
    }

    #[test]
    fn timestamps() {
        assert_eq!(
            parse("<t:1700000000:R>"),
            vec![Node::Timestamp {
                stamp: "1700000000".into(),
                format: Some("R".into())
            }]
        );
        assert_eq!(
            parse("<t:0>"),
            vec![Node::Timestamp {
                stamp: "0".into(),
                format: None
            }]
        );
    }

    #[test]
    fn urls() {
        assert_eq!(
            parse("see https://example.com/a_b_c."),
            vec![
                text("see "),
                Node::Url("https://example.com/a_b_c".into()),
                text("."),
            ]
        );
        assert_eq!(
            parse("<https://example.com>"),
            vec![Node::Url("https://example.com".into())]
        );
    }

    #[test]
    fn block_quotes() {
        assert_eq!(
            parse("> quoted\nreply"),
            vec![Node::BlockQuote(vec![text("quoted")]), text("\nreply")]
        );
        assert_eq!(
            parse("before\n>>> all\nof this"),
            vec![
                text("before\n"),
                Node::BlockQuote(vec![text("all\nof this")]),
            ]
        );
    }

    #[test]
    fn quote_marker_mid_line_is_text() {
        assert_eq!(parse("a > b"), vec![text("a > b")]);
    }

    #[test]
    fn pathological_input_terminates() {
        let input = "*_".repeat(2000);
        let nodes = parse(&input);
        assert!(!nodes.is_empty());
    }
}
