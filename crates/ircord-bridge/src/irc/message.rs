//! IRCv3 message representation.
//!
//! ```text
//! [@tag1=value;tag2] [:prefix] COMMAND [param ...] [:trailing]
//! ```
//!
//! Tag values are escaped per the IRCv3 message-tags specification
//! (`\:` `\s` `\\` `\r` `\n`).

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// A malformed IRC line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty message")]
    Empty,
    #[error("missing command")]
    MissingCommand,
}

/// A single message tag; a `None` value means the tag has no `=`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag(pub String, pub Option<String>);

/// Message source, `nick!user@host` or a server name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prefix {
    pub name: String,
    pub user: Option<String>,
    pub host: Option<String>,
}

impl Prefix {
    pub fn parse(raw: &str) -> Self {
        let (rest, host) = match raw.split_once('@') {
            Some((rest, host)) => (rest, Some(host.to_owned())),
            None => (raw, None),
        };
        let (name, user) = match rest.split_once('!') {
            Some((name, user)) => (name, Some(user.to_owned())),
            None => (rest, None),
        };
        Self {
            name: name.to_owned(),
            user,
            host,
        }
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if let Some(user) = &self.user {
            write!(f, "!{user}")?;
        }
        if let Some(host) = &self.host {
            write!(f, "@{host}")?;
        }
        Ok(())
    }
}

/// One IRC protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub tags: Vec<Tag>,
    pub prefix: Option<Prefix>,
    /// Command verb or three-digit numeric, upper-cased on parse.
    pub command: String,
    pub params: Vec<String>,
}

impl Message {
    pub fn new<I, S>(command: &str, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tags: Vec::new(),
            prefix: None,
            command: command.to_owned(),
            params: params.into_iter().map(Into::into).collect(),
        }
    }

    pub fn privmsg(target: &str, text: &str) -> Self {
        Self::new("PRIVMSG", [target, text])
    }

    pub fn tagmsg(target: &str) -> Self {
        Self::new("TAGMSG", [target])
    }

    pub fn join(channel: &str) -> Self {
        Self::new("JOIN", [channel])
    }

    /// Add a tag, builder style.
    pub fn with_tag(mut self, key: &str, value: Option<&str>) -> Self {
        self.tags.push(Tag(key.to_owned(), value.map(str::to_owned)));
        self
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = Some(Prefix::parse(prefix));
        self
    }

    /// Value of a tag. Tags present without a value read as `""`.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|Tag(k, _)| k == key)
            .map(|Tag(_, v)| v.as_deref().unwrap_or(""))
    }

    /// Value of a tag, treating an empty value as absent.
    pub fn tag_value(&self, key: &str) -> Option<&str> {
        self.tag(key).filter(|v| !v.is_empty())
    }

    /// Nickname (or server name) of the sender.
    pub fn source_nick(&self) -> Option<&str> {
        self.prefix.as_ref().map(|p| p.name.as_str())
    }

    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }

    /// Final parameter, usually the free-form text.
    pub fn trailing(&self) -> Option<&str> {
        self.params.last().map(String::as_str)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.tags.is_empty() {
            f.write_str("@")?;
            for (i, Tag(key, value)) in self.tags.iter().enumerate() {
                if i > 0 {
                    f.write_str(";")?;
                }
                f.write_str(key)?;
                if let Some(value) = value {
                    write!(f, "={}", escape_tag_value(value))?;
                }
            }
            f.write_str(" ")?;
        }
        if let Some(prefix) = &self.prefix {
            write!(f, ":{prefix} ")?;
        }
        f.write_str(&self.command)?;
        let count = self.params.len();
        for (i, param) in self.params.iter().enumerate() {
            let needs_colon =
                param.is_empty() || param.starts_with(':') || param.contains(' ');
            if i + 1 == count && needs_colon {
                write!(f, " :{param}")?;
            } else {
                write!(f, " {param}")?;
            }
        }
        Ok(())
    }
}

impl FromStr for Message {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut rest = line.trim_end_matches(['\r', '\n']);
        if rest.trim().is_empty() {
            return Err(ParseError::Empty);
        }

        let mut tags = Vec::new();
        if let Some(stripped) = rest.strip_prefix('@') {
            let (raw_tags, after) = stripped.split_once(' ').unwrap_or((stripped, ""));
            tags = raw_tags
                .split(';')
                .filter(|t| !t.is_empty())
                .map(|t| match t.split_once('=') {
                    Some((k, v)) => Tag(k.to_owned(), Some(unescape_tag_value(v))),
                    None => Tag(t.to_owned(), None),
                })
                .collect();
            rest = after.trim_start_matches(' ');
        }

        let mut prefix = None;
        if let Some(stripped) = rest.strip_prefix(':') {
            let (raw_prefix, after) = stripped.split_once(' ').unwrap_or((stripped, ""));
            prefix = Some(Prefix::parse(raw_prefix));
            rest = after.trim_start_matches(' ');
        }

        let (command, mut rest) = rest.split_once(' ').unwrap_or((rest, ""));
        if command.is_empty() {
            return Err(ParseError::MissingCommand);
        }

        let mut params = Vec::new();
        loop {
            rest = rest.trim_start_matches(' ');
            if rest.is_empty() {
                break;
            }
            if let Some(trailing) = rest.strip_prefix(':') {
                params.push(trailing.to_owned());
                break;
            }
            match rest.split_once(' ') {
                Some((param, after)) => {
                    params.push(param.to_owned());
                    rest = after;
                }
                None => {
                    params.push(rest.to_owned());
                    break;
                }
            }
        }

        Ok(Self {
            tags,
            prefix,
            command: command.to_ascii_uppercase(),
            params,
        })
    }
}

fn escape_tag_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            ';' => out.push_str("\\:"),
            ' ' => out.push_str("\\s"),
            '\\' => out.push_str("\\\\"),
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out
}

fn unescape_tag_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        // A trailing lone backslash is dropped.
        match chars.next() {
            Some(':') => out.push(';'),
            Some('s') => out.push(' '),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_message() {
        let msg: Message = "@msgid=abc;+draft/reply=x\\sy :nick!user@host PRIVMSG #chan :hello there"
            .parse()
            .unwrap();
        assert_eq!(msg.tag("msgid"), Some("abc"));
        assert_eq!(msg.tag("+draft/reply"), Some("x y"));
        assert_eq!(msg.source_nick(), Some("nick"));
        let prefix = msg.prefix.as_ref().unwrap();
        assert_eq!(prefix.user.as_deref(), Some("user"));
        assert_eq!(prefix.host.as_deref(), Some("host"));
        assert_eq!(msg.command, "PRIVMSG");
        assert_eq!(msg.params, vec!["#chan", "hello there"]);
    }

    #[test]
    fn parse_without_tags_or_prefix() {
        let msg: Message = "PING :irc.example.net".parse().unwrap();
        assert!(msg.tags.is_empty());
        assert!(msg.prefix.is_none());
        assert_eq!(msg.command, "PING");
        assert_eq!(msg.params, vec!["irc.example.net"]);
    }

    #[test]
    fn parse_numeric_with_middle_params() {
        let msg: Message = ":srv 005 bot BOT=B NETWORK=Test :are supported"
            .parse()
            .unwrap();
        assert_eq!(msg.command, "005");
        assert_eq!(msg.params, vec!["bot", "BOT=B", "NETWORK=Test", "are supported"]);
        assert_eq!(msg.source_nick(), Some("srv"));
    }

    #[test]
    fn parse_valueless_tag_and_empty_trailing() {
        let msg: Message = "@+typing=active;draft/bot :n TAGMSG #c :".parse().unwrap();
        assert_eq!(msg.tag("+typing"), Some("active"));
        assert_eq!(msg.tag("draft/bot"), Some(""));
        assert_eq!(msg.tag_value("draft/bot"), None);
        assert_eq!(msg.params, vec!["#c", ""]);
    }

    #[test]
    fn parse_lowercase_command_and_crlf() {
        let msg: Message = "privmsg #a b\r\n".parse().unwrap();
        assert_eq!(msg.command, "PRIVMSG");
        assert_eq!(msg.params, vec!["#a", "b"]);
    }

    #[test]
    fn parse_errors() {
        assert_eq!("".parse::<Message>(), Err(ParseError::Empty));
        assert_eq!("   ".parse::<Message>(), Err(ParseError::Empty));
        assert_eq!(":prefix-only".parse::<Message>(), Err(ParseError::MissingCommand));
    }

    #[test]
    fn serialize_with_tags_and_trailing() {
        let msg = Message::privmsg("#chan", "hi there")
            .with_tag("+discord", Some("123"))
            .with_tag("+draft/reply", Some("a;b c"));
        assert_eq!(
            msg.to_string(),
            "@+discord=123;+draft/reply=a\\:b\\sc PRIVMSG #chan :hi there"
        );
    }

    #[test]
    fn serialize_plain_params() {
        assert_eq!(Message::join("#a").to_string(), "JOIN #a");
        assert_eq!(Message::new("MODE", ["bot", "+B"]).to_string(), "MODE bot +B");
        assert_eq!(Message::new("PRIVMSG", ["#a", ":)"]).to_string(), "PRIVMSG #a ::)");
        assert_eq!(Message::new("PRIVMSG", ["#a", ""]).to_string(), "PRIVMSG #a :");
    }

    #[test]
    fn serialize_prefix_and_valueless_tag() {
        let msg = Message::tagmsg("#a")
            .with_tag("+typing", Some("active"))
            .with_tag("draft/bot", None)
            .with_prefix("me!u@h");
        assert_eq!(msg.to_string(), "@+typing=active;draft/bot :me!u@h TAGMSG #a");
    }

    #[test]
    fn tag_escaping_survives_reparse() {
        let original = "semi;colon space\\slash\r\nline";
        let msg = Message::tagmsg("#a").with_tag("+x", Some(original));
        let parsed: Message = msg.to_string().parse().unwrap();
        assert_eq!(parsed.tag("+x"), Some(original));
    }

    #[test]
    fn unescape_edge_cases() {
        assert_eq!(unescape_tag_value("a\\"), "a");
        assert_eq!(unescape_tag_value("\\b"), "b");
    }
}
