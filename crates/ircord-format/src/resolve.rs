//! Turn `@name` and `:emoji:` in outgoing Discord text into native
//! references.
//!
//! Runs after [`irc_to_discord`](crate::irc_to_discord); backtick spans
//! are copied through untouched. Lookups are linear scans over the
//! snapshot, first match wins, and a miss leaves the text as it was.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::roster::GuildSnapshot;

/// `@name` or `@name#1234`, not preceded by a word character, `@` or an
/// escaping backslash. The boundary is captured so it can be written back.
///
/// A name may contain escaped underscores (`\_`), and `.` or `_` between
/// two name characters, so `@foo_bar` and `@john.doe` are read whole.
static MENTION: LazyLock<Regex> = LazyLock::new(|| {
    const NAME_CHAR: &str = r"[^\s#*_~`\\,.:;!?<>()\[\]]";
    Regex::new(&format!(
        r"(^|[^\w@\\])@((?:{NAME_CHAR}|\\_|[._]{NAME_CHAR})+)(?:#(\d{{4}}))?"
    ))
    .expect("valid mention regex")
});

static EMOJI: LazyLock<Regex> = LazyLock::new(|| Regex::new(r":(\w+):").expect("valid emoji regex"));

/// Resolve mentions and custom emoji in `text` against `guild`.
pub fn resolve_mentions(text: &str, guild: &GuildSnapshot) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while !rest.is_empty() {
        let Some((start, end)) = raw_span(rest) else {
            out.push_str(&resolve_part(rest, guild));
            break;
        };
        out.push_str(&resolve_part(&rest[..start], guild));
        out.push_str(&rest[start..end]);
        rest = &rest[end..];
    }
    out
}

/// Byte range of the first backtick span, closing backtick included.
fn raw_span(text: &str) -> Option<(usize, usize)> {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'`' => {
                let close = text[i + 1..].find('`')?;
                return Some((i, i + 1 + close + 1));
            }
            _ => i += 1,
        }
    }
    None
}

fn resolve_part(text: &str, guild: &GuildSnapshot) -> String {
    if text.is_empty() {
        return String::new();
    }
    let text = MENTION.replace_all(text, |caps: &Captures<'_>| {
        // Never resolve a prefix of a name that runs on past an escape.
        if text[caps.get(0).map_or(0, |m| m.end())..].starts_with('\\') {
            return caps[0].to_owned();
        }
        let boundary = &caps[1];
        let name = caps[2].replace("\\_", "_").to_lowercase();
        let resolved = match caps.get(3) {
            Some(discriminator) => mention_tagged(guild, &name, discriminator.as_str()),
            None => mention_named(guild, &name),
        };
        match resolved {
            Some(mention) => format!("{boundary}{mention}"),
            None => caps[0].to_owned(),
        }
    });
    EMOJI
        .replace_all(&text, |caps: &Captures<'_>| {
            let name = caps[1].to_lowercase();
            guild
                .emojis
                .iter()
                .filter(|e| e.available)
                .find(|e| e.name.as_deref().is_some_and(|n| n.to_lowercase() == name))
                .and_then(|e| e.message_format())
                .unwrap_or_else(|| caps[0].to_owned())
        })
        .into_owned()
}

fn mention_tagged(guild: &GuildSnapshot, name: &str, discriminator: &str) -> Option<String> {
    guild
        .members
        .iter()
        .find(|m| m.user.username.to_lowercase() == name && m.user.discriminator == discriminator)
        .map(|m| m.mention())
}

fn mention_named(guild: &GuildSnapshot, name: &str) -> Option<String> {
    let by_nick = guild.members.iter().find(|m| {
        m.nick
            .as_deref()
            .is_some_and(|n| !n.is_empty() && n.to_lowercase() == name)
    });
    if let Some(member) = by_nick {
        return Some(member.mention());
    }
    if let Some(member) = guild
        .members
        .iter()
        .find(|m| m.user.username.to_lowercase() == name)
    {
        return Some(member.mention());
    }
    guild
        .roles
        .iter()
        .find(|r| r.mentionable && r.name.to_lowercase() == name)
        .map(|r| r.mention())
}
