//! IRC lifecycle notices, as control-code text for the Discord side.
//!
//! The subject nick is italicized; free-form reasons are appended after
//! a colon when the server supplied a non-empty one.

use ircord_format::codes::{self, ch};

fn subject(nick: &str) -> String {
    format!("{}{nick}{}", ch(codes::ITALIC), ch(codes::RESET))
}

fn with_reason(text: String, reason: Option<&str>) -> String {
    match reason.filter(|r| !r.is_empty()) {
        Some(reason) => format!("{text}: {reason}"),
        None => text,
    }
}

pub fn nick_change(old: &str, new: &str) -> String {
    format!("{} is now known as {new}", subject(old))
}

pub fn joined(nick: &str) -> String {
    format!("{} has joined the channel", subject(nick))
}

pub fn parted(nick: &str, reason: Option<&str>) -> String {
    with_reason(format!("{} has left the channel", subject(nick)), reason)
}

pub fn kicked(target: &str, by: &str, reason: Option<&str>) -> String {
    with_reason(
        format!("{} was kicked off the channel by {by}", subject(target)),
        reason,
    )
}

pub fn quit(nick: &str, reason: Option<&str>) -> String {
    with_reason(format!("{} has quit", subject(nick)), reason)
}
