//! Discord → IRC.

use async_trait::async_trait;
use tracing::debug;

use ircord_format::codes::{self, ZWSP, ch};
use ircord_format::{RenderContext, discord_to_irc};

use crate::discord::events::{DiscordEvent, MessageCreate, MessageDelete, ReactionAdd, TypingStart};
use crate::irc::message::Message;
use crate::traits::DiscordHandler;

use super::{Action, Bridge};

/// mIRC colors readable on both light and dark backgrounds.
const NICK_PALETTE: [u8; 11] = [2, 3, 4, 6, 7, 8, 9, 10, 11, 12, 13];

impl Bridge {
    /// Translate one Discord dispatch into the actions it causes.
    ///
    /// Events authored by the bot itself and events in unmapped channels
    /// produce nothing.
    pub fn translate_discord(&self, event: &DiscordEvent) -> Vec<Action> {
        match event {
            DiscordEvent::MessageCreate(msg) => self.on_message_create(msg),
            DiscordEvent::MessageDelete(msg) => self.on_message_delete(msg),
            DiscordEvent::ReactionAdd(reaction) => self.on_reaction(reaction),
            DiscordEvent::TypingStart(typing) => self.on_typing(typing),
            _ => Vec::new(),
        }
    }

    fn on_message_create(&self, msg: &MessageCreate) -> Vec<Action> {
        if self.is_self_user(&msg.author.id) {
            return Vec::new();
        }
        let Some(channel) = self.channels.irc_for(&msg.channel_id) else {
            return Vec::new();
        };
        let reply_to = msg
            .message_reference
            .as_ref()
            .and_then(|r| r.message_id.as_deref())
            .and_then(|id| self.correlation.first_source(id));

        let role_color = match (&msg.guild_id, &msg.member) {
            (Some(guild_id), Some(member)) => self
                .roster
                .with_guild(guild_id, |g| g.roles_color(&member.roles))
                .flatten(),
            _ => None,
        };
        let color = nick_color(role_color.or(msg.author.accent_color), &msg.author.username);
        let nick = msg
            .member
            .as_ref()
            .and_then(|m| m.nick.as_deref())
            .filter(|n| !n.is_empty())
            .unwrap_or(&msg.author.username);
        let prefix = format!("<{color}{}{}> ", break_highlight(nick), ch(codes::RESET));

        let tagged = |text: String| {
            let line = Message::privmsg(channel, &text).with_tag("+discord", Some(msg.id.as_str()));
            Action::IrcWrite(match &reply_to {
                Some(reply) => line.with_tag("+draft/reply", Some(reply.as_str())),
                None => line,
            })
        };

        let mut actions = Vec::new();
        if !msg.content.is_empty() {
            let body = match &msg.guild_id {
                Some(guild_id) => self
                    .roster
                    .with_guild(guild_id, |g| {
                        discord_to_irc(&msg.content, &RenderContext::new(Some(g)))
                    })
                    .unwrap_or_else(|| discord_to_irc(&msg.content, &RenderContext::new(None))),
                None => discord_to_irc(&msg.content, &RenderContext::new(None)),
            };
            let body = body.replace("\r\n", " ").replace(['\n', '\r'], " ");
            actions.push(tagged(format!("{prefix}{body}")));
        }
        for attachment in &msg.attachments {
            actions.push(tagged(format!("{prefix}{}", attachment.url)));
        }
        actions
    }

    fn on_message_delete(&self, msg: &MessageDelete) -> Vec<Action> {
        let Some(channel) = self.channels.irc_for(&msg.channel_id) else {
            return Vec::new();
        };
        self.correlation
            .lookup_by_target(&msg.id)
            .into_iter()
            .map(|irc_id| Action::IrcWrite(Message::new("REDACT", [channel, irc_id.as_str()])))
            .collect()
    }

    fn on_reaction(&self, reaction: &ReactionAdd) -> Vec<Action> {
        if self.is_self_user(&reaction.user_id) {
            return Vec::new();
        }
        let Some(channel) = self.channels.irc_for(&reaction.channel_id) else {
            return Vec::new();
        };
        let Some(emoji) = reaction.emoji.name.as_deref().filter(|n| !n.is_empty()) else {
            return Vec::new();
        };
        let Some(target) = self.correlation.first_source(&reaction.message_id) else {
            debug!(message_id = %reaction.message_id, "reaction on unknown message");
            return Vec::new();
        };
        vec![Action::IrcWrite(
            Message::tagmsg(channel)
                .with_tag("+draft/react", Some(emoji))
                .with_tag("+draft/reply", Some(target.as_str())),
        )]
    }

    fn on_typing(&self, typing: &TypingStart) -> Vec<Action> {
        if self.is_self_user(&typing.user_id) {
            return Vec::new();
        }
        let Some(channel) = self.channels.irc_for(&typing.channel_id) else {
            return Vec::new();
        };
        vec![Action::IrcWrite(
            Message::tagmsg(channel).with_tag("+typing", Some("active")),
        )]
    }
}

/// `\x04RRGGBB` for a known color, otherwise a palette color picked by an
/// FNV-1 hash of the username so a user keeps the same color.
fn nick_color(rgb: Option<u32>, username: &str) -> String {
    match rgb.filter(|&c| c != 0) {
        Some(rgb) => format!("{}{rgb:06X}", ch(codes::COLOR_HEX)),
        None => {
            let index = fnv1_32(username.as_bytes()) as usize % NICK_PALETTE.len();
            format!("{}{:02}", ch(codes::COLOR), NICK_PALETTE[index])
        }
    }
}

fn fnv1_32(data: &[u8]) -> u32 {
    data.iter().fold(0x811c_9dc5, |hash: u32, &b| {
        hash.wrapping_mul(0x0100_0193) ^ u32::from(b)
    })
}

/// Insert a zero-width space after the first character so relayed nicks
/// do not highlight the IRC user of the same name.
fn break_highlight(nick: &str) -> String {
    let mut chars = nick.chars();
    match chars.next() {
        Some(first) if chars.as_str().is_empty() => first.to_string(),
        Some(first) => format!("{first}{ZWSP}{}", chars.as_str()),
        None => String::new(),
    }
}

#[async_trait]
impl DiscordHandler for Bridge {
    async fn on_event(&self, event: DiscordEvent) {
        self.roster.apply(&event);
        if let DiscordEvent::Ready(ready) = &event {
            *self.self_user.write() = Some(ready.user.id.clone());
        }
        let actions = self.translate_discord(&event);
        self.execute(actions).await;
    }
}
