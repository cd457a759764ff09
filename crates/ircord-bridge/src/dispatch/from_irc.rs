//! IRC → Discord.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, info};

use ircord_format::codes::{self, ch};

use crate::irc::link::SessionInfo;
use crate::irc::message::Message;
use crate::readiness::ConnectionState;
use crate::traits::IrcHandler;

use super::{Action, Bridge, notices};

/// A body that is nothing but a link to embeddable media.
static MEDIA_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://[^\s\x01-\x16]+\.(?:jpg|jpeg|png|gif|mp4|webm)$")
        .expect("valid media regex")
});

/// Token of the `PING` that marks the end of the handshake.
const READY_PROBE: &str = "ready";

impl Bridge {
    /// Translate one IRC message into the actions it causes.
    ///
    /// Handshake numerics (`001`, `005`) and the `PONG` answering the ready
    /// probe drive the readiness gate; everything else is dropped until
    /// the gate is open.
    pub fn translate_irc(&self, msg: &Message, session: &SessionInfo) -> Vec<Action> {
        let source = msg.source_nick().unwrap_or_default();
        if session.is_self(source) && msg.command != "PRIVMSG" {
            return Vec::new();
        }

        match msg.command.as_str() {
            "001" => return self.on_welcome(),
            "005" => return on_isupport(msg, session),
            "PONG" => {
                if msg.trailing() == Some(READY_PROBE) {
                    info!(channels = self.channels.len(), "IRC relay ready");
                    self.readiness.set(ConnectionState::Ready);
                }
                return Vec::new();
            }
            _ => {}
        }
        if !self.readiness.is_ready() {
            debug!(command = %msg.command, "IRC not ready, dropping");
            return Vec::new();
        }

        let irc_id = msg.tag_value("msgid");
        let reply_to = msg
            .tag_value("+draft/reply")
            .and_then(|id| self.correlation.latest_target(id));
        let reply_to = reply_to.as_deref();

        match msg.command.as_str() {
            "NICK" => {
                let Some(new) = msg.param(0) else {
                    return Vec::new();
                };
                let text = notices::nick_change(source, new);
                self.channels
                    .discord_channels()
                    .map(|channel| self.discord_send(channel, &text, reply_to, irc_id))
                    .collect()
            }
            "QUIT" => {
                let text = notices::quit(source, msg.param(0));
                self.channels
                    .discord_channels()
                    .map(|channel| self.discord_send(channel, &text, reply_to, irc_id))
                    .collect()
            }
            "JOIN" => self.to_mapped(msg, |_| Some(notices::joined(source)), reply_to, irc_id),
            "PART" => self.to_mapped(
                msg,
                |m| Some(notices::parted(source, m.param(1))),
                reply_to,
                irc_id,
            ),
            "KICK" => self.to_mapped(
                msg,
                |m| Some(notices::kicked(m.param(1)?, source, m.param(2))),
                reply_to,
                irc_id,
            ),
            "REDACT" => {
                let (Some(channel), Some(target)) = (self.mapped(msg), msg.param(1)) else {
                    return Vec::new();
                };
                self.correlation
                    .lookup_by_source(target)
                    .into_iter()
                    .map(|message_id| Action::DiscordDelete {
                        channel_id: channel.to_owned(),
                        message_id,
                    })
                    .collect()
            }
            "TAGMSG" => match self.mapped(msg) {
                Some(channel) if msg.tag("+typing") == Some("active") => {
                    vec![Action::DiscordTyping {
                        channel_id: channel.to_owned(),
                    }]
                }
                _ => Vec::new(),
            },
            "PRIVMSG" => self.on_privmsg(msg, session, reply_to, irc_id),
            // NOTICE is never relayed.
            _ => Vec::new(),
        }
    }

    /// Join every mapped channel.
    fn on_welcome(&self) -> Vec<Action> {
        self.channels
            .irc_channels()
            .map(|channel| Action::IrcWrite(Message::join(channel)))
            .collect()
    }

    /// Discord channel mapped to the message's first parameter.
    fn mapped(&self, msg: &Message) -> Option<&str> {
        self.channels.discord_for(msg.param(0)?)
    }

    /// One notice to the channel the message targets, if mapped.
    fn to_mapped(
        &self,
        msg: &Message,
        text: impl FnOnce(&Message) -> Option<String>,
        reply_to: Option<&str>,
        irc_id: Option<&str>,
    ) -> Vec<Action> {
        let Some(channel) = self.mapped(msg) else {
            return Vec::new();
        };
        let Some(text) = text(msg) else {
            return Vec::new();
        };
        vec![self.discord_send(channel, &text, reply_to, irc_id)]
    }

    fn on_privmsg(
        &self,
        msg: &Message,
        session: &SessionInfo,
        reply_to: Option<&str>,
        irc_id: Option<&str>,
    ) -> Vec<Action> {
        let (Some(channel), Some(text)) = (self.mapped(msg), msg.param(1)) else {
            return Vec::new();
        };
        let sender = msg.source_nick().unwrap_or_default();

        // Our own relayed line coming back through echo-message.
        if session.is_self(sender) {
            return match (irc_id, msg.tag_value("+discord")) {
                (Some(irc_id), Some(discord_id)) => vec![Action::Record {
                    irc_id: irc_id.to_owned(),
                    discord_id: discord_id.to_owned(),
                }],
                _ => Vec::new(),
            };
        }
        if text.is_empty() {
            return Vec::new();
        }

        let mut body = text;
        let addressed = format!("{}: ", session.nick);
        if reply_to.is_some() {
            body = body.strip_prefix(addressed.as_str()).unwrap_or(body);
        }

        let action;
        if let Some(ctcp) = body.strip_prefix('\x01') {
            let ctcp = ctcp.trim_matches('\x01');
            let (verb, data) = ctcp.split_once(' ').unwrap_or((ctcp, ""));
            if verb != "ACTION" {
                debug!(verb, "dropping CTCP");
                return Vec::new();
            }
            action = format!("{}{data}", ch(codes::ITALIC));
            body = &action;
        }

        let bold = ch(codes::BOLD);
        if !body.contains(' ') && MEDIA_LINK.is_match(body) {
            // The bare link goes alone so Discord embeds it.
            vec![
                self.discord_send(channel, &format!("{bold}<{sender}>"), reply_to, irc_id),
                self.discord_send(channel, body, reply_to, irc_id),
            ]
        } else {
            let reset = ch(codes::RESET);
            vec![self.discord_send(
                channel,
                &format!("{bold}<{sender}>{reset} {body}"),
                reply_to,
                irc_id,
            )]
        }
    }
}

/// `BOT=x` sets user mode `+x` on ourselves; the ready probe follows.
fn on_isupport(msg: &Message, session: &SessionInfo) -> Vec<Action> {
    let mut actions = Vec::new();
    // Skip the target nick and the trailing "are supported by this server".
    if msg.params.len() > 2 {
        for token in &msg.params[1..msg.params.len() - 1] {
            if let Some(("BOT", mode)) = token.split_once('=') {
                actions.push(Action::IrcWrite(Message::new(
                    "MODE",
                    [session.nick.clone(), format!("+{mode}")],
                )));
            }
        }
    }
    actions.push(Action::IrcWrite(Message::new("PING", [READY_PROBE])));
    actions
}

#[async_trait]
impl IrcHandler for Bridge {
    async fn on_connect(&self) {
        self.readiness.set(ConnectionState::Handshaking);
    }

    async fn on_message(&self, msg: Message, session: SessionInfo) {
        let actions = self.translate_irc(&msg, &session);
        self.execute(actions).await;
    }

    async fn on_disconnect(&self) {
        self.readiness.set(ConnectionState::Disconnected);
    }
}
