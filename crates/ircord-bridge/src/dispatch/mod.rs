//! The relay: shared [`Bridge`] context plus the translation of inbound
//! events on either side into [`Action`]s for the other.
//!
//! Translation is synchronous and side-effect free apart from the
//! readiness gate; [`Bridge::execute`] performs the resulting sends and
//! records message-id correlations after each successful Discord send.

mod from_discord;
mod from_irc;
pub mod notices;

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use ircord_format::{irc_to_discord, resolve_mentions};
use ircord_types::BridgeError;
use ircord_types::config::BridgeConfig;

use crate::channel_map::ChannelMap;
use crate::correlation::CorrelationStore;
use crate::discord::api::DiscordApi;
use crate::discord::roster::RosterCache;
use crate::irc::link::IrcLink;
use crate::irc::message::Message;
use crate::readiness::Readiness;

/// One outbound effect of an inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Post to Discord. `content` is already in Discord markdown. When
    /// `irc_id` is set, the new Discord id is recorded against it.
    DiscordSend {
        channel_id: String,
        content: String,
        reply_to: Option<String>,
        irc_id: Option<String>,
    },
    DiscordDelete {
        channel_id: String,
        message_id: String,
    },
    DiscordTyping {
        channel_id: String,
    },
    /// Queue a line on the IRC connection; dropped while disconnected.
    IrcWrite(Message),
    /// Remember that `irc_id` and `discord_id` are the same message.
    Record { irc_id: String, discord_id: String },
}

/// State shared by both connection loops.
pub struct Bridge {
    channels: ChannelMap,
    correlation: CorrelationStore,
    link: Arc<IrcLink>,
    readiness: Readiness,
    roster: RosterCache,
    api: Arc<dyn DiscordApi>,
    /// Bot user id, learned from READY.
    self_user: RwLock<Option<String>>,
}

impl Bridge {
    pub fn new(
        config: &BridgeConfig,
        link: Arc<IrcLink>,
        api: Arc<dyn DiscordApi>,
    ) -> Result<Self, BridgeError> {
        Ok(Self {
            channels: ChannelMap::new(&config.channels)?,
            correlation: CorrelationStore::new(config.correlation_capacity),
            link,
            readiness: Readiness::new(),
            roster: RosterCache::new(),
            api,
            self_user: RwLock::new(None),
        })
    }

    pub fn channels(&self) -> &ChannelMap {
        &self.channels
    }

    pub fn correlation(&self) -> &CorrelationStore {
        &self.correlation
    }

    pub fn readiness(&self) -> &Readiness {
        &self.readiness
    }

    pub fn roster(&self) -> &RosterCache {
        &self.roster
    }

    pub fn self_user(&self) -> Option<String> {
        self.self_user.read().clone()
    }

    fn is_self_user(&self, user_id: &str) -> bool {
        self.self_user.read().as_deref() == Some(user_id)
    }

    /// Build a Discord send from IRC control-code text: formatting is
    /// translated, then names are resolved against the channel's guild.
    fn discord_send(
        &self,
        channel_id: &str,
        irc_text: &str,
        reply_to: Option<&str>,
        irc_id: Option<&str>,
    ) -> Action {
        let content = irc_to_discord(irc_text);
        let content = match self.roster.guild_of_channel(channel_id) {
            Some(guild_id) => self
                .roster
                .with_guild(&guild_id, |guild| resolve_mentions(&content, guild))
                .unwrap_or(content),
            None => content,
        };
        Action::DiscordSend {
            channel_id: channel_id.to_owned(),
            content,
            reply_to: reply_to.map(str::to_owned),
            irc_id: irc_id.map(str::to_owned),
        }
    }

    /// Perform `actions` in order. Failures are logged and skipped.
    pub async fn execute(&self, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::DiscordSend {
                    channel_id,
                    content,
                    reply_to,
                    irc_id,
                } => match self
                    .api
                    .send_message(&channel_id, &content, reply_to.as_deref())
                    .await
                {
                    Ok(discord_id) => {
                        if let Some(irc_id) = irc_id {
                            self.correlation.record_pair(&irc_id, &discord_id);
                        }
                    }
                    Err(e) => warn!(channel_id = %channel_id, error = %e, "Discord send failed"),
                },
                Action::DiscordDelete {
                    channel_id,
                    message_id,
                } => {
                    if let Err(e) = self.api.delete_message(&channel_id, &message_id).await {
                        warn!(
                            channel_id = %channel_id,
                            message_id = %message_id,
                            error = %e,
                            "Discord delete failed"
                        );
                    }
                }
                Action::DiscordTyping { channel_id } => {
                    if let Err(e) = self.api.trigger_typing(&channel_id).await {
                        debug!(channel_id = %channel_id, error = %e, "Discord typing failed");
                    }
                }
                Action::IrcWrite(msg) => {
                    self.link.write(msg);
                }
                Action::Record { irc_id, discord_id } => {
                    self.correlation.record_pair(&irc_id, &discord_id);
                }
            }
        }
    }
}
