//! Guild roster cache fed by gateway dispatches.

use std::collections::HashMap;

use ircord_format::roster::{GuildSnapshot, Member};
use parking_lot::RwLock;
use tracing::debug;

use super::events::DiscordEvent;

/// Members, roles, emoji and channels of every guild the bot is in.
#[derive(Debug, Default)]
pub struct RosterCache {
    guilds: RwLock<HashMap<String, GuildSnapshot>>,
}

impl RosterCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one dispatch into the cache. Events without roster data are
    /// ignored.
    pub fn apply(&self, event: &DiscordEvent) {
        let mut guilds = self.guilds.write();
        match event {
            DiscordEvent::GuildCreate(snapshot) => {
                debug!(
                    guild_id = %snapshot.id,
                    members = snapshot.members.len(),
                    roles = snapshot.roles.len(),
                    "guild available"
                );
                let mut snapshot = snapshot.clone();
                // Chunks may have landed before a re-sent GUILD_CREATE.
                if let Some(previous) = guilds.remove(&snapshot.id) {
                    for member in previous.members {
                        if snapshot.member(&member.user.id).is_none() {
                            snapshot.members.push(member);
                        }
                    }
                }
                guilds.insert(snapshot.id.clone(), snapshot);
            }
            DiscordEvent::MembersChunk(chunk) => {
                let guild = entry(&mut guilds, &chunk.guild_id);
                for member in &chunk.members {
                    guild.upsert_member(member.clone());
                }
            }
            DiscordEvent::MemberUpsert(update) => {
                entry(&mut guilds, &update.guild_id).upsert_member(update.member.clone());
            }
            DiscordEvent::MemberRemove(remove) => {
                if let Some(guild) = guilds.get_mut(&remove.guild_id) {
                    guild.remove_member(&remove.user.id);
                }
            }
            DiscordEvent::RoleUpsert(update) => {
                entry(&mut guilds, &update.guild_id).upsert_role(update.role.clone());
            }
            DiscordEvent::RoleDelete(delete) => {
                if let Some(guild) = guilds.get_mut(&delete.guild_id) {
                    guild.remove_role(&delete.role_id);
                }
            }
            DiscordEvent::EmojisUpdate(update) => {
                entry(&mut guilds, &update.guild_id).emojis = update.emojis.clone();
            }
            DiscordEvent::ChannelUpsert(update) => {
                if let Some(guild_id) = &update.guild_id {
                    entry(&mut guilds, guild_id).upsert_channel(update.channel.clone());
                }
            }
            DiscordEvent::ChannelDelete(update) => {
                if let Some(guild_id) = &update.guild_id
                    && let Some(guild) = guilds.get_mut(guild_id)
                {
                    guild.remove_channel(&update.channel.id);
                }
            }
            DiscordEvent::MessageCreate(msg) => {
                // Authors carry fresh nick/roles; keep the roster warm.
                if let (Some(guild_id), Some(partial)) = (&msg.guild_id, &msg.member)
                    && let Some(guild) = guilds.get_mut(guild_id)
                {
                    guild.upsert_member(Member {
                        user: msg.author.clone(),
                        nick: partial.nick.clone(),
                        roles: partial.roles.clone(),
                    });
                }
            }
            DiscordEvent::Ready(_)
            | DiscordEvent::MessageDelete(_)
            | DiscordEvent::ReactionAdd(_)
            | DiscordEvent::TypingStart(_) => {}
        }
    }

    /// Run `f` against the snapshot of `guild_id`, if cached.
    pub fn with_guild<R>(&self, guild_id: &str, f: impl FnOnce(&GuildSnapshot) -> R) -> Option<R> {
        self.guilds.read().get(guild_id).map(f)
    }

    /// The guild a channel belongs to.
    pub fn guild_of_channel(&self, channel_id: &str) -> Option<String> {
        self.guilds
            .read()
            .values()
            .find(|g| g.channel(channel_id).is_some())
            .map(|g| g.id.clone())
    }

    pub fn len(&self) -> usize {
        self.guilds.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.guilds.read().is_empty()
    }
}

fn entry<'a>(guilds: &'a mut HashMap<String, GuildSnapshot>, id: &str) -> &'a mut GuildSnapshot {
    guilds.entry(id.to_owned()).or_insert_with(|| GuildSnapshot {
        id: id.to_owned(),
        ..GuildSnapshot::default()
    })
}
