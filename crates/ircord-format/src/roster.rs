//! Read-only view of one Discord guild, as seen by the formatters.
//!
//! The types deserialize straight from the gateway payloads
//! (`GUILD_CREATE`, `GUILD_MEMBERS_CHUNK`, ...), ignoring unknown fields.

use serde::Deserialize;

/// A Discord user account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub username: String,
    /// `"0"` for accounts migrated to unique usernames.
    #[serde(default = "default_discriminator")]
    pub discriminator: String,
    #[serde(default)]
    pub accent_color: Option<u32>,
    #[serde(default)]
    pub bot: bool,
}

fn default_discriminator() -> String {
    "0".into()
}

/// Guild-specific data for a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Member {
    pub user: User,
    #[serde(default)]
    pub nick: Option<String>,
    /// Role ids.
    #[serde(default)]
    pub roles: Vec<String>,
}

impl Member {
    /// Guild nickname, falling back to the account username.
    pub fn display_name(&self) -> &str {
        self.nick
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.user.username)
    }

    pub fn mention(&self) -> String {
        format!("<@{}>", self.user.id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Role {
    pub id: String,
    pub name: String,
    /// `0` means "no color".
    #[serde(default)]
    pub color: u32,
    #[serde(default)]
    pub position: i64,
    #[serde(default)]
    pub mentionable: bool,
}

impl Role {
    pub fn mention(&self) -> String {
        format!("<@&{}>", self.id)
    }
}

/// A custom guild emoji.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Emoji {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub animated: bool,
    #[serde(default = "default_true")]
    pub available: bool,
}

fn default_true() -> bool {
    true
}

impl Emoji {
    /// Message syntax for the emoji, `None` for unicode emoji without id.
    pub fn message_format(&self) -> Option<String> {
        let id = self.id.as_deref()?;
        let name = self.name.as_deref()?;
        let prefix = if self.animated { "a" } else { "" };
        Some(format!("<{prefix}:{name}:{id}>"))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ChannelEntry {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Members, roles, custom emoji and channels of one guild.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct GuildSnapshot {
    pub id: String,
    #[serde(default)]
    pub members: Vec<Member>,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub emojis: Vec<Emoji>,
    #[serde(default)]
    pub channels: Vec<ChannelEntry>,
}

impl GuildSnapshot {
    pub fn member(&self, user_id: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.user.id == user_id)
    }

    pub fn role(&self, role_id: &str) -> Option<&Role> {
        self.roles.iter().find(|r| r.id == role_id)
    }

    pub fn channel(&self, channel_id: &str) -> Option<&ChannelEntry> {
        self.channels.iter().find(|c| c.id == channel_id)
    }

    /// Color of the member's highest positioned role that has one.
    pub fn member_color(&self, user_id: &str) -> Option<u32> {
        self.roles_color(&self.member(user_id)?.roles)
    }

    /// Color of the highest positioned colored role among `role_ids`.
    pub fn roles_color(&self, role_ids: &[String]) -> Option<u32> {
        role_ids
            .iter()
            .filter_map(|id| self.role(id))
            .filter(|r| r.color != 0)
            .max_by_key(|r| r.position)
            .map(|r| r.color)
    }

    /// Insert or replace a member, keyed by user id.
    pub fn upsert_member(&mut self, member: Member) {
        match self.members.iter_mut().find(|m| m.user.id == member.user.id) {
            Some(slot) => *slot = member,
            None => self.members.push(member),
        }
    }

    pub fn remove_member(&mut self, user_id: &str) {
        self.members.retain(|m| m.user.id != user_id);
    }

    pub fn upsert_role(&mut self, role: Role) {
        match self.roles.iter_mut().find(|r| r.id == role.id) {
            Some(slot) => *slot = role,
            None => self.roles.push(role),
        }
    }

    pub fn remove_role(&mut self, role_id: &str) {
        self.roles.retain(|r| r.id != role_id);
    }

    pub fn upsert_channel(&mut self, channel: ChannelEntry) {
        match self.channels.iter_mut().find(|c| c.id == channel.id) {
            Some(slot) => *slot = channel,
            None => self.channels.push(channel),
        }
    }

    pub fn remove_channel(&mut self, channel_id: &str) {
        self.channels.retain(|c| c.id != channel_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guild() -> GuildSnapshot {
        serde_json::from_value(serde_json::json!({
            "id": "1",
            "unavailable": false,
            "roles": [
                {"id": "10", "name": "low", "color": 0x00FF00, "position": 1},
                {"id": "11", "name": "high", "color": 0xFF0000, "position": 5},
                {"id": "12", "name": "top", "color": 0, "position": 9}
            ],
            "members": [
                {"user": {"id": "100", "username": "alice"}, "nick": "Ally", "roles": ["10", "11", "12"]},
                {"user": {"id": "101", "username": "bob", "discriminator": "4242"}, "roles": []}
            ],
            "emojis": [
                {"id": "900", "name": "kek", "animated": false},
                {"id": "901", "name": "party", "animated": true, "available": false}
            ],
            "channels": [{"id": "50", "name": "general", "type": 0}]
        }))
        .unwrap()
    }

    #[test]
    fn deserializes_guild_create_payload() {
        let g = guild();
        assert_eq!(g.members.len(), 2);
        assert_eq!(g.member("101").unwrap().user.discriminator, "4242");
        assert_eq!(g.member("100").unwrap().user.discriminator, "0");
        assert!(g.emojis[0].available);
        assert!(!g.emojis[1].available);
        assert_eq!(g.channel("50").unwrap().name.as_deref(), Some("general"));
    }

    #[test]
    fn display_name_prefers_nick() {
        let g = guild();
        assert_eq!(g.member("100").unwrap().display_name(), "Ally");
        assert_eq!(g.member("101").unwrap().display_name(), "bob");
    }

    #[test]
    fn member_color_uses_highest_colored_role() {
        let g = guild();
        assert_eq!(g.member_color("100"), Some(0xFF0000));
        assert_eq!(g.member_color("101"), None);
        assert_eq!(g.member_color("999"), None);
    }

    #[test]
    fn emoji_message_format() {
        let g = guild();
        assert_eq!(g.emojis[0].message_format().as_deref(), Some("<:kek:900>"));
        assert_eq!(
            g.emojis[1].message_format().as_deref(),
            Some("<a:party:901>")
        );
        let unicode = Emoji {
            id: None,
            name: Some("👍".into()),
            animated: false,
            available: true,
        };
        assert!(unicode.message_format().is_none());
    }

    #[test]
    fn upserts_replace_by_id() {
        let mut g = guild();
        g.upsert_member(Member {
            user: User {
                id: "101".into(),
                username: "bobby".into(),
                ..User::default()
            },
            ..Member::default()
        });
        assert_eq!(g.members.len(), 2);
        assert_eq!(g.member("101").unwrap().user.username, "bobby");

        g.upsert_role(Role {
            id: "13".into(),
            name: "new".into(),
            ..Role::default()
        });
        assert_eq!(g.roles.len(), 4);
        g.remove_role("13");
        assert!(g.role("13").is_none());

        g.remove_member("100");
        assert!(g.member("100").is_none());
    }
}
