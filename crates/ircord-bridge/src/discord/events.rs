//! Discord Gateway event types and opcodes.
//!
//! These types model the subset of the Gateway v10 WebSocket protocol the
//! bridge consumes. Roster payloads reuse the
//! [`ircord_format::roster`] types so a `GUILD_CREATE` deserializes
//! directly into a [`GuildSnapshot`].

use ircord_format::roster::{ChannelEntry, Emoji, GuildSnapshot, Member, Role, User};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Gateway opcodes ─────────────────────────────────────────────────────

/// Opcode 0: Dispatch -- an event was dispatched.
pub const OP_DISPATCH: u8 = 0;

/// Opcode 1: Heartbeat -- fired periodically to keep the connection alive.
pub const OP_HEARTBEAT: u8 = 1;

/// Opcode 2: Identify -- start a new session.
pub const OP_IDENTIFY: u8 = 2;

/// Opcode 6: Resume -- resume a previous session.
pub const OP_RESUME: u8 = 6;

/// Opcode 7: Reconnect -- server is going away, client should reconnect.
pub const OP_RECONNECT: u8 = 7;

/// Opcode 8: Request Guild Members -- ask for `GUILD_MEMBERS_CHUNK`s.
pub const OP_REQUEST_GUILD_MEMBERS: u8 = 8;

/// Opcode 9: Invalid Session -- the session has been invalidated.
pub const OP_INVALID_SESSION: u8 = 9;

/// Opcode 10: Hello -- sent on connection, contains heartbeat_interval.
pub const OP_HELLO: u8 = 10;

/// Opcode 11: Heartbeat ACK -- sent in response to receiving a heartbeat.
pub const OP_HEARTBEAT_ACK: u8 = 11;

// ── Envelope and handshake payloads ─────────────────────────────────────

/// A Gateway payload (incoming or outgoing).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayPayload {
    /// The opcode for this payload.
    pub op: u8,

    /// Event data (the `d` field). May be `null` for heartbeats.
    pub d: Option<Value>,

    /// Sequence number; only present for opcode 0 (Dispatch).
    pub s: Option<u64>,

    /// Event name (e.g. `"MESSAGE_CREATE"`); only present for Dispatch.
    pub t: Option<String>,
}

impl GatewayPayload {
    /// An outgoing payload with the given opcode and data.
    pub fn outgoing(op: u8, d: Option<Value>) -> Self {
        Self {
            op,
            d,
            s: None,
            t: None,
        }
    }
}

/// The `d` field of an opcode 10 (Hello) payload.
#[derive(Debug, Clone, Deserialize)]
pub struct HelloData {
    /// Interval (in milliseconds) between sending heartbeats.
    pub heartbeat_interval: u64,
}

/// The `d` field of an opcode 2 (Identify) payload.
#[derive(Debug, Clone, Serialize)]
pub struct IdentifyPayload {
    pub token: String,
    pub intents: u32,
    pub properties: ConnectionProperties,
}

/// Connection properties sent in the Identify payload.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionProperties {
    pub os: String,
    pub browser: String,
    pub device: String,
}

/// The `d` field of an opcode 6 (Resume) payload.
#[derive(Debug, Clone, Serialize)]
pub struct ResumePayload {
    pub token: String,
    pub session_id: String,
    pub seq: u64,
}

/// The `d` field of an opcode 8 (Request Guild Members) payload.
///
/// An empty `query` with `limit` 0 asks for every member.
#[derive(Debug, Clone, Serialize)]
pub struct RequestGuildMembers {
    pub guild_id: String,
    pub query: String,
    pub limit: u32,
}

impl RequestGuildMembers {
    pub fn all(guild_id: &str) -> Self {
        Self {
            guild_id: guild_id.to_owned(),
            query: String::new(),
            limit: 0,
        }
    }
}

// ── Dispatch payloads ───────────────────────────────────────────────────

/// A guild entry in READY; full data follows in `GUILD_CREATE`.
#[derive(Debug, Clone, Deserialize)]
pub struct UnavailableGuild {
    pub id: String,
}

/// The `d` field of a READY event.
#[derive(Debug, Clone, Deserialize)]
pub struct ReadyEvent {
    /// Gateway version.
    pub v: u32,

    /// The bot user object.
    pub user: User,

    /// Session ID for resuming.
    pub session_id: String,

    /// The gateway URL for resuming.
    pub resume_gateway_url: Option<String>,

    #[serde(default)]
    pub guilds: Vec<UnavailableGuild>,
}

/// Guild-specific part of a message author.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartialMember {
    #[serde(default)]
    pub nick: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Attachment {
    pub id: String,
    pub url: String,
}

/// A message reference (for replies).
#[derive(Debug, Clone, Deserialize)]
pub struct MessageReference {
    /// The ID of the message being referenced.
    pub message_id: Option<String>,
}

/// A `MESSAGE_CREATE` event payload.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageCreate {
    /// Unique message ID.
    pub id: String,

    /// Channel ID where the message was sent.
    pub channel_id: String,

    /// Guild (server) ID, absent for direct messages.
    pub guild_id: Option<String>,

    /// Text content of the message.
    #[serde(default)]
    pub content: String,

    /// The author of the message.
    pub author: User,

    /// The author's guild data.
    #[serde(default)]
    pub member: Option<PartialMember>,

    #[serde(default)]
    pub attachments: Vec<Attachment>,

    /// Reference to the message being replied to.
    pub message_reference: Option<MessageReference>,
}

/// A `MESSAGE_DELETE` event payload.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageDelete {
    pub id: String,
    pub channel_id: String,
    pub guild_id: Option<String>,
}

/// Emoji of a reaction. Only the name is relayed; for a custom emoji it
/// is the bare name without id.
#[derive(Debug, Clone, Deserialize)]
pub struct ReactionEmoji {
    pub name: Option<String>,
}

/// A `MESSAGE_REACTION_ADD` event payload.
#[derive(Debug, Clone, Deserialize)]
pub struct ReactionAdd {
    pub user_id: String,
    pub channel_id: String,
    pub message_id: String,
    pub guild_id: Option<String>,
    pub emoji: ReactionEmoji,
}

/// A `TYPING_START` event payload.
#[derive(Debug, Clone, Deserialize)]
pub struct TypingStart {
    pub channel_id: String,
    pub guild_id: Option<String>,
    pub user_id: String,
}

/// `GUILD_MEMBERS_CHUNK`.
#[derive(Debug, Clone, Deserialize)]
pub struct MembersChunk {
    pub guild_id: String,
    #[serde(default)]
    pub members: Vec<Member>,
}

/// `GUILD_MEMBER_ADD` / `GUILD_MEMBER_UPDATE`.
#[derive(Debug, Clone, Deserialize)]
pub struct MemberUpdate {
    pub guild_id: String,
    #[serde(flatten)]
    pub member: Member,
}

/// `GUILD_MEMBER_REMOVE`.
#[derive(Debug, Clone, Deserialize)]
pub struct MemberRemove {
    pub guild_id: String,
    pub user: User,
}

/// `GUILD_ROLE_CREATE` / `GUILD_ROLE_UPDATE`.
#[derive(Debug, Clone, Deserialize)]
pub struct RoleUpdate {
    pub guild_id: String,
    pub role: Role,
}

/// `GUILD_ROLE_DELETE`.
#[derive(Debug, Clone, Deserialize)]
pub struct RoleDelete {
    pub guild_id: String,
    pub role_id: String,
}

/// `GUILD_EMOJIS_UPDATE`.
#[derive(Debug, Clone, Deserialize)]
pub struct EmojisUpdate {
    pub guild_id: String,
    #[serde(default)]
    pub emojis: Vec<Emoji>,
}

/// `CHANNEL_CREATE` / `CHANNEL_UPDATE` / `CHANNEL_DELETE`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelUpdate {
    pub guild_id: Option<String>,
    #[serde(flatten)]
    pub channel: ChannelEntry,
}

/// A decoded dispatch the bridge cares about.
#[derive(Debug, Clone)]
pub enum DiscordEvent {
    Ready(ReadyEvent),
    GuildCreate(GuildSnapshot),
    MembersChunk(MembersChunk),
    MemberUpsert(MemberUpdate),
    MemberRemove(MemberRemove),
    RoleUpsert(RoleUpdate),
    RoleDelete(RoleDelete),
    EmojisUpdate(EmojisUpdate),
    ChannelUpsert(ChannelUpdate),
    ChannelDelete(ChannelUpdate),
    MessageCreate(MessageCreate),
    MessageDelete(MessageDelete),
    ReactionAdd(ReactionAdd),
    TypingStart(TypingStart),
}

impl DiscordEvent {
    /// Decode the `d` field of a dispatch named `name`.
    ///
    /// Returns `Ok(None)` for events the bridge does not handle.
    pub fn from_dispatch(name: &str, d: Value) -> Result<Option<Self>, serde_json::Error> {
        let event = match name {
            "READY" => Self::Ready(serde_json::from_value(d)?),
            "GUILD_CREATE" => Self::GuildCreate(serde_json::from_value(d)?),
            "GUILD_MEMBERS_CHUNK" => Self::MembersChunk(serde_json::from_value(d)?),
            "GUILD_MEMBER_ADD" | "GUILD_MEMBER_UPDATE" => {
                Self::MemberUpsert(serde_json::from_value(d)?)
            }
            "GUILD_MEMBER_REMOVE" => Self::MemberRemove(serde_json::from_value(d)?),
            "GUILD_ROLE_CREATE" | "GUILD_ROLE_UPDATE" => {
                Self::RoleUpsert(serde_json::from_value(d)?)
            }
            "GUILD_ROLE_DELETE" => Self::RoleDelete(serde_json::from_value(d)?),
            "GUILD_EMOJIS_UPDATE" => Self::EmojisUpdate(serde_json::from_value(d)?),
            "CHANNEL_CREATE" | "CHANNEL_UPDATE" => Self::ChannelUpsert(serde_json::from_value(d)?),
            "CHANNEL_DELETE" => Self::ChannelDelete(serde_json::from_value(d)?),
            "MESSAGE_CREATE" => Self::MessageCreate(serde_json::from_value(d)?),
            "MESSAGE_DELETE" => Self::MessageDelete(serde_json::from_value(d)?),
            "MESSAGE_REACTION_ADD" => Self::ReactionAdd(serde_json::from_value(d)?),
            "TYPING_START" => Self::TypingStart(serde_json::from_value(d)?),
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}

// ── REST ────────────────────────────────────────────────────────────────

/// Rate limit information parsed from Discord REST API response headers.
#[derive(Debug, Clone)]
pub struct RateLimitInfo {
    /// Number of remaining requests in the current window.
    pub remaining: Option<u32>,

    /// Time in seconds until the rate limit resets.
    pub reset_after: Option<f64>,

    /// The rate limit bucket identifier.
    pub bucket: Option<String>,
}

impl RateLimitInfo {
    /// Parse rate limit information from HTTP response headers.
    pub fn from_headers(headers: &reqwest::header::HeaderMap) -> Self {
        let get = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
        Self {
            remaining: get("x-ratelimit-remaining").and_then(|v| v.parse().ok()),
            reset_after: get("x-ratelimit-reset-after").and_then(|v| v.parse().ok()),
            bucket: get("x-ratelimit-bucket").map(String::from),
        }
    }

    /// Check if we are rate limited (remaining == 0).
    pub fn is_limited(&self) -> bool {
        self.remaining == Some(0)
    }

    /// Get the number of milliseconds to wait before retrying.
    pub fn retry_after_ms(&self) -> Option<u64> {
        self.reset_after.map(|s| (s * 1000.0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dispatch(name: &str, d: Value) -> DiscordEvent {
        DiscordEvent::from_dispatch(name, d).unwrap().unwrap()
    }

    #[test]
    fn deserialize_hello() {
        let json = r#"{
            "op": 10,
            "d": {"heartbeat_interval": 41250},
            "s": null,
            "t": null
        }"#;
        let payload: GatewayPayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.op, OP_HELLO);
        assert!(payload.s.is_none());

        let hello: HelloData = serde_json::from_value(payload.d.unwrap()).unwrap();
        assert_eq!(hello.heartbeat_interval, 41250);
    }

    #[test]
    fn deserialize_message_create_with_member_and_attachments() {
        let event = dispatch(
            "MESSAGE_CREATE",
            serde_json::json!({
                "id": "123",
                "channel_id": "456",
                "guild_id": "1",
                "content": "hi",
                "author": {"id": "789", "username": "user", "accent_color": 255},
                "member": {"nick": "Nick", "roles": ["10"]},
                "attachments": [{"id": "a1", "url": "https://cdn.example/x.png", "filename": "x.png"}],
                "message_reference": {"message_id": "100", "channel_id": "456"}
            }),
        );
        let DiscordEvent::MessageCreate(msg) = event else {
            panic!("wrong variant");
        };
        assert_eq!(msg.author.accent_color, Some(255));
        assert_eq!(msg.member.unwrap().nick.as_deref(), Some("Nick"));
        assert_eq!(msg.attachments[0].url, "https://cdn.example/x.png");
        assert_eq!(
            msg.message_reference.unwrap().message_id.as_deref(),
            Some("100")
        );
    }

    #[test]
    fn deserialize_dm_message_no_guild() {
        let msg: MessageCreate = serde_json::from_str(
            r#"{"id": "1", "channel_id": "2", "content": "dm", "author": {"id": "3", "username": "u"}}"#,
        )
        .unwrap();
        assert!(msg.guild_id.is_none());
        assert!(msg.member.is_none());
        assert!(msg.attachments.is_empty());
    }

    #[test]
    fn deserialize_ready_with_guilds() {
        let event = dispatch(
            "READY",
            serde_json::json!({
                "v": 10,
                "user": {"id": "123", "username": "bot", "bot": true},
                "session_id": "abc-def",
                "resume_gateway_url": "wss://gateway-resume.discord.gg",
                "guilds": [{"id": "1", "unavailable": true}, {"id": "2", "unavailable": true}]
            }),
        );
        let DiscordEvent::Ready(ready) = event else {
            panic!("wrong variant");
        };
        assert_eq!(ready.user.id, "123");
        assert!(ready.user.bot);
        assert_eq!(ready.guilds.len(), 2);
    }

    #[test]
    fn deserialize_guild_create_as_snapshot() {
        let event = dispatch(
            "GUILD_CREATE",
            serde_json::json!({
                "id": "1",
                "name": "Guild",
                "roles": [{"id": "10", "name": "mods", "color": 0, "position": 1, "mentionable": true}],
                "channels": [{"id": "50", "name": "general", "type": 0}],
                "emojis": [],
                "members": []
            }),
        );
        let DiscordEvent::GuildCreate(guild) = event else {
            panic!("wrong variant");
        };
        assert_eq!(guild.id, "1");
        assert!(guild.role("10").unwrap().mentionable);
    }

    #[test]
    fn deserialize_member_update_flattened() {
        let event = dispatch(
            "GUILD_MEMBER_UPDATE",
            serde_json::json!({
                "guild_id": "1",
                "user": {"id": "100", "username": "alice"},
                "nick": null,
                "roles": ["10"]
            }),
        );
        let DiscordEvent::MemberUpsert(update) = event else {
            panic!("wrong variant");
        };
        assert_eq!(update.guild_id, "1");
        assert_eq!(update.member.user.username, "alice");
        assert!(update.member.nick.is_none());
    }

    #[test]
    fn deserialize_reaction_and_typing() {
        let event = dispatch(
            "MESSAGE_REACTION_ADD",
            serde_json::json!({
                "user_id": "1", "channel_id": "2", "message_id": "3",
                "emoji": {"id": null, "name": "👍"}
            }),
        );
        let DiscordEvent::ReactionAdd(reaction) = event else {
            panic!("wrong variant");
        };
        assert_eq!(reaction.emoji.name.as_deref(), Some("👍"));

        let event = dispatch(
            "TYPING_START",
            serde_json::json!({"user_id": "1", "channel_id": "2", "timestamp": 1}),
        );
        assert!(matches!(event, DiscordEvent::TypingStart(_)));
    }

    #[test]
    fn unknown_dispatch_is_ignored() {
        assert!(
            DiscordEvent::from_dispatch("PRESENCE_UPDATE", serde_json::json!({}))
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn malformed_dispatch_is_an_error() {
        assert!(DiscordEvent::from_dispatch("MESSAGE_DELETE", serde_json::json!({})).is_err());
    }

    #[test]
    fn serialize_identify() {
        let identify = IdentifyPayload {
            token: "my-token".into(),
            intents: 36363,
            properties: ConnectionProperties {
                os: "linux".into(),
                browser: "ircord".into(),
                device: "ircord".into(),
            },
        };
        let payload =
            GatewayPayload::outgoing(OP_IDENTIFY, Some(serde_json::to_value(&identify).unwrap()));
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["op"], 2);
        assert_eq!(json["d"]["token"], "my-token");
        assert_eq!(json["d"]["intents"], 36363);
    }

    #[test]
    fn serialize_request_guild_members() {
        let payload = GatewayPayload::outgoing(
            OP_REQUEST_GUILD_MEMBERS,
            Some(serde_json::to_value(RequestGuildMembers::all("42")).unwrap()),
        );
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["op"], 8);
        assert_eq!(json["d"]["guild_id"], "42");
        assert_eq!(json["d"]["query"], "");
        assert_eq!(json["d"]["limit"], 0);
    }

    #[test]
    fn serialize_resume() {
        let resume = ResumePayload {
            token: "my-token".into(),
            session_id: "session-123".into(),
            seq: 42,
        };
        let payload =
            GatewayPayload::outgoing(OP_RESUME, Some(serde_json::to_value(&resume).unwrap()));
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["op"], 6);
        assert_eq!(json["d"]["session_id"], "session-123");
        assert_eq!(json["d"]["seq"], 42);
    }

    #[test]
    fn rate_limit_info_from_headers() {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("x-ratelimit-remaining", "0".parse().unwrap());
        headers.insert("x-ratelimit-reset-after", "1.5".parse().unwrap());
        headers.insert("x-ratelimit-bucket", "abc123".parse().unwrap());

        let info = RateLimitInfo::from_headers(&headers);
        assert!(info.is_limited());
        assert_eq!(info.retry_after_ms(), Some(1500));
        assert_eq!(info.bucket.as_deref(), Some("abc123"));
    }

    #[test]
    fn deserialize_invalid_session() {
        let json = r#"{"op": 9, "d": false, "s": null, "t": null}"#;
        let payload: GatewayPayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.op, OP_INVALID_SESSION);
        assert_eq!(payload.d.unwrap(), serde_json::json!(false));
    }
}
