//! Bridge configuration.
//!
//! Loaded once at startup from a YAML file:
//!
//! ```yaml
//! discord:
//!   tokenEnv: DISCORD_TOKEN
//! irc:
//!   server: irc.libera.chat
//!   nickname: ircord
//! channels:
//!   "123456789012345678": "#general"
//! ```
//!
//! Field names accept both `snake_case` and `camelCase`. The flat layout
//! with top-level `discordToken`, `server: host:port` and `nickname` keys
//! is read too; nested settings win when both are given.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};
use crate::secret::SecretString;

/// Valid authentication methods for the IRC side.
const VALID_AUTH_METHODS: &[&str] = &["none", "nickserv"];

/// Root configuration object.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Discord bot settings.
    #[serde(default)]
    pub discord: DiscordConfig,

    /// IRC connection settings.
    #[serde(default)]
    pub irc: IrcConfig,

    /// Bridged channels: Discord channel ID to IRC channel name.
    #[serde(default)]
    pub channels: BTreeMap<String, String>,

    /// Maximum number of IRC/Discord message-id pairs remembered for
    /// replies, deletions and reactions. `0` keeps every pair.
    #[serde(default = "default_correlation_capacity", alias = "correlationCapacity")]
    pub correlation_capacity: usize,
}

fn default_correlation_capacity() -> usize {
    10_000
}

/// Discord bot configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    /// Bot token from the Discord Developer Portal.
    #[serde(default, alias = "discordToken")]
    pub token: SecretString,

    /// Environment variable holding the bot token, used when `token` is empty.
    #[serde(default, alias = "tokenEnv")]
    pub token_env: Option<String>,

    /// Gateway WebSocket URL.
    #[serde(default = "default_gateway_url", alias = "gatewayUrl")]
    pub gateway_url: String,

    /// Gateway intents bitmask.
    #[serde(default = "default_intents")]
    pub intents: u32,

    /// Delay in seconds between gateway reconnection attempts.
    #[serde(default = "default_reconnect_delay_secs", alias = "reconnectDelaySecs")]
    pub reconnect_delay_secs: u64,
}

fn default_gateway_url() -> String {
    "wss://gateway.discord.gg/?v=10&encoding=json".into()
}

fn default_intents() -> u32 {
    // GUILDS | GUILD_MEMBERS | GUILD_EMOJIS_AND_STICKERS | GUILD_MESSAGES
    // | GUILD_MESSAGE_REACTIONS | GUILD_MESSAGE_TYPING | MESSAGE_CONTENT
    1 | (1 << 1) | (1 << 3) | (1 << 9) | (1 << 10) | (1 << 11) | (1 << 15)
}

fn default_reconnect_delay_secs() -> u64 {
    15
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token: SecretString::default(),
            token_env: None,
            gateway_url: default_gateway_url(),
            intents: default_intents(),
            reconnect_delay_secs: default_reconnect_delay_secs(),
        }
    }
}

impl DiscordConfig {
    /// The bot token, falling back to `token_env` when `token` is empty.
    pub fn resolve_token(&self) -> Option<SecretString> {
        if !self.token.is_empty() {
            return Some(self.token.clone());
        }
        self.token_env
            .as_deref()
            .and_then(|name| std::env::var(name).ok())
            .filter(|value| !value.is_empty())
            .map(SecretString::from)
    }
}

/// IRC connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IrcConfig {
    /// IRC server hostname (e.g. `"irc.libera.chat"`).
    #[serde(default)]
    pub server: String,

    /// IRC server port (default 6697).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Whether to use TLS for the connection (default `true`).
    #[serde(default = "default_use_tls", alias = "useTls")]
    pub use_tls: bool,

    /// Bot nickname on the IRC network.
    #[serde(default)]
    pub nickname: String,

    /// Username sent in `USER`.
    #[serde(default = "default_username")]
    pub username: String,

    /// Real name sent in `USER`.
    #[serde(default = "default_realname", alias = "realName")]
    pub realname: String,

    /// Authentication method: `"none"` or `"nickserv"`.
    #[serde(default = "default_auth_method", alias = "authMethod")]
    pub auth_method: String,

    /// Environment variable name that holds the NickServ password.
    #[serde(default, alias = "passwordEnv")]
    pub password_env: Option<String>,

    /// Delay in seconds before reconnecting after a disconnect (default 15).
    #[serde(default = "default_reconnect_delay_secs", alias = "reconnectDelaySecs")]
    pub reconnect_delay_secs: u64,
}

fn default_port() -> u16 {
    6697
}

fn default_use_tls() -> bool {
    true
}

fn default_username() -> String {
    "ircord".into()
}

fn default_realname() -> String {
    "ircord IRC/Discord bridge".into()
}

fn default_auth_method() -> String {
    "none".into()
}

impl Default for IrcConfig {
    fn default() -> Self {
        Self {
            server: String::new(),
            port: default_port(),
            use_tls: default_use_tls(),
            nickname: String::new(),
            username: default_username(),
            realname: default_realname(),
            auth_method: default_auth_method(),
            password_env: None,
            reconnect_delay_secs: default_reconnect_delay_secs(),
        }
    }
}

impl IrcConfig {
    /// The NickServ password read from `password_env`, if any.
    pub fn password(&self) -> Option<SecretString> {
        self.password_env
            .as_deref()
            .and_then(|name| std::env::var(name).ok())
            .filter(|value| !value.is_empty())
            .map(SecretString::from)
    }
}

impl BridgeConfig {
    /// Parse a configuration from YAML text. Does not validate.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let mut config: Self = serde_yaml::from_str(text)?;
        let flat: FlatKeys = serde_yaml::from_str(text)?;
        config.apply_flat(flat)?;
        Ok(config)
    }

    /// Fill settings left empty by the nested sections from top-level keys.
    fn apply_flat(&mut self, flat: FlatKeys) -> Result<()> {
        if self.discord.token.is_empty()
            && let Some(token) = flat.discord_token
        {
            self.discord.token = token;
        }
        if self.irc.nickname.is_empty()
            && let Some(nickname) = flat.nickname
        {
            self.irc.nickname = nickname;
        }
        if self.irc.server.is_empty()
            && let Some(server) = flat.server
        {
            let (host, port) = split_host_port(&server)?;
            self.irc.server = host.to_owned();
            if let Some(port) = port {
                self.irc.port = port;
            }
        }
        Ok(())
    }

    /// Read, parse and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_yaml_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the whole configuration.
    pub fn validate(&self) -> Result<()> {
        validate_config(self).map_err(|reason| BridgeError::ConfigInvalid { reason })
    }
}

/// Top-level keys of the flat layout.
#[derive(Debug, Default, Deserialize)]
struct FlatKeys {
    #[serde(default, alias = "discordToken")]
    discord_token: Option<SecretString>,
    #[serde(default)]
    server: Option<String>,
    #[serde(default)]
    nickname: Option<String>,
}

/// Split `host:port`, `host` or `[v6]:port`.
fn split_host_port(server: &str) -> Result<(&str, Option<u16>)> {
    let invalid = || BridgeError::ConfigInvalid {
        reason: format!("server must be host or host:port, got {server:?}"),
    };
    if let Some(rest) = server.strip_prefix('[') {
        let (host, after) = rest.split_once(']').ok_or_else(invalid)?;
        return match after.strip_prefix(':') {
            Some(port) => Ok((host, Some(port.parse::<u16>().map_err(|_| invalid())?))),
            None if after.is_empty() => Ok((host, None)),
            None => Err(invalid()),
        };
    }
    match server.rsplit_once(':') {
        Some((host, port)) => Ok((host, Some(port.parse::<u16>().map_err(|_| invalid())?))),
        None => Ok((server, None)),
    }
}

/// Validate the bridge configuration.
///
/// Checks:
/// - `irc.server` and `irc.nickname` are non-empty and free of injection characters
/// - `irc.auth_method` is known, and `nickserv` comes with `password_env`
/// - a Discord token (inline or via `token_env`) is configured
/// - every Discord channel key is a numeric snowflake
/// - every IRC channel name starts with `#` or `&` and is mapped only once
pub fn validate_config(config: &BridgeConfig) -> std::result::Result<(), String> {
    let irc = &config.irc;
    if irc.server.is_empty() {
        return Err("irc.server is required".into());
    }
    sanitize_irc_argument(&irc.server).map_err(|e| format!("invalid irc.server: {e}"))?;

    if irc.nickname.is_empty() {
        return Err("irc.nickname is required".into());
    }
    sanitize_irc_argument(&irc.nickname).map_err(|e| format!("invalid irc.nickname: {e}"))?;
    sanitize_irc_argument(&irc.username).map_err(|e| format!("invalid irc.username: {e}"))?;

    if !VALID_AUTH_METHODS.contains(&irc.auth_method.as_str()) {
        return Err(format!(
            "irc.auth_method must be one of {:?}, got {:?}",
            VALID_AUTH_METHODS, irc.auth_method
        ));
    }
    if irc.auth_method == "nickserv" && irc.password_env.is_none() {
        return Err("irc.password_env is required when auth_method is \"nickserv\"".into());
    }

    if config.discord.token.is_empty() && config.discord.token_env.is_none() {
        return Err("discord.token or discord.token_env is required".into());
    }

    if config.channels.is_empty() {
        return Err("at least one channel mapping is required".into());
    }
    let mut seen = HashSet::new();
    for (discord_id, irc_name) in &config.channels {
        if discord_id.is_empty() || !discord_id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(format!(
                "discord channel id must be a numeric snowflake, got {discord_id:?}"
            ));
        }
        if !irc_name.starts_with('#') && !irc_name.starts_with('&') {
            return Err(format!(
                "irc channel name must start with '#' or '&', got {irc_name:?}"
            ));
        }
        sanitize_channel_name(irc_name).map_err(|e| format!("invalid irc channel: {e}"))?;
        if !seen.insert(irc_name.to_lowercase()) {
            return Err(format!("irc channel {irc_name:?} is mapped more than once"));
        }
    }

    Ok(())
}

/// Sanitize an IRC channel name.
///
/// The leading `#` or `&` is allowed; the remainder must not contain
/// characters that break IRC framing or parameter parsing.
pub fn sanitize_channel_name(name: &str) -> std::result::Result<&str, String> {
    let mut chars = name.chars();
    if chars.next().is_none() {
        return Err("empty channel name".into());
    }

    const BANNED_CHARS: &[char] = &['\n', '\r', '\0', ' ', ',', '\x07'];

    let body = chars.as_str();
    if let Some(ch) = BANNED_CHARS.iter().find(|ch| body.contains(**ch)) {
        return Err(format!("channel name contains forbidden character: {ch:?}"));
    }
    Ok(name)
}

/// Sanitize a string argument for use in IRC commands.
///
/// Rejects empty arguments and anything containing line terminators,
/// NUL, spaces, or a leading `:`.
pub fn sanitize_irc_argument(arg: &str) -> std::result::Result<&str, String> {
    if arg.is_empty() {
        return Err("empty argument".into());
    }
    if arg.starts_with(':') {
        return Err("argument must not start with ':'".into());
    }

    const BANNED_CHARS: &[char] = &['\n', '\r', '\0', ' '];

    if let Some(ch) = BANNED_CHARS.iter().find(|ch| arg.contains(**ch)) {
        return Err(format!("argument contains forbidden character: {ch:?}"));
    }
    Ok(arg)
}
