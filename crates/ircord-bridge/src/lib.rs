//! IRC/Discord relay.
//!
//! Two long-lived connection loops feed one shared [`Bridge`] context:
//!
//! ```text
//! IrcClient ──IrcHandler::on_message──>  Bridge  <──DiscordHandler::on_event── DiscordGateway
//!     ^                                  │    │
//!     └──────── IrcLink::write ──────────┘    └──── DiscordApi (REST) ──> Discord
//! ```
//!
//! [`Bridge`] translates every inbound event into a list of
//! [`Action`]s and executes them, recording which IRC message produced
//! which Discord message (and the other way round) in the
//! [`CorrelationStore`] so replies, deletions and reactions can follow.
//!
//! # Error handling
//!
//! Connection and send failures surface as
//! [`ChannelError`](ircord_types::ChannelError); the connection loops
//! log them and reconnect after a fixed delay.

pub mod channel_map;
pub mod correlation;
pub mod discord;
pub mod dispatch;
pub mod irc;
pub mod readiness;
pub mod traits;

pub use channel_map::ChannelMap;
pub use correlation::CorrelationStore;
pub use discord::{DiscordApi, DiscordApiClient, DiscordEvent, DiscordGateway, RosterCache};
pub use dispatch::{Action, Bridge};
pub use irc::{IrcClient, IrcLink, Message, SessionInfo};
pub use readiness::{ConnectionState, Readiness};
pub use traits::{DiscordHandler, IrcHandler};

pub use ircord_types::ChannelError;
