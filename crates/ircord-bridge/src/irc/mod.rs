//! IRC side: message codec, connection loop and the shared write link.

pub mod client;
pub mod codec;
pub mod link;
pub mod message;

pub use client::IrcClient;
pub use codec::IrcCodec;
pub use link::{IrcLink, IrcSession, SessionInfo};
pub use message::{Message, Prefix, Tag};
