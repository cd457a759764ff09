//! Callback traits between the connection loops and the relay.
//!
//! - [`IrcHandler`] -- implemented by the relay, driven by
//!   [`IrcClient`](crate::irc::IrcClient)
//! - [`DiscordHandler`] -- implemented by the relay, driven by
//!   [`DiscordGateway`](crate::discord::DiscordGateway)
//!
//! Handlers never return errors: anything that goes wrong while relaying
//! one event is logged and the loop moves on to the next.

use async_trait::async_trait;

use crate::discord::events::DiscordEvent;
use crate::irc::link::SessionInfo;
use crate::irc::message::Message;

/// Receives IRC connection lifecycle events and messages.
#[async_trait]
pub trait IrcHandler: Send + Sync {
    /// The socket is open and registration is about to start.
    async fn on_connect(&self);

    /// A message arrived after registration. `session` reflects the nick
    /// and capabilities at the time of arrival.
    async fn on_message(&self, msg: Message, session: SessionInfo);

    /// The connection closed or failed.
    async fn on_disconnect(&self);
}

/// Receives decoded Discord gateway dispatches.
#[async_trait]
pub trait DiscordHandler: Send + Sync {
    async fn on_event(&self, event: DiscordEvent);
}
