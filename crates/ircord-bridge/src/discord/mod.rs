//! Discord side: gateway events, the gateway loop, the REST client and
//! the roster cache.

pub mod api;
pub mod events;
pub mod gateway;
pub mod roster;

pub use api::{DiscordApi, DiscordApiClient};
pub use events::DiscordEvent;
pub use gateway::DiscordGateway;
pub use roster::RosterCache;
