//! Rich-text translation between IRC and Discord.
//!
//! IRC encodes formatting as single control bytes interleaved with the
//! text; Discord uses a markdown dialect with mentions, custom emoji and
//! timestamps. Neither model is a superset of the other, so both
//! directions are lossy on purpose.
//!
//! # Direction IRC → Discord
//!
//! ```text
//! control-code text ──irc_to_discord()──> escaped markdown
//!                   ──resolve_mentions()──> markdown with <@id>, <:emoji:id>
//! ```
//!
//! # Direction Discord → IRC
//!
//! ```text
//! markdown ──markdown::parse()──> Vec<Node> ──render_irc()──> control-code text
//! ```
//!
//! Name lookups go through a read-only [`GuildSnapshot`]; a failed lookup
//! never aborts a translation, it degrades to a placeholder or to the
//! original text.

pub mod codes;
pub mod markdown;
pub mod resolve;
pub mod roster;
pub mod style;
pub mod timestamp;
pub mod to_discord;
pub mod to_irc;

pub use markdown::Node;
pub use resolve::resolve_mentions;
pub use roster::GuildSnapshot;
pub use style::StyleState;
pub use to_discord::irc_to_discord;
pub use to_irc::{RenderContext, discord_to_irc, render_irc};
