//! # ircord-types
//!
//! Shared type definitions for the ircord IRC/Discord bridge.
//!
//! Every other ircord crate depends on this one. It contains:
//!
//! - **[`error`]** -- [`BridgeError`] and [`ChannelError`] error types
//! - **[`config`]** -- YAML configuration schema and validation
//! - **[`secret`]** -- [`SecretString`] for tokens and passwords

pub mod config;
pub mod error;
pub mod secret;

pub use error::{BridgeError, ChannelError, Result};
pub use secret::SecretString;
