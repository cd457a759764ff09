//! CLI command implementations for `ircord`.
//!
//! - [`run`] -- The bridge itself.
//! - [`check`] -- Configuration validation.

pub mod check;
pub mod run;

use std::path::Path;

use anyhow::Context;

use ircord_types::config::BridgeConfig;

/// Configuration file used when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Load and validate the configuration at `path` (or the default path).
pub fn load_config(path: Option<&str>) -> anyhow::Result<BridgeConfig> {
    let path = Path::new(path.unwrap_or(DEFAULT_CONFIG_PATH));
    BridgeConfig::load(path).with_context(|| format!("loading {}", path.display()))
}
