//! Error types for the bridge.
//!
//! [`BridgeError`] is the top-level error type, used at startup where a
//! failure is allowed to stop the process. [`ChannelError`] covers the
//! two transports; those errors are logged and retried, except a rejected
//! credential, which stops the bridge.

use thiserror::Error;

/// Top-level error type for the bridge.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum BridgeError {
    /// Configuration is malformed or semantically invalid.
    #[error("invalid config: {reason}")]
    ConfigInvalid {
        /// What is wrong with the configuration.
        reason: String,
    },

    /// Underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML configuration could not be parsed.
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

}

/// Transport-level error type.
///
/// Used by the IRC client and the Discord gateway / REST client to report
/// failures in connecting, authenticating, or exchanging messages.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ChannelError {
    /// Failed to establish a connection to the server.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The server rejected our credentials; retrying will not help.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// Sending a message failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Receiving a message failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// Catch-all for errors that do not fit other variants.
    #[error("{0}")]
    Other(String),
}

impl From<std::io::Error> for ChannelError {
    fn from(err: std::io::Error) -> Self {
        ChannelError::ConnectionFailed(err.to_string())
    }
}

/// A convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, BridgeError>;
