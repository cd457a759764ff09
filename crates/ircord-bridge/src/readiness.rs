//! IRC handshake gate.

use parking_lot::Mutex;
use tracing::debug;

/// Lifecycle of the IRC connection as seen by the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    /// Socket open; registration, CAP negotiation and channel joins in
    /// progress.
    Handshaking,
    /// The `PING ready` probe was answered; events are relayed.
    Ready,
}

/// Shared view of [`ConnectionState`].
#[derive(Debug, Default)]
pub struct Readiness {
    state: Mutex<ConnectionState>,
}

impl Readiness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == ConnectionState::Ready
    }

    pub fn set(&self, next: ConnectionState) {
        let mut state = self.state.lock();
        if *state != next {
            debug!(from = ?*state, to = ?next, "IRC connection state changed");
            *state = next;
        }
    }
}
