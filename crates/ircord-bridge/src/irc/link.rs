//! Shared write handle to the current IRC connection.

use std::collections::BTreeSet;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use super::message::Message;

/// Capability required to send `REDACT`.
pub const CAP_REDACTION: &str = "draft/message-redaction";

/// Nick and negotiated capabilities of a registered connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionInfo {
    pub nick: String,
    pub caps: BTreeSet<String>,
}

impl SessionInfo {
    pub fn has_cap(&self, cap: &str) -> bool {
        self.caps.contains(cap)
    }

    /// Case-insensitive comparison against the current nick.
    pub fn is_self(&self, nick: &str) -> bool {
        self.nick.eq_ignore_ascii_case(nick)
    }
}

/// A live connection: its [`SessionInfo`] plus the outbound queue the
/// client loop drains.
#[derive(Debug)]
pub struct IrcSession {
    pub info: SessionInfo,
    tx: mpsc::UnboundedSender<Message>,
}

impl IrcSession {
    pub fn new(info: SessionInfo, tx: mpsc::UnboundedSender<Message>) -> Self {
        Self { info, tx }
    }
}

/// Holder for the current [`IrcSession`], if any.
///
/// Writes while disconnected are dropped, not queued.
#[derive(Debug, Default)]
pub struct IrcLink {
    session: Mutex<Option<IrcSession>>,
}

impl IrcLink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, session: IrcSession) {
        *self.session.lock() = Some(session);
    }

    pub fn detach(&self) {
        *self.session.lock() = None;
    }

    pub fn info(&self) -> Option<SessionInfo> {
        self.session.lock().as_ref().map(|s| s.info.clone())
    }

    pub fn set_nick(&self, nick: &str) {
        if let Some(session) = self.session.lock().as_mut() {
            session.info.nick = nick.to_owned();
        }
    }

    /// Queue a message on the current connection.
    ///
    /// Returns `false` when the message was dropped: no connection, the
    /// connection is closing, or a `REDACT` without the redaction
    /// capability.
    pub fn write(&self, msg: Message) -> bool {
        let guard = self.session.lock();
        let Some(session) = guard.as_ref() else {
            debug!(command = %msg.command, "IRC not connected, dropping message");
            return false;
        };
        if msg.command == "REDACT" && !session.info.has_cap(CAP_REDACTION) {
            debug!("server lacks {CAP_REDACTION}, dropping REDACT");
            return false;
        }
        session.tx.send(msg).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(caps: &[&str]) -> (IrcSession, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let info = SessionInfo {
            nick: "bridge".into(),
            caps: caps.iter().map(|c| c.to_string()).collect(),
        };
        (IrcSession::new(info, tx), rx)
    }

    #[test]
    fn writes_are_dropped_while_detached() {
        let link = IrcLink::new();
        assert!(!link.write(Message::join("#a")));
        assert!(link.info().is_none());
    }

    #[test]
    fn writes_reach_the_queue() {
        let link = IrcLink::new();
        let (s, mut rx) = session(&[]);
        link.attach(s);
        assert!(link.write(Message::join("#a")));
        assert_eq!(rx.try_recv().unwrap(), Message::join("#a"));

        link.detach();
        assert!(!link.write(Message::join("#b")));
    }

    #[test]
    fn redact_requires_capability() {
        let link = IrcLink::new();
        let (s, mut rx) = session(&[]);
        link.attach(s);
        assert!(!link.write(Message::new("REDACT", ["#a", "id"])));
        assert!(rx.try_recv().is_err());

        let (s, mut rx) = session(&[CAP_REDACTION]);
        link.attach(s);
        assert!(link.write(Message::new("REDACT", ["#a", "id"])));
        assert_eq!(rx.try_recv().unwrap().command, "REDACT");
    }

    #[test]
    fn nick_updates_and_self_check() {
        let link = IrcLink::new();
        let (s, _rx) = session(&[]);
        link.attach(s);
        link.set_nick("bridge_");
        let info = link.info().unwrap();
        assert_eq!(info.nick, "bridge_");
        assert!(info.is_self("BRIDGE_"));
        assert!(!info.is_self("bridge"));
    }
}
