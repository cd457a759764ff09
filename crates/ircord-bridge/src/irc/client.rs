//! [`IrcClient`] -- connection loop for the IRC side.
//!
//! Owns the socket: connects (TLS or plaintext), registers, negotiates
//! IRCv3 capabilities, answers `PING`, and hands every other message to
//! an [`IrcHandler`]. Outbound messages arrive through the
//! [`IrcLink`] queue. On any failure the loop waits
//! `reconnect_delay_secs` and starts over, forever, until cancelled.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use ircord_types::ChannelError;
use ircord_types::config::IrcConfig;

use crate::traits::IrcHandler;

use super::codec::IrcCodec;
use super::link::{CAP_REDACTION, IrcLink, IrcSession, SessionInfo};
use super::message::Message;

/// Capabilities requested when the server offers them.
pub const WANTED_CAPS: &[&str] = &["message-tags", "echo-message", CAP_REDACTION];

trait AsyncStream: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> AsyncStream for T {}

type IrcStream = Framed<Box<dyn AsyncStream>, IrcCodec>;

/// Why a connection ended without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    Cancelled,
    Closed,
}

/// Registration and capability negotiation state for one connection.
///
/// Pure state machine: feed it server messages, send what it returns.
#[derive(Debug, Clone)]
pub struct Registration {
    nick: String,
    offered: BTreeSet<String>,
    caps: BTreeSet<String>,
    registered: bool,
}

impl Registration {
    pub fn new(nick: &str) -> Self {
        Self {
            nick: nick.to_owned(),
            offered: BTreeSet::new(),
            caps: BTreeSet::new(),
            registered: false,
        }
    }

    /// Lines sent right after connecting.
    pub fn greeting(&self, config: &IrcConfig) -> Vec<Message> {
        vec![
            Message::new("CAP", ["LS", "302"]),
            Message::new("NICK", [self.nick.as_str()]),
            Message::new(
                "USER",
                [config.username.as_str(), "0", "*", config.realname.as_str()],
            ),
        ]
    }

    pub fn nick(&self) -> &str {
        &self.nick
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }

    pub fn session_info(&self) -> SessionInfo {
        SessionInfo {
            nick: self.nick.clone(),
            caps: self.caps.clone(),
        }
    }

    /// Update state from a server message; returns the replies to send.
    pub fn on_message(&mut self, msg: &Message) -> Vec<Message> {
        match msg.command.as_str() {
            "PING" => vec![Message::new("PONG", msg.params.clone())],
            "CAP" => self.on_cap(msg),
            // ERR_NICKNAMEINUSE, ERR_ERRONEUSNICKNAME during registration
            "433" | "432" if !self.registered => {
                self.nick.push('_');
                vec![Message::new("NICK", [self.nick.as_str()])]
            }
            "001" => {
                self.registered = true;
                if let Some(nick) = msg.param(0) {
                    self.nick = nick.to_owned();
                }
                Vec::new()
            }
            "NICK" => {
                if let (Some(old), Some(new)) = (msg.source_nick(), msg.param(0))
                    && old.eq_ignore_ascii_case(&self.nick)
                {
                    self.nick = new.to_owned();
                }
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    fn on_cap(&mut self, msg: &Message) -> Vec<Message> {
        let sub = msg.param(1).unwrap_or_default().to_ascii_uppercase();
        let list = msg.trailing().unwrap_or_default();
        let names = list
            .split_whitespace()
            .map(|c| c.split_once('=').map_or(c, |(name, _)| name).to_owned());
        match sub.as_str() {
            "LS" => {
                self.offered.extend(names);
                // `CAP * LS * :...` announces more lines to come.
                if msg.param(2) == Some("*") {
                    return Vec::new();
                }
                let request: Vec<&str> = WANTED_CAPS
                    .iter()
                    .copied()
                    .filter(|c| self.offered.contains(*c))
                    .collect();
                if request.is_empty() || self.registered {
                    return self.end_negotiation();
                }
                vec![Message::new("CAP", ["REQ".to_owned(), request.join(" ")])]
            }
            "ACK" => {
                for name in names {
                    match name.strip_prefix('-') {
                        Some(removed) => {
                            self.caps.remove(removed);
                        }
                        None => {
                            self.caps.insert(name);
                        }
                    }
                }
                self.end_negotiation()
            }
            "NAK" => self.end_negotiation(),
            "DEL" => {
                for name in names {
                    self.caps.remove(&name);
                }
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    fn end_negotiation(&self) -> Vec<Message> {
        if self.registered {
            Vec::new()
        } else {
            vec![Message::new("CAP", ["END"])]
        }
    }
}

/// IRC connection loop.
pub struct IrcClient {
    config: IrcConfig,
    link: Arc<IrcLink>,
    handler: Arc<dyn IrcHandler>,
}

impl IrcClient {
    pub fn new(config: IrcConfig, link: Arc<IrcLink>, handler: Arc<dyn IrcHandler>) -> Self {
        Self {
            config,
            link,
            handler,
        }
    }

    /// Connect and relay until `cancel` fires, reconnecting after every
    /// failure.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), ChannelError> {
        info!(
            server = %self.config.server,
            port = self.config.port,
            tls = self.config.use_tls,
            "IRC client starting"
        );
        let delay = Duration::from_secs(self.config.reconnect_delay_secs);

        loop {
            match self.connect_once(&cancel).await {
                Ok(SessionEnd::Cancelled) => {
                    self.link.detach();
                    self.handler.on_disconnect().await;
                    break;
                }
                Ok(SessionEnd::Closed) => info!("IRC connection closed by server"),
                Err(e) => error!(error = %e, "IRC connection failed"),
            }
            self.link.detach();
            self.handler.on_disconnect().await;

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {
                    info!("reconnecting to IRC...");
                }
            }
        }

        info!("IRC client stopped");
        Ok(())
    }

    async fn connect_once(&self, cancel: &CancellationToken) -> Result<SessionEnd, ChannelError> {
        let stream = tokio::select! {
            _ = cancel.cancelled() => return Ok(SessionEnd::Cancelled),
            stream = open_stream(&self.config) => stream?,
        };
        let mut framed: IrcStream = Framed::new(stream, IrcCodec::new());
        info!(server = %self.config.server, "IRC connected");
        self.handler.on_connect().await;

        let mut registration = Registration::new(&self.config.nickname);
        for msg in registration.greeting(&self.config) {
            framed.send(msg).await?;
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    let _ = framed.send(Message::new("QUIT", ["bridge shutting down"])).await;
                    return Ok(SessionEnd::Cancelled);
                }
                Some(out) = rx.recv() => {
                    framed.send(out).await?;
                }
                incoming = framed.next() => {
                    let msg = match incoming {
                        Some(Ok(msg)) => msg,
                        Some(Err(e)) => return Err(e),
                        None => return Ok(SessionEnd::Closed),
                    };
                    if msg.command == "ERROR" {
                        warn!(reason = msg.trailing().unwrap_or_default(), "IRC server error");
                        return Ok(SessionEnd::Closed);
                    }

                    let was_registered = registration.is_registered();
                    for reply in registration.on_message(&msg) {
                        framed.send(reply).await?;
                    }

                    if msg.command == "001" && !was_registered {
                        info!(nick = %registration.nick(), "IRC registered");
                        self.identify(&mut framed).await?;
                        self.link.attach(IrcSession::new(registration.session_info(), tx.clone()));
                    } else if registration.is_registered()
                        && self.link.info() != Some(registration.session_info())
                    {
                        // Nick change or late CAP ACK/DEL.
                        self.link.attach(IrcSession::new(registration.session_info(), tx.clone()));
                    }

                    if registration.is_registered() && msg.command != "PING" {
                        self.handler.on_message(msg, registration.session_info()).await;
                    }
                }
            }
        }
    }

    async fn identify(&self, framed: &mut IrcStream) -> Result<(), ChannelError> {
        if self.config.auth_method != "nickserv" {
            return Ok(());
        }
        let Some(password) = self.config.password() else {
            warn!("nickserv auth configured but no password available");
            return Ok(());
        };
        debug!("identifying with NickServ");
        let line = format!("IDENTIFY {}", password.expose());
        framed.send(Message::privmsg("NickServ", &line)).await
    }
}

async fn open_stream(config: &IrcConfig) -> Result<Box<dyn AsyncStream>, ChannelError> {
    let tcp = TcpStream::connect((config.server.as_str(), config.port)).await?;
    if !config.use_tls {
        return Ok(Box::new(tcp));
    }

    let mut roots = rustls::RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let tls_config = rustls::ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .map_err(|e| ChannelError::ConnectionFailed(e.to_string()))?
    .with_root_certificates(roots)
    .with_no_client_auth();

    let server_name = rustls::pki_types::ServerName::try_from(config.server.clone())
        .map_err(|e| ChannelError::ConnectionFailed(format!("invalid server name: {e}")))?;
    let connector = tokio_rustls::TlsConnector::from(Arc::new(tls_config));
    let stream = connector.connect(server_name, tcp).await?;
    Ok(Box::new(stream))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> IrcConfig {
        IrcConfig {
            server: "irc.example.net".into(),
            nickname: "bridge".into(),
            ..IrcConfig::default()
        }
    }

    fn parse(line: &str) -> Message {
        line.parse().unwrap()
    }

    #[test]
    fn greeting_starts_cap_negotiation() {
        let reg = Registration::new("bridge");
        let lines: Vec<String> = reg.greeting(&config()).iter().map(|m| m.to_string()).collect();
        assert_eq!(lines[0], "CAP LS 302");
        assert_eq!(lines[1], "NICK bridge");
        assert!(lines[2].starts_with("USER ircord 0 * "));
    }

    #[test]
    fn requests_only_offered_caps() {
        let mut reg = Registration::new("bridge");
        let out = reg.on_message(&parse(
            ":srv CAP * LS :message-tags sasl=PLAIN echo-message",
        ));
        assert_eq!(out, vec![Message::new("CAP", ["REQ", "message-tags echo-message"])]);
    }

    #[test]
    fn multiline_ls_waits_for_last_line() {
        let mut reg = Registration::new("bridge");
        assert!(reg.on_message(&parse(":srv CAP * LS * :message-tags")).is_empty());
        let out = reg.on_message(&parse(":srv CAP * LS :draft/message-redaction"));
        assert_eq!(
            out,
            vec![Message::new("CAP", ["REQ", "message-tags draft/message-redaction"])]
        );
    }

    #[test]
    fn no_wanted_caps_ends_negotiation() {
        let mut reg = Registration::new("bridge");
        let out = reg.on_message(&parse(":srv CAP * LS :multi-prefix"));
        assert_eq!(out, vec![Message::new("CAP", ["END"])]);
    }

    #[test]
    fn ack_records_caps_and_ends() {
        let mut reg = Registration::new("bridge");
        let out = reg.on_message(&parse(":srv CAP bridge ACK :message-tags draft/message-redaction"));
        assert_eq!(out, vec![Message::new("CAP", ["END"])]);
        let info = reg.session_info();
        assert!(info.has_cap("message-tags"));
        assert!(info.has_cap(CAP_REDACTION));

        reg.on_message(&parse(":srv CAP bridge DEL :message-tags"));
        assert!(!reg.session_info().has_cap("message-tags"));
    }

    #[test]
    fn nak_ends_negotiation() {
        let mut reg = Registration::new("bridge");
        let out = reg.on_message(&parse(":srv CAP * NAK :echo-message"));
        assert_eq!(out, vec![Message::new("CAP", ["END"])]);
    }

    #[test]
    fn nick_collision_appends_underscore() {
        let mut reg = Registration::new("bridge");
        let out = reg.on_message(&parse(":srv 433 * bridge :Nickname is already in use"));
        assert_eq!(out, vec![Message::new("NICK", ["bridge_"])]);
        assert_eq!(reg.nick(), "bridge_");
    }

    #[test]
    fn welcome_confirms_nick() {
        let mut reg = Registration::new("bridge");
        reg.on_message(&parse(":srv 001 bridge__ :Welcome"));
        assert!(reg.is_registered());
        assert_eq!(reg.nick(), "bridge__");
        // Collisions after registration are not ours to fix.
        assert!(reg.on_message(&parse(":srv 433 bridge__ x :in use")).is_empty());
    }

    #[test]
    fn own_nick_change_is_tracked() {
        let mut reg = Registration::new("bridge");
        reg.on_message(&parse(":srv 001 bridge :Welcome"));
        reg.on_message(&parse(":someone!u@h NICK other"));
        assert_eq!(reg.nick(), "bridge");
        reg.on_message(&parse(":bridge!u@h NICK bridge2"));
        assert_eq!(reg.nick(), "bridge2");
    }

    #[test]
    fn ping_is_answered() {
        let mut reg = Registration::new("bridge");
        let out = reg.on_message(&parse("PING :token123"));
        assert_eq!(out, vec![Message::new("PONG", ["token123"])]);
    }
}
