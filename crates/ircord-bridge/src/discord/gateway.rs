//! [`DiscordGateway`] -- connection loop for the Discord side.
//!
//! Speaks the Gateway WebSocket protocol: waits for Hello, identifies (or
//! resumes a previous session), heartbeats, and hands every decoded
//! dispatch to a [`DiscordHandler`]. After READY it asks for the full
//! member list of every guild so mention resolution sees everyone.

use std::fmt::Display;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::{Sink, SinkExt, StreamExt};
use tokio::sync::RwLock;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use ircord_types::ChannelError;
use ircord_types::config::DiscordConfig;
use ircord_types::secret::SecretString;

use crate::traits::DiscordHandler;

use super::events::{
    ConnectionProperties, DiscordEvent, GatewayPayload, HelloData, IdentifyPayload, OP_DISPATCH,
    OP_HEARTBEAT, OP_HEARTBEAT_ACK, OP_HELLO, OP_IDENTIFY, OP_INVALID_SESSION, OP_RECONNECT,
    OP_REQUEST_GUILD_MEMBERS, OP_RESUME, RequestGuildMembers, ResumePayload,
};

/// Heartbeat interval used when Hello never arrives.
const FALLBACK_HEARTBEAT_MS: u64 = 41250;

/// Close code sent when the bot token is rejected.
const CLOSE_AUTHENTICATION_FAILED: u16 = 4004;

/// What the session loop wants the reconnect loop to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    Cancelled,
    Reconnect,
}

/// Discord Gateway client.
pub struct DiscordGateway {
    config: DiscordConfig,
    token: SecretString,
    handler: Arc<dyn DiscordHandler>,
    /// Last received sequence number for heartbeats and resuming.
    sequence: AtomicU64,
    /// Session ID from the READY event (for resuming).
    session_id: RwLock<Option<String>>,
    /// Resume gateway URL from the READY event.
    resume_url: RwLock<Option<String>>,
}

impl DiscordGateway {
    pub fn new(config: DiscordConfig, token: SecretString, handler: Arc<dyn DiscordHandler>) -> Self {
        Self {
            config,
            token,
            handler,
            sequence: AtomicU64::new(0),
            session_id: RwLock::new(None),
            resume_url: RwLock::new(None),
        }
    }

    /// Connect and relay until `cancel` fires, reconnecting after every
    /// failure. A rejected token ends the loop with
    /// [`ChannelError::AuthFailed`].
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), ChannelError> {
        info!("Discord gateway starting");
        let delay = Duration::from_secs(self.config.reconnect_delay_secs);

        loop {
            match self.connect_once(&cancel).await {
                Ok(SessionEnd::Cancelled) => break,
                Ok(SessionEnd::Reconnect) => {}
                Err(e @ ChannelError::AuthFailed(_)) => {
                    error!(error = %e, "Discord gateway giving up");
                    return Err(e);
                }
                Err(e) => error!(error = %e, "Discord gateway connection failed"),
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {
                    info!("reconnecting Discord Gateway...");
                }
            }
        }

        info!("Discord gateway stopped");
        Ok(())
    }

    async fn connect_once(&self, cancel: &CancellationToken) -> Result<SessionEnd, ChannelError> {
        let gateway_url = self
            .resume_url
            .read()
            .await
            .clone()
            .unwrap_or_else(|| self.config.gateway_url.clone());

        let (ws_stream, _) = tokio::select! {
            _ = cancel.cancelled() => return Ok(SessionEnd::Cancelled),
            conn = tokio_tungstenite::connect_async(&gateway_url) => {
                conn.map_err(|e| ChannelError::ConnectionFailed(e.to_string()))?
            }
        };
        info!("Discord Gateway connected");

        let (mut ws_write, mut ws_read) = ws_stream.split();

        // Wait for Hello (opcode 10).
        let heartbeat_interval = loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    let _ = ws_write.close().await;
                    return Ok(SessionEnd::Cancelled);
                }
                msg = ws_read.next() => {
                    match msg {
                        Some(Ok(WsMessage::Text(text))) => {
                            if let Ok(payload) = serde_json::from_str::<GatewayPayload>(&text)
                                && payload.op == OP_HELLO
                                && let Some(d) = payload.d
                                && let Ok(hello) = serde_json::from_value::<HelloData>(d)
                            {
                                break hello.heartbeat_interval;
                            }
                        }
                        Some(Err(e)) => {
                            error!(error = %e, "WebSocket error waiting for Hello");
                            break FALLBACK_HEARTBEAT_MS;
                        }
                        None => break FALLBACK_HEARTBEAT_MS,
                        _ => {}
                    }
                }
            }
        };
        debug!(interval_ms = heartbeat_interval, "received Hello");

        let auth = self.auth_payload().await?;
        send_payload(&mut ws_write, &auth).await?;

        let mut heartbeat_timer =
            tokio::time::interval(Duration::from_millis(heartbeat_interval));
        // First tick fires immediately; skip it.
        heartbeat_timer.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Discord gateway received cancellation");
                    let _ = ws_write.close().await;
                    return Ok(SessionEnd::Cancelled);
                }
                _ = heartbeat_timer.tick() => {
                    if let Err(e) = send_payload(&mut ws_write, &self.heartbeat()).await {
                        warn!(error = %e, "failed to send heartbeat");
                        return Ok(SessionEnd::Reconnect);
                    }
                    debug!(seq = self.sequence.load(Ordering::SeqCst), "sent heartbeat");
                }
                msg = ws_read.next() => {
                    let text = match msg {
                        Some(Ok(WsMessage::Text(text))) => text,
                        Some(Ok(WsMessage::Close(frame))) => {
                            info!(frame = ?frame, "Discord Gateway closed by server");
                            if let Some(e) = fatal_close(frame.as_ref()) {
                                return Err(e);
                            }
                            return Ok(SessionEnd::Reconnect);
                        }
                        Some(Ok(WsMessage::Ping(data))) => {
                            let _ = ws_write.send(WsMessage::Pong(data)).await;
                            continue;
                        }
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => {
                            return Err(ChannelError::ReceiveFailed(e.to_string()));
                        }
                        None => {
                            info!("Discord Gateway stream ended");
                            return Ok(SessionEnd::Reconnect);
                        }
                    };

                    let payload = match serde_json::from_str::<GatewayPayload>(&text) {
                        Ok(payload) => payload,
                        Err(e) => {
                            warn!(error = %e, "failed to parse gateway payload");
                            continue;
                        }
                    };
                    if let Some(s) = payload.s {
                        self.sequence.store(s, Ordering::SeqCst);
                    }

                    match payload.op {
                        OP_DISPATCH => {
                            let requests = self.dispatch(payload).await;
                            for request in &requests {
                                send_payload(&mut ws_write, request).await?;
                            }
                        }
                        OP_HEARTBEAT_ACK => debug!("heartbeat acknowledged"),
                        OP_HEARTBEAT => {
                            // Server requesting immediate heartbeat.
                            send_payload(&mut ws_write, &self.heartbeat()).await?;
                        }
                        OP_RECONNECT => {
                            info!("server requested reconnect");
                            return Ok(SessionEnd::Reconnect);
                        }
                        OP_INVALID_SESSION => {
                            let resumable = payload.d.as_ref().and_then(|v| v.as_bool()).unwrap_or(false);
                            self.invalidate(resumable).await;
                            return Ok(SessionEnd::Reconnect);
                        }
                        op => debug!(op, "unhandled opcode"),
                    }
                }
            }
        }
    }

    /// Resume (op 6) when a previous session exists, Identify (op 2) otherwise.
    async fn auth_payload(&self) -> Result<GatewayPayload, ChannelError> {
        let token = self.token.expose().to_owned();
        let session_id = self.session_id.read().await.clone();
        let (op, d) = match session_id {
            Some(session_id) => {
                let seq = self.sequence.load(Ordering::SeqCst);
                info!(session_id = %session_id, seq, "attempting Resume (OP 6)");
                (
                    OP_RESUME,
                    serde_json::to_value(ResumePayload {
                        token,
                        session_id,
                        seq,
                    }),
                )
            }
            None => {
                debug!("no session_id available, sending Identify (OP 2)");
                (
                    OP_IDENTIFY,
                    serde_json::to_value(IdentifyPayload {
                        token,
                        intents: self.config.intents,
                        properties: ConnectionProperties {
                            os: std::env::consts::OS.to_owned(),
                            browser: "ircord".into(),
                            device: "ircord".into(),
                        },
                    }),
                )
            }
        };
        let d = d.map_err(|e| ChannelError::Other(e.to_string()))?;
        Ok(GatewayPayload::outgoing(op, Some(d)))
    }

    fn heartbeat(&self) -> GatewayPayload {
        let seq = self.sequence.load(Ordering::SeqCst);
        GatewayPayload::outgoing(OP_HEARTBEAT, (seq > 0).then(|| serde_json::json!(seq)))
    }

    /// Decode and forward one dispatch. Returns the member requests to send
    /// after READY.
    async fn dispatch(&self, payload: GatewayPayload) -> Vec<GatewayPayload> {
        let Some(name) = payload.t else {
            return Vec::new();
        };
        if name == "RESUMED" {
            info!("session resumed successfully");
            return Vec::new();
        }

        let d = payload.d.unwrap_or_default();
        let event = match DiscordEvent::from_dispatch(&name, d) {
            Ok(Some(event)) => event,
            Ok(None) => {
                debug!(event = %name, "unhandled dispatch event");
                return Vec::new();
            }
            Err(e) => {
                warn!(event = %name, error = %e, "failed to parse dispatch");
                return Vec::new();
            }
        };

        let mut requests = Vec::new();
        if let DiscordEvent::Ready(ready) = &event {
            info!(
                bot_id = %ready.user.id,
                bot_name = %ready.user.username,
                guilds = ready.guilds.len(),
                "Discord bot authenticated"
            );
            *self.session_id.write().await = Some(ready.session_id.clone());
            *self.resume_url.write().await = ready.resume_gateway_url.clone();
            requests = member_requests(ready.guilds.iter().map(|g| g.id.as_str()));
        }

        self.handler.on_event(event).await;
        requests
    }

    /// Handle op 9. A resumable session keeps its state and waits 1-5 s;
    /// otherwise state is cleared for a fresh Identify.
    async fn invalidate(&self, resumable: bool) {
        if resumable {
            let jitter_ms = 1000
                + (std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .unwrap_or_default()
                    .subsec_millis()
                    % 4000);
            warn!(jitter_ms, "invalid session (resumable), retrying");
            tokio::time::sleep(Duration::from_millis(jitter_ms.into())).await;
        } else {
            warn!("invalid session (not resumable), clearing state for fresh Identify");
            *self.session_id.write().await = None;
            *self.resume_url.write().await = None;
            self.sequence.store(0, Ordering::SeqCst);
        }
    }
}

/// Error for a close frame after which reconnecting cannot succeed.
fn fatal_close(frame: Option<&CloseFrame<'_>>) -> Option<ChannelError> {
    let code = u16::from(frame?.code);
    (code == CLOSE_AUTHENTICATION_FAILED)
        .then(|| ChannelError::AuthFailed("Discord rejected the bot token".into()))
}

/// One op 8 request per guild, asking for every member.
fn member_requests<'a>(guild_ids: impl Iterator<Item = &'a str>) -> Vec<GatewayPayload> {
    guild_ids
        .filter_map(|id| serde_json::to_value(RequestGuildMembers::all(id)).ok())
        .map(|d| GatewayPayload::outgoing(OP_REQUEST_GUILD_MEMBERS, Some(d)))
        .collect()
}

async fn send_payload<S>(sink: &mut S, payload: &GatewayPayload) -> Result<(), ChannelError>
where
    S: Sink<WsMessage> + Unpin,
    S::Error: Display,
{
    let json = serde_json::to_string(payload).map_err(|e| ChannelError::Other(e.to_string()))?;
    sink.send(WsMessage::Text(json))
        .await
        .map_err(|e| ChannelError::SendFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<DiscordEvent>>,
    }

    #[async_trait]
    impl DiscordHandler for Recorder {
        async fn on_event(&self, event: DiscordEvent) {
            self.events.lock().push(event);
        }
    }

    fn gateway(handler: Arc<Recorder>) -> DiscordGateway {
        DiscordGateway::new(DiscordConfig::default(), SecretString::from("tok"), handler)
    }

    fn ready_payload() -> GatewayPayload {
        serde_json::from_value(serde_json::json!({
            "op": 0,
            "s": 1,
            "t": "READY",
            "d": {
                "v": 10,
                "user": {"id": "999", "username": "bridge", "bot": true},
                "session_id": "sess",
                "resume_gateway_url": "wss://resume.example",
                "guilds": [{"id": "1"}, {"id": "2"}]
            }
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn ready_stores_session_and_requests_members() {
        let recorder = Arc::new(Recorder::default());
        let gw = gateway(recorder.clone());

        let requests = gw.dispatch(ready_payload()).await;
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].op, OP_REQUEST_GUILD_MEMBERS);
        assert_eq!(requests[1].d.as_ref().unwrap()["guild_id"], "2");

        assert_eq!(gw.session_id.read().await.as_deref(), Some("sess"));
        assert_eq!(gw.resume_url.read().await.as_deref(), Some("wss://resume.example"));
        assert!(matches!(recorder.events.lock()[0], DiscordEvent::Ready(_)));
    }

    fn close(code: u16) -> CloseFrame<'static> {
        CloseFrame {
            code: code.into(),
            reason: "closed".into(),
        }
    }

    #[test]
    fn rejected_token_close_is_fatal() {
        let err = fatal_close(Some(&close(4004))).unwrap();
        assert!(matches!(err, ChannelError::AuthFailed(_)));
    }

    #[test]
    fn other_closes_reconnect() {
        assert!(fatal_close(Some(&close(4000))).is_none());
        assert!(fatal_close(Some(&close(1000))).is_none());
        assert!(fatal_close(None).is_none());
    }

    #[tokio::test]
    async fn identify_then_resume_after_ready() {
        let gw = gateway(Arc::new(Recorder::default()));
        assert_eq!(gw.auth_payload().await.unwrap().op, OP_IDENTIFY);

        gw.dispatch(ready_payload()).await;
        gw.sequence.store(7, Ordering::SeqCst);
        let resume = gw.auth_payload().await.unwrap();
        assert_eq!(resume.op, OP_RESUME);
        assert_eq!(resume.d.unwrap()["seq"], 7);
    }

    #[tokio::test]
    async fn non_resumable_invalid_session_clears_state() {
        let gw = gateway(Arc::new(Recorder::default()));
        gw.dispatch(ready_payload()).await;
        gw.sequence.store(5, Ordering::SeqCst);

        gw.invalidate(false).await;
        assert!(gw.session_id.read().await.is_none());
        assert!(gw.resume_url.read().await.is_none());
        assert_eq!(gw.sequence.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_and_malformed_dispatches_are_dropped() {
        let recorder = Arc::new(Recorder::default());
        let gw = gateway(recorder.clone());

        let unknown = GatewayPayload {
            op: 0,
            d: Some(serde_json::json!({})),
            s: Some(2),
            t: Some("PRESENCE_UPDATE".into()),
        };
        assert!(gw.dispatch(unknown).await.is_empty());

        let malformed = GatewayPayload {
            op: 0,
            d: Some(serde_json::json!({"id": 1})),
            s: Some(3),
            t: Some("MESSAGE_CREATE".into()),
        };
        assert!(gw.dispatch(malformed).await.is_empty());
        assert!(recorder.events.lock().is_empty());
    }

    #[test]
    fn heartbeat_carries_sequence_once_known() {
        let gw = gateway(Arc::new(Recorder::default()));
        assert!(gw.heartbeat().d.is_none());
        gw.sequence.store(12, Ordering::SeqCst);
        assert_eq!(gw.heartbeat().d, Some(serde_json::json!(12)));
    }
}
