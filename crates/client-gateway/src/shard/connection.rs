//! Gateway connection state machine
//!
//! One task per shard runs this loop: connect, wait for hello, identify or
//! resume, heartbeat until the session ends, then decide between resuming,
//! starting fresh, backing off, or giving up.

use super::{Backoff, IdentifyThrottle, Session, ShardState, ShardStatus};
use crate::error::{GatewayError, GatewayResult};
use crate::events::GatewayEvent;
use crate::protocol::{CloseCode, GatewayMessage, HelloPayload, IdentifyPayload, ResumePayload};
use client_common::ClientConfig;
use client_core::Intents;
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use rand::Rng;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

/// How long to wait for the server's hello after the transport opens
const HELLO_TIMEOUT: Duration = Duration::from_secs(10);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How a gateway session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    /// Coordinator asked for a clean shutdown; do not reconnect
    Shutdown,
    /// Reconnect; `resumable` says whether the session survives
    Reconnect { resumable: bool },
}

/// One shard's gateway connection
///
/// Owns all live connection state. The coordinator only ever sees the
/// published [`ShardStatus`] snapshot.
pub struct GatewayConnection {
    shard_id: u32,
    shard_count: u32,
    token: String,
    intents: Intents,
    url: String,
    status: Arc<RwLock<ShardStatus>>,
    events: mpsc::Sender<GatewayEvent>,
    throttle: Arc<IdentifyThrottle>,
    shutdown: watch::Receiver<bool>,
    backoff_config: client_common::BackoffConfig,
}

impl GatewayConnection {
    /// Create a connection for one shard
    pub fn new(
        shard_id: u32,
        shard_count: u32,
        config: &ClientConfig,
        status: Arc<RwLock<ShardStatus>>,
        events: mpsc::Sender<GatewayEvent>,
        throttle: Arc<IdentifyThrottle>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            shard_id,
            shard_count,
            token: config.token.clone(),
            intents: config.intents,
            url: config.gateway.url.clone(),
            status,
            events,
            throttle,
            shutdown,
            backoff_config: config.gateway.reconnect.clone(),
        }
    }

    /// Drive the shard until shutdown or fatal failure
    ///
    /// This is the task entry point; it never panics and reports its
    /// terminal state through the status snapshot and the event channel.
    pub async fn run(self) {
        let mut shutdown = self.shutdown.clone();
        let mut session: Option<Session> = None;
        let mut backoff = Backoff::new(&self.backoff_config);

        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.run_session(&mut session, &mut backoff, &mut shutdown).await {
                Ok(SessionEnd::Shutdown) => break,
                Ok(SessionEnd::Reconnect { resumable }) => {
                    if !resumable {
                        session = None;
                    }
                }
                Err(err) if err.is_fatal() => {
                    tracing::error!(
                        shard_id = self.shard_id,
                        error = %err,
                        "Shard failed fatally"
                    );
                    self.set_state(ShardState::Failed);
                    return;
                }
                Err(err) => {
                    // Transport or protocol transient; the session may
                    // still be resumable on the next attempt
                    tracing::warn!(
                        shard_id = self.shard_id,
                        error = %err,
                        "Gateway session ended with error"
                    );
                }
            }

            let Some(delay) = backoff.next_delay() else {
                let fatal = GatewayError::ShardFatal {
                    shard_id: self.shard_id,
                    attempts: backoff.attempts(),
                };
                tracing::error!(shard_id = self.shard_id, error = %fatal, "Reconnect budget exhausted");
                self.set_state(ShardState::Failed);
                return;
            };

            self.status.write().reconnect_attempts = backoff.attempts();
            self.set_state(ShardState::Reconnecting);
            tracing::info!(
                shard_id = self.shard_id,
                delay_ms = delay.as_millis() as u64,
                attempt = backoff.attempts(),
                "Reconnecting after backoff"
            );

            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                changed = shutdown.changed() => {
                    // A dropped sender means the coordinator is gone
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        self.set_state(ShardState::Disconnected);
    }

    /// Run one full gateway session: connect through final close
    async fn run_session(
        &self,
        session: &mut Option<Session>,
        backoff: &mut Backoff,
        shutdown: &mut watch::Receiver<bool>,
    ) -> GatewayResult<SessionEnd> {
        self.set_state(ShardState::Connecting);

        let (mut ws, _response) = tokio_tungstenite::connect_async(&self.url).await?;
        tracing::debug!(shard_id = self.shard_id, "Transport connected");

        let hello = self.await_hello(&mut ws).await?;
        let interval = Duration::from_millis(hello.heartbeat_interval);

        // Resume skips the identify throttle; a fresh identify must take
        // a slot in the global stagger window first
        if let Some(sess) = session.as_ref() {
            self.set_state(ShardState::Resuming);
            let resume = GatewayMessage::resume(ResumePayload {
                token: self.token.clone(),
                session_id: sess.session_id().to_string(),
                seq: sess.seq(),
            });
            self.send(&mut ws, &resume).await?;
            tracing::info!(
                shard_id = self.shard_id,
                seq = sess.seq(),
                "Resume sent"
            );
        } else {
            self.throttle.acquire().await;
            self.set_state(ShardState::Identifying);
            let identify = GatewayMessage::identify(IdentifyPayload::new(
                self.token.clone(),
                self.shard_id,
                self.shard_count,
                self.intents,
            ));
            self.send(&mut ws, &identify).await?;
            tracing::info!(shard_id = self.shard_id, "Identify sent");
        }

        // First heartbeat fires after a jittered interval so shards that
        // connected together don't heartbeat together
        let first_tick = interval.mul_f64(rand::thread_rng().gen_range(0.9..1.1));
        let mut heartbeat =
            tokio::time::interval_at(tokio::time::Instant::now() + first_tick, interval);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut last_seq: Option<u64> = session.as_ref().map(Session::seq);
        let mut acked = true;
        let mut outstanding_since: Option<Instant> = None;

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        let _ = ws.close(None).await;
                        return Ok(SessionEnd::Shutdown);
                    }
                }
                _ = heartbeat.tick() => {
                    if !acked {
                        // Liveness failure: the server went quiet without
                        // closing the socket
                        tracing::warn!(
                            shard_id = self.shard_id,
                            "Heartbeat not acknowledged, connection zombied"
                        );
                        let _ = ws.close(None).await;
                        return Ok(SessionEnd::Reconnect { resumable: true });
                    }
                    self.send(&mut ws, &GatewayMessage::heartbeat(last_seq)).await?;
                    acked = false;
                    let now = Instant::now();
                    outstanding_since = Some(now);
                    self.status.write().last_heartbeat_sent = Some(now);
                }
                incoming = ws.next() => {
                    let Some(frame) = incoming else {
                        tracing::warn!(shard_id = self.shard_id, "Transport closed by peer");
                        return Ok(SessionEnd::Reconnect { resumable: true });
                    };

                    match frame? {
                        Message::Text(text) => {
                            let message = GatewayMessage::from_json(&text).map_err(|e| {
                                GatewayError::Protocol(format!("unparseable payload: {e}"))
                            })?;
                            if let Some(end) = self.handle_message(
                                &message,
                                session,
                                backoff,
                                &mut ws,
                                &mut last_seq,
                                &mut acked,
                                &mut outstanding_since,
                            ).await? {
                                return Ok(end);
                            }
                        }
                        Message::Close(frame) => {
                            return self.handle_close(frame.as_ref().map(|f| u16::from(f.code)));
                        }
                        Message::Binary(_) => {
                            return Err(GatewayError::Protocol("unexpected binary frame".to_string()));
                        }
                        Message::Ping(_) | Message::Pong(_) => {
                            tracing::trace!(shard_id = self.shard_id, "Transport ping/pong");
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    /// Wait for the mandatory hello payload that opens every session
    async fn await_hello(&self, ws: &mut WsStream) -> GatewayResult<HelloPayload> {
        let deadline = tokio::time::Instant::now() + HELLO_TIMEOUT;

        loop {
            let frame = tokio::time::timeout_at(deadline, ws.next())
                .await
                .map_err(|_| GatewayError::Protocol("timed out waiting for hello".to_string()))?;

            match frame {
                None => {
                    return Err(GatewayError::Protocol(
                        "connection closed before hello".to_string(),
                    ))
                }
                Some(Err(e)) => return Err(GatewayError::Connection(e)),
                Some(Ok(Message::Text(text))) => {
                    let message = GatewayMessage::from_json(&text).map_err(|e| {
                        GatewayError::Protocol(format!("unparseable hello: {e}"))
                    })?;
                    return message
                        .as_hello()
                        .ok_or_else(|| GatewayError::Protocol(format!("expected hello, got {message}")));
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                Some(Ok(other)) => {
                    return Err(GatewayError::Protocol(format!(
                        "expected hello, got non-text frame: {other:?}"
                    )))
                }
            }
        }
    }

    /// Handle one parsed gateway message; Some(end) terminates the session
    #[allow(clippy::too_many_arguments)]
    async fn handle_message(
        &self,
        message: &GatewayMessage,
        session: &mut Option<Session>,
        backoff: &mut Backoff,
        ws: &mut WsStream,
        last_seq: &mut Option<u64>,
        acked: &mut bool,
        outstanding_since: &mut Option<Instant>,
    ) -> GatewayResult<Option<SessionEnd>> {
        use crate::protocol::OpCode;

        match message.op {
            OpCode::HeartbeatAck => {
                *acked = true;
                let now = Instant::now();
                let mut status = self.status.write();
                status.last_heartbeat_acked = Some(now);
                if let Some(sent) = outstanding_since.take() {
                    status.latency = Some(now - sent);
                }
            }
            OpCode::Heartbeat => {
                // Server asked for an immediate heartbeat; if one is
                // already outstanding it covers the request
                if *acked {
                    self.send(ws, &GatewayMessage::heartbeat(*last_seq)).await?;
                    *acked = false;
                    let now = Instant::now();
                    *outstanding_since = Some(now);
                    self.status.write().last_heartbeat_sent = Some(now);
                }
            }
            OpCode::Dispatch => {
                if let Some(seq) = message.s {
                    *last_seq = Some(last_seq.map_or(seq, |prev| prev.max(seq)));
                    if let Some(sess) = session.as_mut() {
                        sess.advance(seq);
                    }
                    self.status.write().last_sequence = *last_seq;
                }

                match message.t.as_deref() {
                    Some("READY") => {
                        let ready = message.as_ready().ok_or_else(|| {
                            GatewayError::Protocol("READY without session_id".to_string())
                        })?;
                        self.status.write().session_id = Some(ready.session_id.clone());
                        *session = Some(Session::new(ready.session_id, message.s.unwrap_or(0)));
                        backoff.reset();
                        self.status.write().reconnect_attempts = 0;
                        self.set_state(ShardState::Connected);
                        tracing::info!(shard_id = self.shard_id, "Session established");
                    }
                    Some("RESUMED") => {
                        backoff.reset();
                        self.status.write().reconnect_attempts = 0;
                        self.set_state(ShardState::Connected);
                        tracing::info!(shard_id = self.shard_id, "Session resumed");
                    }
                    _ => {}
                }

                match (&message.t, message.s) {
                    (Some(name), Some(seq)) => {
                        self.emit(GatewayEvent::Dispatch {
                            shard_id: self.shard_id,
                            sequence: seq,
                            event_name: name.clone(),
                            data: message.d.clone().unwrap_or(serde_json::Value::Null),
                        });
                    }
                    _ => {
                        tracing::warn!(
                            shard_id = self.shard_id,
                            message = %message,
                            "Dispatch without event name or sequence"
                        );
                    }
                }
            }
            OpCode::Reconnect => {
                tracing::info!(shard_id = self.shard_id, "Server requested reconnect");
                let _ = ws.close(None).await;
                return Ok(Some(SessionEnd::Reconnect { resumable: true }));
            }
            OpCode::InvalidSession => {
                let resumable = message.invalid_session_resumable().unwrap_or(false);
                tracing::warn!(
                    shard_id = self.shard_id,
                    resumable = resumable,
                    "Session invalidated by server"
                );
                let _ = ws.close(None).await;
                return Ok(Some(SessionEnd::Reconnect { resumable }));
            }
            OpCode::Hello => {
                tracing::warn!(shard_id = self.shard_id, "Unexpected hello mid-session");
            }
            OpCode::Identify | OpCode::Resume | OpCode::PresenceUpdate => {
                tracing::warn!(
                    shard_id = self.shard_id,
                    op = %message.op,
                    "Received client-only op from server"
                );
            }
        }

        Ok(None)
    }

    /// Map a server close frame to the next action
    fn handle_close(&self, code: Option<u16>) -> GatewayResult<SessionEnd> {
        let Some(code) = code.and_then(CloseCode::from_u16) else {
            // Normal or unclassified close; try to pick the session back up
            tracing::info!(shard_id = self.shard_id, code = ?code, "Gateway closed");
            return Ok(SessionEnd::Reconnect { resumable: true });
        };

        tracing::warn!(shard_id = self.shard_id, close_code = %code, "Gateway closed");

        if code.is_authentication_failure() {
            return Err(GatewayError::Authentication);
        }
        if !code.should_reconnect() {
            return Err(GatewayError::Closed(code));
        }
        Ok(SessionEnd::Reconnect {
            resumable: code.can_resume(),
        })
    }

    /// Encode and send one message over the socket
    async fn send(&self, ws: &mut WsStream, message: &GatewayMessage) -> GatewayResult<()> {
        let json = message
            .to_json()
            .map_err(|e| GatewayError::Protocol(format!("failed to encode {message}: {e}")))?;
        ws.send(Message::Text(json.into())).await?;
        Ok(())
    }

    /// Publish a state transition to the snapshot and the event channel
    fn set_state(&self, state: ShardState) {
        {
            let mut status = self.status.write();
            if status.state == state {
                return;
            }
            status.state = state;
        }

        tracing::debug!(shard_id = self.shard_id, state = %state, "Shard state changed");
        self.emit(GatewayEvent::StateChanged {
            shard_id: self.shard_id,
            state,
        });
    }

    /// Forward an event without ever blocking the connection task
    fn emit(&self, event: GatewayEvent) {
        if let Err(e) = self.events.try_send(event) {
            tracing::warn!(
                shard_id = self.shard_id,
                error = %e,
                "Event channel unavailable, dropping event"
            );
        }
    }
}

impl std::fmt::Debug for GatewayConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConnection")
            .field("shard_id", &self.shard_id)
            .field("shard_count", &self.shard_count)
            .field("url", &self.url)
            .finish()
    }
}
