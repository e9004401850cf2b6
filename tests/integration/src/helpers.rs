//! Mock servers for integration tests
//!
//! `MockGateway` speaks the server side of the gateway protocol over a
//! local WebSocket; `MockRest` serves scripted REST responses with
//! rate-limit headers. Both record what the client sent, with timestamps,
//! so tests can assert on handshake ordering and spacing.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use client_gateway::protocol::{GatewayMessage, OpCode, ResumePayload};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Poll a condition until it holds or the timeout expires
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

// === Mock gateway ===

/// Command pushed from a test into every live mock connection
#[derive(Debug, Clone)]
enum ServerCommand {
    /// Send a raw gateway message to the client
    Send(GatewayMessage),
    /// Drop the transport abruptly (no close code)
    Kick,
}

/// An identify received by the mock server
#[derive(Debug, Clone)]
pub struct IdentifyRecord {
    pub at: Instant,
    pub shard: [u32; 2],
    pub token: String,
}

/// A resume received by the mock server
#[derive(Debug, Clone)]
pub struct ResumeRecord {
    pub at: Instant,
    pub session_id: String,
    pub seq: u64,
}

/// Shared state of the mock gateway
pub struct GatewayServerState {
    heartbeat_interval_ms: u64,
    ack_heartbeats: AtomicBool,
    identifies: Mutex<Vec<IdentifyRecord>>,
    resumes: Mutex<Vec<ResumeRecord>>,
    heartbeats: Mutex<Vec<Option<u64>>>,
    sessions: Mutex<Vec<String>>,
    commands: broadcast::Sender<ServerCommand>,
}

/// A local WebSocket server speaking the gateway protocol
pub struct MockGateway {
    pub addr: SocketAddr,
    state: Arc<GatewayServerState>,
    _handle: JoinHandle<()>,
}

impl MockGateway {
    /// Start a mock gateway mandating the given heartbeat interval
    pub async fn start(heartbeat_interval_ms: u64) -> anyhow::Result<Self> {
        let (commands, _) = broadcast::channel(64);
        let state = Arc::new(GatewayServerState {
            heartbeat_interval_ms,
            ack_heartbeats: AtomicBool::new(true),
            identifies: Mutex::new(Vec::new()),
            resumes: Mutex::new(Vec::new()),
            heartbeats: Mutex::new(Vec::new()),
            sessions: Mutex::new(Vec::new()),
            commands,
        });

        let app = Router::new()
            .route("/", get(gateway_ws_handler))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
        let addr = listener.local_addr()?;
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Ok(Self {
            addr,
            state,
            _handle: handle,
        })
    }

    /// WebSocket URL of this server
    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Send a raw message to every live connection
    pub fn send(&self, message: GatewayMessage) {
        let _ = self.state.commands.send(ServerCommand::Send(message));
    }

    /// Send a dispatch event to every live connection
    pub fn send_dispatch(&self, event_name: &str, sequence: u64, data: Value) {
        self.send(GatewayMessage {
            op: OpCode::Dispatch,
            t: Some(event_name.to_string()),
            s: Some(sequence),
            d: Some(data),
        });
    }

    /// Drop every live transport without a close frame
    pub fn kick(&self) {
        let _ = self.state.commands.send(ServerCommand::Kick);
    }

    /// Control whether heartbeats get acknowledged
    pub fn set_ack_heartbeats(&self, ack: bool) {
        self.state.ack_heartbeats.store(ack, Ordering::SeqCst);
    }

    /// Identifies received so far
    pub fn identifies(&self) -> Vec<IdentifyRecord> {
        self.state.identifies.lock().unwrap().clone()
    }

    /// Resumes received so far
    pub fn resumes(&self) -> Vec<ResumeRecord> {
        self.state.resumes.lock().unwrap().clone()
    }

    /// Heartbeat sequence values received so far
    pub fn heartbeats(&self) -> Vec<Option<u64>> {
        self.state.heartbeats.lock().unwrap().clone()
    }

    /// Session IDs handed out on identify, in order
    pub fn sessions(&self) -> Vec<String> {
        self.state.sessions.lock().unwrap().clone()
    }
}

async fn gateway_ws_handler(
    State(state): State<Arc<GatewayServerState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_gateway_socket(state, socket))
}

async fn handle_gateway_socket(state: Arc<GatewayServerState>, mut socket: WebSocket) {
    let mut commands = state.commands.subscribe();

    let hello = GatewayMessage {
        op: OpCode::Hello,
        t: None,
        s: None,
        d: Some(json!({ "heartbeat_interval": state.heartbeat_interval_ms })),
    };
    if send_message(&mut socket, &hello).await.is_err() {
        return;
    }

    let mut seq: u64 = 0;

    loop {
        tokio::select! {
            command = commands.recv() => {
                match command {
                    Ok(ServerCommand::Send(message)) => {
                        if send_message(&mut socket, &message).await.is_err() {
                            return;
                        }
                    }
                    Ok(ServerCommand::Kick) => return,
                    Err(_) => {}
                }
            }
            incoming = socket.recv() => {
                let Some(Ok(Message::Text(text))) = incoming else {
                    return;
                };
                let Ok(message) = GatewayMessage::from_json(&text) else {
                    continue;
                };

                match message.op {
                    OpCode::Identify => {
                        let data = message.d.unwrap_or_default();
                        let shard = serde_json::from_value::<[u32; 2]>(data["shard"].clone())
                            .unwrap_or([0, 1]);
                        let token = data["token"].as_str().unwrap_or_default().to_string();
                        state.identifies.lock().unwrap().push(IdentifyRecord {
                            at: Instant::now(),
                            shard,
                            token,
                        });

                        let session_id = uuid::Uuid::new_v4().to_string();
                        state.sessions.lock().unwrap().push(session_id.clone());
                        seq += 1;
                        let ready = GatewayMessage {
                            op: OpCode::Dispatch,
                            t: Some("READY".to_string()),
                            s: Some(seq),
                            d: Some(json!({ "session_id": session_id, "shard": shard })),
                        };
                        if send_message(&mut socket, &ready).await.is_err() {
                            return;
                        }
                    }
                    OpCode::Resume => {
                        let Some(payload) = message
                            .d
                            .and_then(|d| serde_json::from_value::<ResumePayload>(d).ok())
                        else {
                            continue;
                        };
                        state.resumes.lock().unwrap().push(ResumeRecord {
                            at: Instant::now(),
                            session_id: payload.session_id,
                            seq: payload.seq,
                        });

                        seq = payload.seq + 1;
                        let resumed = GatewayMessage {
                            op: OpCode::Dispatch,
                            t: Some("RESUMED".to_string()),
                            s: Some(seq),
                            d: Some(json!({})),
                        };
                        if send_message(&mut socket, &resumed).await.is_err() {
                            return;
                        }
                    }
                    OpCode::Heartbeat => {
                        let last = message.d.and_then(|d| d.as_u64());
                        state.heartbeats.lock().unwrap().push(last);
                        if state.ack_heartbeats.load(Ordering::SeqCst) {
                            let ack = GatewayMessage {
                                op: OpCode::HeartbeatAck,
                                t: None,
                                s: None,
                                d: None,
                            };
                            if send_message(&mut socket, &ack).await.is_err() {
                                return;
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
    }
}

async fn send_message(socket: &mut WebSocket, message: &GatewayMessage) -> Result<(), axum::Error> {
    let json = message.to_json().expect("mock message always encodes");
    socket.send(Message::Text(json)).await
}

// === Mock REST API ===

/// A canned response popped per request by the mock REST server
#[derive(Debug, Clone)]
pub struct ScriptedResponse {
    pub status: u16,
    pub headers: Vec<(&'static str, String)>,
    pub body: Value,
}

impl ScriptedResponse {
    /// A plain success with no rate-limit headers
    pub fn ok(body: Value) -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body,
        }
    }

    /// A success carrying bucket headers
    pub fn ok_with_bucket(body: Value, limit: u32, remaining: u32, reset_after_secs: f64) -> Self {
        Self {
            status: 200,
            headers: vec![
                ("x-ratelimit-limit", limit.to_string()),
                ("x-ratelimit-remaining", remaining.to_string()),
                ("x-ratelimit-reset-after", reset_after_secs.to_string()),
                ("x-ratelimit-bucket", "mock-bucket".to_string()),
            ],
            body,
        }
    }

    /// A 429 with a Retry-After
    pub fn rate_limited(retry_after_secs: f64) -> Self {
        Self {
            status: 429,
            headers: vec![("retry-after", retry_after_secs.to_string())],
            body: json!({ "message": "You are being rate limited." }),
        }
    }

    /// An arbitrary status with a JSON body
    pub fn status(status: u16, body: Value) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body,
        }
    }
}

/// One request the mock REST server saw
#[derive(Debug, Clone)]
pub struct RequestRecord {
    pub method: String,
    pub path: String,
    pub body: Value,
    pub at: Instant,
}

/// Shared state of the mock REST server
pub struct RestServerState {
    gateway_bot_shards: u32,
    requests: Mutex<Vec<RequestRecord>>,
    script: Mutex<VecDeque<ScriptedResponse>>,
}

/// A local HTTP server serving scripted REST responses
pub struct MockRest {
    pub addr: SocketAddr,
    state: Arc<RestServerState>,
    _handle: JoinHandle<()>,
}

impl MockRest {
    /// Start a mock REST API recommending the given shard count
    pub async fn start(gateway_bot_shards: u32) -> anyhow::Result<Self> {
        let state = Arc::new(RestServerState {
            gateway_bot_shards,
            requests: Mutex::new(Vec::new()),
            script: Mutex::new(VecDeque::new()),
        });

        let app = Router::new()
            .route("/gateway/bot", get(gateway_bot_handler))
            .fallback(scripted_handler)
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
        let addr = listener.local_addr()?;
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Ok(Self {
            addr,
            state,
            _handle: handle,
        })
    }

    /// Base URL of this server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Queue the next scripted response
    pub fn push_response(&self, response: ScriptedResponse) {
        self.state.script.lock().unwrap().push_back(response);
    }

    /// Requests seen so far, in arrival order
    pub fn requests(&self) -> Vec<RequestRecord> {
        self.state.requests.lock().unwrap().clone()
    }
}

async fn gateway_bot_handler(State(state): State<Arc<RestServerState>>) -> Response {
    state.requests.lock().unwrap().push(RequestRecord {
        method: "GET".to_string(),
        path: "/gateway/bot".to_string(),
        body: Value::Null,
        at: Instant::now(),
    });

    // A scripted response takes precedence so tests can exercise error paths
    // (e.g. a 401) on this route; otherwise fall back to the canned topology.
    if let Some(scripted) = state.script.lock().unwrap().pop_front() {
        return scripted_response(scripted);
    }

    Json(json!({
        "url": "wss://gateway.chat.example",
        "shards": state.gateway_bot_shards,
        "session_start_limit": { "total": 1000, "remaining": 999, "max_concurrency": 1 }
    }))
    .into_response()
}

fn scripted_response(scripted: ScriptedResponse) -> Response {
    let status = StatusCode::from_u16(scripted.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = (status, Json(scripted.body)).into_response();
    for (name, value) in scripted.headers {
        if let Ok(value) = HeaderValue::from_str(&value) {
            response
                .headers_mut()
                .insert(HeaderName::from_static(name), value);
        }
    }
    response
}

async fn scripted_handler(
    State(state): State<Arc<RestServerState>>,
    method: Method,
    uri: Uri,
    body: axum::body::Bytes,
) -> Response {
    state.requests.lock().unwrap().push(RequestRecord {
        method: method.to_string(),
        path: uri.path().to_string(),
        body: serde_json::from_slice(&body).unwrap_or(Value::Null),
        at: Instant::now(),
    });

    let Some(scripted) = state.script.lock().unwrap().pop_front() else {
        return (StatusCode::OK, Json(json!({}))).into_response();
    };

    scripted_response(scripted)
}
