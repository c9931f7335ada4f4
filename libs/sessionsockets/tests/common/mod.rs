//! Common test utilities for SessionSockets integration tests
//!
//! - `Harness`: a `ConnectionManager` wired to a recording connector and a
//!   manual scheduler, for deterministic state machine tests
//! - `MockSessionServer`: a real WebSocket server speaking the session
//!   protocol, for end-to-end tests

#![allow(dead_code)]

use parking_lot::Mutex;
use serde_json::{json, Value};
use sessionsockets::core::{ClientEvent, ConnectionManager, ConnectionState, ManagerConfig};
use sessionsockets::traits::*;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Notify;

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

// =============================================================================
// Recording transport
// =============================================================================

/// Everything the manager did to the network
#[derive(Debug, Default)]
pub struct Wire {
    pub opened: Vec<TransportId>,
    pub sent: Vec<(TransportId, String)>,
    pub closed: Vec<TransportId>,
    /// Next `open` fails immediately
    pub fail_open: bool,
    /// Every `send` fails until cleared
    pub fail_send: bool,
    /// Only the first N sends succeed (then behaves like `fail_send`)
    pub send_budget: Option<usize>,
}

impl Wire {
    /// `type` field of every frame sent on `transport`
    pub fn sent_types(&self, transport: TransportId) -> Vec<String> {
        self.sent
            .iter()
            .filter(|(id, _)| *id == transport)
            .map(|(_, frame)| frame_type(frame))
            .collect()
    }

    pub fn sent_on(&self, transport: TransportId) -> Vec<Value> {
        self.sent
            .iter()
            .filter(|(id, _)| *id == transport)
            .map(|(_, frame)| serde_json::from_str(frame).unwrap())
            .collect()
    }
}

pub fn frame_type(frame: &str) -> String {
    let value: Value = serde_json::from_str(frame).unwrap();
    value["type"].as_str().unwrap().to_string()
}

pub struct MockConnector {
    wire: Arc<Mutex<Wire>>,
}

impl Connector for MockConnector {
    fn open(&mut self, id: TransportId) -> Result<Box<dyn Transport>> {
        let mut wire = self.wire.lock();
        if wire.fail_open {
            wire.fail_open = false;
            return Err(SessionError::Transport("connection refused".to_string()));
        }
        wire.opened.push(id);
        Ok(Box::new(MockTransport {
            id,
            wire: Arc::clone(&self.wire),
        }))
    }
}

pub struct MockTransport {
    id: TransportId,
    wire: Arc<Mutex<Wire>>,
}

impl Transport for MockTransport {
    fn send(&mut self, frame: String) -> Result<()> {
        let mut wire = self.wire.lock();
        if wire.fail_send {
            return Err(SessionError::ConnectionClosed("broken pipe".to_string()));
        }
        if let Some(budget) = wire.send_budget.as_mut() {
            if *budget == 0 {
                return Err(SessionError::ConnectionClosed("broken pipe".to_string()));
            }
            *budget -= 1;
        }
        wire.sent.push((self.id, frame));
        Ok(())
    }

    fn close(&mut self) {
        self.wire.lock().closed.push(self.id);
    }
}

// =============================================================================
// Manual scheduler
// =============================================================================

#[derive(Debug, Default)]
pub struct Timers {
    pub pending: BTreeMap<TimerId, Duration>,
    pub cancelled: Vec<TimerId>,
    /// Every delay ever scheduled, in order
    pub history: Vec<Duration>,
}

pub struct ManualScheduler {
    timers: Arc<Mutex<Timers>>,
}

impl Scheduler for ManualScheduler {
    fn schedule(&mut self, id: TimerId, delay: Duration) {
        let mut timers = self.timers.lock();
        timers.pending.insert(id, delay);
        timers.history.push(delay);
    }

    fn cancel(&mut self, id: TimerId) {
        let mut timers = self.timers.lock();
        if timers.pending.remove(&id).is_some() {
            timers.cancelled.push(id);
        }
    }
}

// =============================================================================
// Harness
// =============================================================================

pub const SESSION: &str = "session-abc";

pub struct Harness {
    pub manager: ConnectionManager,
    pub wire: Arc<Mutex<Wire>>,
    pub timers: Arc<Mutex<Timers>>,
    pub events: crossbeam_channel::Receiver<ClientEvent>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(ManagerConfig::default())
    }

    pub fn with_config(config: ManagerConfig) -> Self {
        let wire = Arc::new(Mutex::new(Wire::default()));
        let timers = Arc::new(Mutex::new(Timers::default()));
        let manager = ConnectionManager::new(
            config,
            Box::new(MockConnector {
                wire: Arc::clone(&wire),
            }),
            Box::new(ManualScheduler {
                timers: Arc::clone(&timers),
            }),
        );
        let events = manager.events();

        Self {
            manager,
            wire,
            timers,
            events,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.manager.connection_state()
    }

    /// Most recently opened transport
    pub fn latest(&self) -> TransportId {
        *self.wire.lock().opened.last().expect("no transport opened")
    }

    pub fn open_latest(&mut self) -> TransportId {
        let id = self.latest();
        self.manager.on_transport_open(id);
        id
    }

    pub fn ack(&mut self, transport: TransportId, session: &str, connection_id: &str) {
        self.frame(
            transport,
            json!({
                "type": "handshake_ack",
                "session_id": session,
                "connection_id": connection_id,
            }),
        );
    }

    pub fn frame(&mut self, transport: TransportId, frame: Value) {
        self.manager.on_frame(transport, &frame.to_string());
    }

    /// connect + open + ack on a fresh transport
    pub fn ready(&mut self, session: &str) -> TransportId {
        self.manager.connect(session);
        let id = self.open_latest();
        self.ack(id, session, "conn-1");
        assert_eq!(self.state(), ConnectionState::Ready);
        id
    }

    pub fn close_latest(&mut self, reason: &str) -> TransportId {
        let id = self.latest();
        self.manager.on_transport_closed(id, reason.to_string());
        id
    }

    /// Fire the single pending timer
    pub fn fire_pending(&mut self) -> Duration {
        let (id, delay) = {
            let timers = self.timers.lock();
            assert_eq!(timers.pending.len(), 1, "expected exactly one pending timer");
            let (id, delay) = timers.pending.iter().next().unwrap();
            (*id, *delay)
        };
        self.timers.lock().pending.remove(&id);
        self.manager.on_timer(id);
        delay
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.lock().pending.len()
    }

    pub fn drain_events(&self) -> Vec<ClientEvent> {
        self.events.try_iter().collect()
    }

    pub fn states_seen(&self) -> Vec<ConnectionState> {
        self.drain_events()
            .into_iter()
            .filter_map(|event| match event {
                ClientEvent::StateChanged(state) => Some(state),
                _ => None,
            })
            .collect()
    }
}

// =============================================================================
// WebSocket session server
// =============================================================================

/// A WebSocket server that speaks the session protocol
///
/// - acks every `handshake` with `conn-<n>`
/// - answers every `user_message` with a final `agent_response` echo
/// - records every text frame it receives
pub struct MockSessionServer {
    pub addr: SocketAddr,
    pub received: Arc<Mutex<Vec<String>>>,
    shutdown: Arc<Notify>,
    kick: Arc<Notify>,
}

impl MockSessionServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Arc::new(Notify::new());
        let kick = Arc::new(Notify::new());
        let received = Arc::new(Mutex::new(Vec::new()));

        let shutdown_clone = Arc::clone(&shutdown);
        let kick_clone = Arc::clone(&kick);
        let received_clone = Arc::clone(&received);

        tokio::spawn(async move {
            let mut connections = 0u32;
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, _)) => {
                                connections += 1;
                                let connection_id = format!("conn-{}", connections);
                                let kick = Arc::clone(&kick_clone);
                                let received = Arc::clone(&received_clone);
                                tokio::spawn(async move {
                                    Self::handle_connection(stream, connection_id, kick, received).await;
                                });
                            }
                            Err(e) => {
                                eprintln!("Accept error: {}", e);
                                break;
                            }
                        }
                    }
                    _ = shutdown_clone.notified() => {
                        break;
                    }
                }
            }
        });

        Self {
            addr,
            received,
            shutdown,
            kick,
        }
    }

    async fn handle_connection(
        stream: tokio::net::TcpStream,
        connection_id: String,
        kick: Arc<Notify>,
        received: Arc<Mutex<Vec<String>>>,
    ) {
        use futures::{SinkExt, StreamExt};
        use tokio_tungstenite::{accept_async, tungstenite::Message};

        let ws_stream = match accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                eprintln!("WebSocket handshake failed: {}", e);
                return;
            }
        };

        let (mut write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                msg = read.next() => {
                    let text = match msg {
                        Some(Ok(Message::Text(text))) => text,
                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                        Some(Ok(_)) => continue,
                    };
                    received.lock().push(text.clone());

                    let frame: Value = match serde_json::from_str(&text) {
                        Ok(frame) => frame,
                        Err(_) => continue,
                    };

                    let reply = match frame["type"].as_str() {
                        Some("handshake") => Some(json!({
                            "type": "handshake_ack",
                            "session_id": frame["session_id"],
                            "connection_id": connection_id,
                        })),
                        Some("user_message") => Some(json!({
                            "type": "agent_response",
                            "content": format!("echo: {}", frame["message"].as_str().unwrap_or_default()),
                            "is_final": true,
                        })),
                        _ => None,
                    };

                    if let Some(reply) = reply {
                        if write.send(Message::Text(reply.to_string())).await.is_err() {
                            break;
                        }
                    }
                }
                _ = kick.notified() => {
                    // Drop without a close handshake
                    break;
                }
            }
        }
    }

    /// Get the WebSocket URL for this server
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Drop every live connection
    pub fn kick_all(&self) {
        self.kick.notify_waiters();
    }

    /// Types of every frame received so far
    pub fn received_types(&self) -> Vec<String> {
        self.received.lock().iter().map(|f| frame_type(f)).collect()
    }

    /// Shutdown the server
    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }
}

impl Drop for MockSessionServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Poll `condition` until it holds or `timeout` elapses
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
