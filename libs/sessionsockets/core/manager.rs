//! Connection manager
//!
//! A synchronous, event-driven state machine that owns at most one transport
//! and sequences it through handshake, ready, reconnection and error:
//!
//! ```text
//! Disconnected ─connect()→ Connecting ─open→ Connected → Handshaking ─ack→ Ready
//!      ↑                       ↑                              │            │
//!      │                  timer fired                   error frame   unintentional
//!  disconnect()                │                              ↓        close
//!      │                  Reconnecting ←──── close / timeout ─┴────────────┘
//!      │                       │ attempts exhausted
//!      └───────────────────────┴──────────────→ Error (terminal until connect())
//! ```
//!
//! Every public method returns immediately. I/O happens behind the
//! [`Connector`]/[`Transport`] seam and timers behind [`Scheduler`]; their
//! outcomes come back through `on_transport_*` and `on_timer`, each tagged
//! with an id so stale events from replaced transports or cancelled timers
//! are ignored.

use super::codec::{self, DecodeError};
use super::config::ManagerConfig;
use super::connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState, Metrics};
use super::dispatcher::{MessageDispatcher, SessionStatus, SubscriptionId};
use super::events::ClientEvent;
use super::handshake::{AckOutcome, HandshakeProtocol};
use super::messages::{
    ClientMessage, ErrorFrame, HandshakeAck, MessageKind, ServerMessage, SessionId, ToolResponse,
    UserMessage,
};
use super::policy::ReconnectionPolicy;
use super::queue::{MessageQueue, QueuedMessage};
use crate::traits::{
    Connector, Observer, Result, Scheduler, SessionError, TimerId, Transport, TransportEvent,
    TransportId,
};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// What happened to a message passed to `send`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Handed to the live transport
    Sent,
    /// Buffered until the connection becomes ready
    Queued,
}

struct LiveTransport {
    id: TransportId,
    inner: Box<dyn Transport>,
}

pub struct ConnectionManager {
    connector: Box<dyn Connector>,
    scheduler: Box<dyn Scheduler>,
    handshake: HandshakeProtocol,
    policy: ReconnectionPolicy,
    queue: MessageQueue,
    dispatcher: MessageDispatcher,
    handshake_timeout: Option<Duration>,

    state: Arc<AtomicConnectionState>,
    metrics: Arc<AtomicMetrics>,
    status: Arc<RwLock<SessionStatus>>,
    event_tx: Sender<ClientEvent>,
    event_rx: Receiver<ClientEvent>,

    session_id: Option<SessionId>,
    connection_id: Option<String>,
    transport: Option<LiveTransport>,
    next_transport_id: u64,
    next_timer_id: u64,
    reconnect_timer: Option<TimerId>,
    handshake_timer: Option<TimerId>,
    /// Why the manager is in the error state
    failure: Option<SessionError>,
}

impl ConnectionManager {
    pub fn new(
        config: ManagerConfig,
        connector: Box<dyn Connector>,
        scheduler: Box<dyn Scheduler>,
    ) -> Self {
        let (event_tx, event_rx) = bounded(config.event_capacity.max(1));

        Self {
            connector,
            scheduler,
            handshake: HandshakeProtocol::new(config.client_kind, config.client_version),
            policy: ReconnectionPolicy::new(config.reconnect_strategy),
            queue: MessageQueue::new(config.queue_capacity),
            dispatcher: MessageDispatcher::new(),
            handshake_timeout: config.handshake_timeout,
            state: Arc::new(AtomicConnectionState::default()),
            metrics: Arc::new(AtomicMetrics::new()),
            status: Arc::new(RwLock::new(SessionStatus::default())),
            event_tx,
            event_rx,
            session_id: None,
            connection_id: None,
            transport: None,
            next_transport_id: 0,
            next_timer_id: 0,
            reconnect_timer: None,
            handshake_timer: None,
            failure: None,
        }
    }

    // =========================================================================
    // Caller operations
    // =========================================================================

    /// Start (or keep) a connection for `session_id`.
    ///
    /// A no-op while a connection for the same session is connecting,
    /// handshaking or ready. Any other call tears down what exists and
    /// starts a fresh sequence with the attempt counter at zero.
    pub fn connect(&mut self, session_id: impl Into<SessionId>) {
        let session_id = session_id.into();
        let state = self.state.get();

        if self.session_id.as_ref() == Some(&session_id) && state.is_active() {
            debug!("Already {} for session {}, ignoring connect()", state, session_id);
            return;
        }

        if let Some(previous) = self.session_id.as_ref().filter(|s| **s != session_id) {
            let discarded = self.queue.clear();
            if discarded > 0 {
                warn!(
                    "Discarding {} queued frames for session {} on switch to {}",
                    discarded, previous, session_id
                );
            }
            *self.status.write() = SessionStatus::default();
        }

        self.teardown();
        self.policy.reset();
        self.failure = None;
        info!(session_id = %session_id, "Connecting session");
        self.session_id = Some(session_id);
        self.open_transport();
    }

    /// Caller-intentional teardown.
    ///
    /// Cancels pending timers, closes the transport and clears the
    /// connection id. The session id and queued frames are kept so a later
    /// `connect()` to the same session resumes them.
    pub fn disconnect(&mut self) {
        self.teardown();
        self.policy.reset();
        self.failure = None;

        if self.state.get() != ConnectionState::Disconnected {
            info!("Disconnected session {}", self.session_label());
            self.set_state(ConnectionState::Disconnected);
        }
    }

    /// Transmit now if ready, otherwise queue.
    ///
    /// In the error state the error that caused it is returned, e.g.
    /// [`SessionError::ReconnectionExhausted`] after the retry budget ran out.
    pub fn send(&mut self, message: ClientMessage) -> Result<SendOutcome> {
        if matches!(message, ClientMessage::Handshake(_)) {
            return Err(SessionError::InvalidState(
                "handshake frames are only sent by the handshake protocol".to_string(),
            ));
        }

        let state = self.state.get();
        if state == ConnectionState::Error {
            return Err(self.failure.clone().unwrap_or_else(|| {
                SessionError::InvalidState(
                    "connection is in error state; call connect() to recover".to_string(),
                )
            }));
        }

        let kind = message.kind();
        let frame = codec::encode(&message)?;

        if state == ConnectionState::Ready {
            return match self.transmit(frame.clone()) {
                Ok(()) => Ok(SendOutcome::Sent),
                Err(e) => {
                    self.queue.requeue_front(QueuedMessage {
                        kind,
                        frame,
                        enqueued_at: Instant::now(),
                    });
                    self.handle_transport_failure(e.to_string());
                    Ok(SendOutcome::Queued)
                }
            };
        }

        self.queue.push(kind, frame)?;
        debug!("Queued {} while {} ({} pending)", kind, state, self.queue.len());
        Ok(SendOutcome::Queued)
    }

    /// Send a chat message for the current session
    pub fn send_user_message(
        &mut self,
        text: impl Into<String>,
        context: Option<Value>,
    ) -> Result<SendOutcome> {
        let session_id = self.session_id.clone().ok_or(SessionError::NoSession)?;
        self.send(ClientMessage::UserMessage(UserMessage {
            session_id,
            message: text.into(),
            context,
        }))
    }

    /// Answer a `tool_request`
    pub fn send_tool_response(
        &mut self,
        request_id: impl Into<String>,
        result: std::result::Result<Value, String>,
    ) -> Result<SendOutcome> {
        self.send(ClientMessage::ToolResponse(ToolResponse::from_result(request_id, result)))
    }

    pub fn subscribe<O: Observer>(&mut self, kind: MessageKind, observer: O) -> SubscriptionId {
        self.dispatcher.subscribe(kind, Box::new(observer))
    }

    pub fn subscribe_boxed(&mut self, kind: MessageKind, observer: Box<dyn Observer>) -> SubscriptionId {
        self.dispatcher.subscribe(kind, observer)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.dispatcher.unsubscribe(id)
    }

    // =========================================================================
    // Event loop entry points
    // =========================================================================

    /// Route a transport event to the matching handler
    pub fn on_transport_event(&mut self, id: TransportId, event: TransportEvent) {
        match event {
            TransportEvent::Opened => self.on_transport_open(id),
            TransportEvent::Frame(text) => self.on_frame(id, &text),
            TransportEvent::Closed(reason) => self.on_transport_closed(id, reason),
        }
    }

    pub fn on_transport_open(&mut self, id: TransportId) {
        if !self.is_current(id) {
            debug!("Ignoring open from stale {}", id);
            return;
        }
        if self.state.get() != ConnectionState::Connecting {
            debug!("Ignoring open of {} while {}", id, self.state.get());
            return;
        }

        let Some(session_id) = self.session_id.clone() else {
            return;
        };

        self.set_state(ConnectionState::Connected);

        let frame = match self.handshake.begin(&session_id, id) {
            Ok(frame) => frame,
            Err(e) => {
                error!("Failed to build handshake: {}", e);
                self.cancel_handshake_timer();
                self.close_transport();
                let message = e.to_string();
                self.enter_error(e);
                self.emit(ClientEvent::Error(message));
                return;
            }
        };

        // Nothing else may reach this transport before the handshake
        if let Err(e) = self.transmit(frame) {
            self.handle_transport_failure(e.to_string());
            return;
        }

        debug!("Handshake sent on {} for session {}", id, session_id);
        self.set_state(ConnectionState::Handshaking);
    }

    pub fn on_frame(&mut self, id: TransportId, text: &str) {
        if !self.is_current(id) {
            debug!("Ignoring frame from stale {}", id);
            return;
        }
        self.metrics.increment_received();

        let message = match codec::decode(text) {
            Ok(message) => message,
            Err(DecodeError::UnknownKind(kind)) => {
                warn!("Dropping frame of unknown kind `{}`", kind);
                self.metrics.increment_dropped();
                return;
            }
            Err(e) => {
                warn!("Dropping undecodable frame: {}", e);
                self.metrics.increment_dropped();
                return;
            }
        };

        match &message {
            ServerMessage::HandshakeAck(ack) => self.on_handshake_ack(ack),
            ServerMessage::Error(frame) => self.on_error_frame(frame),
            ServerMessage::TypingIndicator(_)
            | ServerMessage::SessionStatus(_)
            | ServerMessage::AgentResponse(_) => {
                self.status.write().apply(&message);
            }
            _ => {}
        }

        let report = self.dispatcher.dispatch(&message);
        if report.failed > 0 {
            debug!(
                "{} observers failed on {} ({} delivered)",
                report.failed,
                message.kind(),
                report.delivered
            );
        }
    }

    pub fn on_transport_closed(&mut self, id: TransportId, reason: String) {
        if !self.is_current(id) {
            debug!("Ignoring close of stale {}: {}", id, reason);
            return;
        }
        self.transport = None;
        self.handle_unintentional_close(reason);
    }

    pub fn on_timer(&mut self, id: TimerId) {
        if self.reconnect_timer == Some(id) {
            self.reconnect_timer = None;
            if self.state.get() != ConnectionState::Reconnecting {
                debug!("Reconnect {} fired while {}, ignoring", id, self.state.get());
                return;
            }
            self.metrics.increment_reconnects();
            info!(
                "Reconnect attempt {} for session {}",
                self.policy.attempts(),
                self.session_label()
            );
            self.open_transport();
        } else if self.handshake_timer == Some(id) {
            self.handshake_timer = None;
            let state = self.state.get();
            if !matches!(
                state,
                ConnectionState::Connecting | ConnectionState::Connected | ConnectionState::Handshaking
            ) {
                return;
            }
            let timeout = self.handshake_timeout.unwrap_or_default();
            warn!("No handshake_ack within {:?} (still {}), dropping transport", timeout, state);
            self.emit(ClientEvent::Error(SessionError::HandshakeTimeout(timeout).to_string()));
            self.handle_unintentional_close("handshake timed out".to_string());
        } else {
            debug!("Ignoring stale {}", id);
        }
    }

    // =========================================================================
    // Observability
    // =========================================================================

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.state.is_ready()
    }

    #[inline]
    pub fn connection_state(&self) -> ConnectionState {
        self.state.get()
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    pub fn connection_id(&self) -> Option<&str> {
        self.connection_id.as_deref()
    }

    pub fn session_status(&self) -> SessionStatus {
        self.status.read().clone()
    }

    pub fn metrics(&self) -> Metrics {
        self.metrics.snapshot(self.state.get())
    }

    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.policy.attempts()
    }

    pub fn has_live_transport(&self) -> bool {
        self.transport.is_some()
    }

    /// Receiver for lifecycle events
    ///
    /// Events are buffered up to `ManagerConfig::event_capacity`; once the
    /// buffer is full the oldest undrained event is discarded, so consumers
    /// that care about every transition must drain promptly.
    pub fn events(&self) -> Receiver<ClientEvent> {
        self.event_rx.clone()
    }

    pub fn state_handle(&self) -> Arc<AtomicConnectionState> {
        Arc::clone(&self.state)
    }

    pub fn metrics_handle(&self) -> Arc<AtomicMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn status_handle(&self) -> Arc<RwLock<SessionStatus>> {
        Arc::clone(&self.status)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn open_transport(&mut self) {
        self.next_transport_id += 1;
        let id = TransportId(self.next_transport_id);
        self.set_state(ConnectionState::Connecting);

        match self.connector.open(id) {
            Ok(inner) => {
                debug!("Opening {}", id);
                self.transport = Some(LiveTransport { id, inner });

                // Bounds the opening step as well as the wait for the ack
                if let Some(timeout) = self.handshake_timeout {
                    let timer = self.mint_timer();
                    self.scheduler.schedule(timer, timeout);
                    self.handshake_timer = Some(timer);
                }
            }
            Err(e) => {
                warn!("Failed to open {}: {}", id, e);
                self.handle_unintentional_close(e.to_string());
            }
        }
    }

    fn on_handshake_ack(&mut self, ack: &HandshakeAck) {
        if self.state.get() != ConnectionState::Handshaking {
            debug!("Ignoring handshake_ack while {}", self.state.get());
            return;
        }

        match self.handshake.on_ack(ack) {
            AckOutcome::Accepted {
                connection_id,
                is_reconnect,
                elapsed,
            } => {
                self.cancel_handshake_timer();
                self.policy.reset();
                self.connection_id = Some(connection_id.clone());
                info!(
                    "Session {} ready as {} (reconnect: {}, handshake took {:?})",
                    ack.session_id, connection_id, is_reconnect, elapsed
                );
                self.set_state(ConnectionState::Ready);

                if self.flush_queue() {
                    self.emit(ClientEvent::Ready {
                        connection_id,
                        is_reconnect,
                    });
                }
            }
            AckOutcome::Rejected(reason) => {
                error!("Handshake rejected: {}", reason);
                self.fail_handshake("session_mismatch".to_string(), reason);
            }
            AckOutcome::Ignored => debug!("handshake_ack with no pending handshake"),
        }
    }

    fn on_error_frame(&mut self, frame: &ErrorFrame) {
        match self.state.get() {
            ConnectionState::Handshaking => {
                error!("Handshake refused by server: {} ({})", frame.message, frame.code);
                self.fail_handshake(frame.code.clone(), frame.message.clone());
            }
            ConnectionState::Error | ConnectionState::Disconnected => {
                debug!("Server error while already {}: {}", self.state.get(), frame.message);
            }
            _ => {
                warn!("Server reported error {}: {}", frame.code, frame.message);
                self.enter_error(SessionError::InvalidState(format!(
                    "server reported {}: {}; call connect() to recover",
                    frame.code, frame.message
                )));
                self.emit(ClientEvent::Error(format!("{}: {}", frame.code, frame.message)));
            }
        }
    }

    /// Handshake failed for a reason retrying will not fix
    fn fail_handshake(&mut self, code: String, message: String) {
        self.cancel_handshake_timer();
        self.handshake.abort();
        self.close_transport();
        self.connection_id = None;
        self.enter_error(SessionError::Handshake(format!("{}: {}", code, message)));
        self.emit(ClientEvent::HandshakeRejected { code, message });
    }

    /// Drain queued frames in order. Returns false if the transport failed
    /// part way; unsent frames stay queued.
    fn flush_queue(&mut self) -> bool {
        let mut flushed = 0usize;

        while let Some(next) = self.queue.pop_front() {
            if let Err(e) = self.transmit(next.frame.clone()) {
                self.queue.requeue_front(next);
                warn!("Queue flush interrupted after {} frames: {}", flushed, e);
                self.handle_transport_failure(e.to_string());
                return false;
            }
            flushed += 1;
        }

        if flushed > 0 {
            debug!("Flushed {} queued frames", flushed);
        }
        true
    }

    fn transmit(&mut self, frame: String) -> Result<()> {
        let transport = self
            .transport
            .as_mut()
            .ok_or_else(|| SessionError::InvalidState("no live transport".to_string()))?;
        transport.inner.send(frame)?;
        self.metrics.increment_sent();
        Ok(())
    }

    fn handle_transport_failure(&mut self, reason: String) {
        self.close_transport();
        self.handle_unintentional_close(reason);
    }

    fn handle_unintentional_close(&mut self, reason: String) {
        self.cancel_handshake_timer();
        self.handshake.abort();
        self.close_transport();
        self.connection_id = None;

        match self.state.get() {
            ConnectionState::Error => {
                debug!("Transport closed while in error state: {}", reason);
                return;
            }
            ConnectionState::Disconnected => return,
            _ => {}
        }

        warn!("Connection for session {} lost: {}", self.session_label(), reason);

        match self.policy.on_failure() {
            Some(plan) => {
                self.cancel_reconnect_timer();
                let timer = self.mint_timer();
                self.scheduler.schedule(timer, plan.delay);
                self.reconnect_timer = Some(timer);
                self.set_state(ConnectionState::Reconnecting);
                info!("Reconnecting in {:?} (attempt {})", plan.delay, plan.attempt);
                self.emit(ClientEvent::Reconnecting {
                    attempt: plan.attempt,
                    delay: plan.delay,
                });
            }
            None => {
                let attempts = self.policy.attempts();
                error!("Reconnection exhausted after {} attempts", attempts);
                self.enter_error(SessionError::ReconnectionExhausted { attempts });
                self.emit(ClientEvent::ReconnectExhausted { attempts });
            }
        }
    }

    /// Cancel timers, abort the handshake, close the transport
    fn teardown(&mut self) {
        self.cancel_reconnect_timer();
        self.cancel_handshake_timer();
        self.handshake.abort();
        self.close_transport();
        self.connection_id = None;
    }

    fn close_transport(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            debug!("Closing {}", transport.id);
            transport.inner.close();
        }
    }

    fn cancel_reconnect_timer(&mut self) {
        if let Some(timer) = self.reconnect_timer.take() {
            self.scheduler.cancel(timer);
        }
    }

    fn cancel_handshake_timer(&mut self) {
        if let Some(timer) = self.handshake_timer.take() {
            self.scheduler.cancel(timer);
        }
    }

    fn mint_timer(&mut self) -> TimerId {
        self.next_timer_id += 1;
        TimerId(self.next_timer_id)
    }

    fn is_current(&self, id: TransportId) -> bool {
        self.transport.as_ref().map_or(false, |t| t.id == id)
    }

    fn enter_error(&mut self, cause: SessionError) {
        self.failure = Some(cause);
        self.set_state(ConnectionState::Error);
    }

    fn set_state(&self, next: ConnectionState) {
        let previous = self.state.set(next);
        if previous != next {
            debug!("Connection state {} -> {}", previous, next);
            self.emit(ClientEvent::StateChanged(next));
        }
    }

    pub(crate) fn emit(&self, mut event: ClientEvent) {
        loop {
            match self.event_tx.try_send(event) {
                Ok(()) => return,
                Err(TrySendError::Full(back)) => {
                    if let Ok(dropped) = self.event_rx.try_recv() {
                        debug!("Event buffer full, dropping {:?}", dropped);
                    }
                    event = back;
                }
                // Receiver half lives in self, so this only happens during drop
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }

    fn session_label(&self) -> String {
        self.session_id
            .as_ref()
            .map_or_else(|| "<none>".to_string(), ToString::to_string)
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("state", &self.state.get())
            .field("session_id", &self.session_id)
            .field("connection_id", &self.connection_id)
            .field("queued", &self.queue.len())
            .field("policy", &self.policy)
            .finish()
    }
}
