use super::builder::{states::NoUrl, SessionClientBuilder};
use crate::core::connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState, Metrics};
use crate::core::dispatcher::{SessionStatus, SubscriptionId};
use crate::core::events::ClientEvent;
use crate::core::manager::{ConnectionManager, SendOutcome};
use crate::core::messages::{ClientMessage, MessageKind, SessionId, ToolResponse};
use crate::traits::*;
use crossbeam_channel::Receiver;
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Commands from [`SessionClient`] handles to the session loop
pub(crate) enum Command {
    Connect(SessionId),
    Disconnect,
    Send(ClientMessage),
    SendUserMessage { text: String, context: Option<Value> },
    Subscribe {
        kind: MessageKind,
        observer: Box<dyn Observer>,
        reply: oneshot::Sender<SubscriptionId>,
    },
    Unsubscribe {
        id: SubscriptionId,
        reply: oneshot::Sender<bool>,
    },
    Shutdown,
}

/// Everything the session loop reacts to, in arrival order
pub(crate) enum LoopEvent {
    Command(Command),
    Transport(TransportId, TransportEvent),
    Timer(TimerId),
}

/// Async handle to a session running on a tokio task
///
/// The task owns the [`ConnectionManager`]; this handle forwards commands to
/// it and reads state through shared atomics. Lifecycle notifications are
/// delivered on an unbounded crossbeam channel.
pub struct SessionClient {
    loop_tx: UnboundedSender<LoopEvent>,
    event_rx: Receiver<ClientEvent>,
    state: Arc<AtomicConnectionState>,
    metrics: Arc<AtomicMetrics>,
    status: Arc<RwLock<SessionStatus>>,
    task_handle: Option<tokio::task::JoinHandle<()>>,
}

impl SessionClient {
    /// Start building a client
    pub fn builder() -> SessionClientBuilder<NoUrl> {
        SessionClientBuilder::new()
    }

    /// Spawn the session loop around an already configured manager
    pub(crate) fn spawn(
        manager: ConnectionManager,
        loop_tx: UnboundedSender<LoopEvent>,
        loop_rx: UnboundedReceiver<LoopEvent>,
    ) -> Self {
        let event_rx = manager.events();
        let state = manager.state_handle();
        let metrics = manager.metrics_handle();
        let status = manager.status_handle();

        let task_handle = tokio::spawn(run_session_loop(manager, loop_rx));

        Self {
            loop_tx,
            event_rx,
            state,
            metrics,
            status,
            task_handle: Some(task_handle),
        }
    }

    fn command(&self, command: Command) -> Result<()> {
        self.loop_tx
            .send(LoopEvent::Command(command))
            .map_err(|_| SessionError::ChannelSend("session loop has stopped".to_string()))
    }

    pub fn connect(&self, session_id: impl Into<SessionId>) -> Result<()> {
        self.command(Command::Connect(session_id.into()))
    }

    pub fn disconnect(&self) -> Result<()> {
        self.command(Command::Disconnect)
    }

    /// Send now if ready, queue otherwise.
    ///
    /// A message the session refuses (full queue, error state) is reported
    /// as [`ClientEvent::SendRejected`].
    pub fn send(&self, message: ClientMessage) -> Result<()> {
        self.command(Command::Send(message))
    }

    pub fn send_user_message(&self, text: impl Into<String>, context: Option<Value>) -> Result<()> {
        self.command(Command::SendUserMessage {
            text: text.into(),
            context,
        })
    }

    pub fn send_tool_response(
        &self,
        request_id: impl Into<String>,
        result: std::result::Result<Value, String>,
    ) -> Result<()> {
        self.send(ClientMessage::ToolResponse(ToolResponse::from_result(request_id, result)))
    }

    pub async fn subscribe<O: Observer>(&self, kind: MessageKind, observer: O) -> Result<SubscriptionId> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::Subscribe {
            kind,
            observer: Box::new(observer),
            reply,
        })?;
        rx.await
            .map_err(|_| SessionError::ChannelSend("session loop dropped subscription".to_string()))
    }

    pub async fn unsubscribe(&self, id: SubscriptionId) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::Unsubscribe { id, reply })?;
        rx.await
            .map_err(|_| SessionError::ChannelSend("session loop dropped unsubscribe".to_string()))
    }

    #[inline]
    pub fn connection_state(&self) -> ConnectionState {
        self.state.get()
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.state.is_ready()
    }

    pub fn session_status(&self) -> SessionStatus {
        self.status.read().clone()
    }

    pub fn metrics(&self) -> Metrics {
        self.metrics.snapshot(self.state.get())
    }

    /// Try to receive an event (non-blocking)
    pub fn try_recv_event(&self) -> Option<ClientEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Receive an event (blocking)
    pub fn recv_event(&self) -> std::result::Result<ClientEvent, crossbeam_channel::RecvError> {
        self.event_rx.recv()
    }

    pub fn recv_event_timeout(&self, timeout: Duration) -> Option<ClientEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }

    /// Clone of the event receiver, for consumers on other threads
    ///
    /// Only the most recent `event_capacity` undrained events are kept.
    pub fn events(&self) -> Receiver<ClientEvent> {
        self.event_rx.clone()
    }

    /// Disconnect and wait for the session loop to exit
    pub async fn shutdown(mut self) -> Result<()> {
        info!("Shutting down session client");
        let _ = self.loop_tx.send(LoopEvent::Command(Command::Shutdown));

        if let Some(handle) = self.task_handle.take() {
            handle
                .await
                .map_err(|e| SessionError::ChannelSend(format!("session loop panicked: {}", e)))?;
        }
        Ok(())
    }
}

impl Drop for SessionClient {
    fn drop(&mut self) {
        if self.task_handle.is_some() {
            let _ = self.loop_tx.send(LoopEvent::Command(Command::Shutdown));
        }
    }
}

/// Session loop: the only place the manager is touched
async fn run_session_loop(mut manager: ConnectionManager, mut loop_rx: UnboundedReceiver<LoopEvent>) {
    while let Some(event) = loop_rx.recv().await {
        match event {
            LoopEvent::Transport(id, event) => manager.on_transport_event(id, event),
            LoopEvent::Timer(id) => manager.on_timer(id),
            LoopEvent::Command(Command::Shutdown) => {
                manager.disconnect();
                break;
            }
            LoopEvent::Command(command) => handle_command(&mut manager, command),
        }
    }

    info!("Session loop exiting");
}

fn handle_command(manager: &mut ConnectionManager, command: Command) {
    match command {
        Command::Connect(session_id) => manager.connect(session_id),
        Command::Disconnect => manager.disconnect(),
        Command::Send(message) => {
            let kind = message.kind();
            let outcome = manager.send(message);
            report_send(manager, kind, outcome);
        }
        Command::SendUserMessage { text, context } => {
            let outcome = manager.send_user_message(text, context);
            report_send(manager, "user_message", outcome);
        }
        Command::Subscribe { kind, observer, reply } => {
            let id = manager.subscribe_boxed(kind, observer);
            let _ = reply.send(id);
        }
        Command::Unsubscribe { id, reply } => {
            let _ = reply.send(manager.unsubscribe(id));
        }
        Command::Shutdown => {}
    }
}

fn report_send(
    manager: &ConnectionManager,
    kind: &str,
    outcome: Result<SendOutcome>,
) {
    match outcome {
        Ok(outcome) => debug!("{} {:?}", kind, outcome),
        Err(e) => {
            warn!("Rejected outbound {}: {}", kind, e);
            manager.emit(ClientEvent::SendRejected {
                reason: e.to_string(),
            });
        }
    }
}
