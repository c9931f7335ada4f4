//! # SessionSockets
//!
//! Client side of a bidirectional, session-scoped message protocol over
//! WebSocket.
//!
//! ## Features
//!
//! - **Handshake-first transports**: every new transport announces its session before anything else
//! - **Outbound queue**: messages sent before the handshake completes are flushed in order
//! - **Bounded reconnection**: exponential backoff after unintentional closures, error state when exhausted
//! - **Typed dispatch**: observers subscribe per message kind and are isolated from each other's failures
//! - **Sans-IO core**: the state machine is driven by events, with tokio-tungstenite plugged in at the edge

pub mod traits;
pub mod core;
pub mod runtime;

// Re-export all traits
pub use traits::*;

// Re-export core functionality
pub use crate::core::{
    codec, config, connection_state, dispatcher, events, handshake, manager, messages, policy,
    queue,
    config::ManagerConfig,
    connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState, Metrics},
    dispatcher::{SessionStatus, SubscriptionId},
    events::ClientEvent,
    manager::{ConnectionManager, SendOutcome},
    messages::{ClientMessage, MessageKind, ServerMessage, SessionId},
};

// Re-export runtime
pub use runtime::{SessionClient, SessionClientBuilder};

/// Create a new session client builder
pub fn builder() -> SessionClientBuilder<runtime::states::NoUrl> {
    SessionClientBuilder::new()
}
