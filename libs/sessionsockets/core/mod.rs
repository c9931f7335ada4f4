//! # Session engine core
//!
//! Runtime-agnostic building blocks. Nothing here spawns tasks or touches
//! the network; [`ConnectionManager`] is driven entirely through method
//! calls and reports back through its event channel.
//!
//! ## Example
//!
//! ```rust,ignore
//! use sessionsockets::core::{ConnectionManager, ManagerConfig, MessageKind};
//!
//! let mut manager = ConnectionManager::new(
//!     ManagerConfig::default().client_kind("cli"),
//!     Box::new(my_connector),
//!     Box::new(my_scheduler),
//! );
//!
//! manager.subscribe(MessageKind::AgentResponse, |msg: &ServerMessage| {
//!     println!("{:?}", msg);
//!     Ok(())
//! });
//!
//! manager.connect("session-123");
//! // ... feed on_transport_open / on_frame / on_transport_closed / on_timer
//! ```

pub mod codec;
pub mod config;
pub mod connection_state;
pub mod dispatcher;
pub mod events;
pub mod handshake;
pub mod manager;
pub mod messages;
pub mod policy;
pub mod queue;

// Re-export main types
pub use codec::{decode, encode, DecodeError};
pub use config::{ManagerConfig, DEFAULT_EVENT_CAPACITY, DEFAULT_QUEUE_CAPACITY};
pub use connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState, Metrics};
pub use dispatcher::{DispatchReport, MessageDispatcher, SessionStatus, SubscriptionId};
pub use events::ClientEvent;
pub use handshake::{AckOutcome, HandshakeProtocol, DEFAULT_CLIENT_KIND, DEFAULT_HANDSHAKE_TIMEOUT};
pub use manager::{ConnectionManager, SendOutcome};
pub use messages::*;
pub use policy::{ReconnectionPolicy, RetryPlan};
pub use queue::{MessageQueue, QueuedMessage};
