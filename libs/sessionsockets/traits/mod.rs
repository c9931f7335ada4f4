//! # SessionSockets Traits
//!
//! The seams of the session engine:
//!
//! - **Connector / Transport**: open and drive one network connection
//! - **Scheduler**: single-shot cancellable timers
//! - **ReconnectionStrategy**: backoff curve and attempt bound
//! - **Observer**: consumers of dispatched inbound messages

pub mod error;
pub mod observer;
pub mod reconnect;
pub mod scheduler;
pub mod transport;

// Re-export commonly used types
pub use error::{Result, SessionError};
pub use observer::Observer;
pub use reconnect::{ExponentialBackoff, FixedDelay, NeverReconnect, ReconnectionStrategy};
pub use scheduler::{Scheduler, TimerId};
pub use transport::{Connector, Transport, TransportEvent, TransportId};
