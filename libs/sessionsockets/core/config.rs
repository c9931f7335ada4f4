use super::handshake::{DEFAULT_CLIENT_KIND, DEFAULT_HANDSHAKE_TIMEOUT};
use crate::traits::{ExponentialBackoff, ReconnectionStrategy};
use std::time::Duration;

/// Default outbound queue capacity
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Default number of undrained lifecycle events kept
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Configuration for a [`ConnectionManager`](super::manager::ConnectionManager)
pub struct ManagerConfig {
    /// Client kind announced in the handshake (`client_type`)
    pub client_kind: String,

    /// Client version announced in the handshake
    pub client_version: Option<String>,

    /// Backoff curve and attempt bound for unintentional closures
    pub reconnect_strategy: Box<dyn ReconnectionStrategy>,

    /// Bound from opening a transport to its `handshake_ack` (None = wait forever)
    pub handshake_timeout: Option<Duration>,

    /// Outbound queue capacity (None = unbounded)
    pub queue_capacity: Option<usize>,

    /// Undrained lifecycle events kept; the oldest is dropped when full
    pub event_capacity: usize,
}

impl ManagerConfig {
    pub fn client_kind(mut self, kind: impl Into<String>) -> Self {
        self.client_kind = kind.into();
        self
    }

    pub fn client_version(mut self, version: Option<String>) -> Self {
        self.client_version = version;
        self
    }

    pub fn reconnect_strategy(mut self, strategy: impl ReconnectionStrategy + 'static) -> Self {
        self.reconnect_strategy = Box::new(strategy);
        self
    }

    pub fn handshake_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn queue_capacity(mut self, capacity: Option<usize>) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            client_kind: DEFAULT_CLIENT_KIND.to_string(),
            client_version: Some(env!("CARGO_PKG_VERSION").to_string()),
            reconnect_strategy: Box::new(ExponentialBackoff::default()),
            handshake_timeout: Some(DEFAULT_HANDSHAKE_TIMEOUT),
            queue_capacity: Some(DEFAULT_QUEUE_CAPACITY),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl std::fmt::Debug for ManagerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagerConfig")
            .field("client_kind", &self.client_kind)
            .field("client_version", &self.client_version)
            .field("max_attempts", &self.reconnect_strategy.max_attempts())
            .field("handshake_timeout", &self.handshake_timeout)
            .field("queue_capacity", &self.queue_capacity)
            .field("event_capacity", &self.event_capacity)
            .finish()
    }
}
