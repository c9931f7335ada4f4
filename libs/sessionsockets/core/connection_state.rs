//! Lock-free connection state and counters
//!
//! Written only by the event loop, read from any handle.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConnectionState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
    Handshaking = 3,
    Ready = 4,
    Reconnecting = 5,
    Error = 6,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            3 => ConnectionState::Handshaking,
            4 => ConnectionState::Ready,
            5 => ConnectionState::Reconnecting,
            6 => ConnectionState::Error,
            _ => ConnectionState::Disconnected,
        }
    }

    /// A transport is open or being opened for the current session
    pub fn is_active(self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting
                | ConnectionState::Connected
                | ConnectionState::Handshaking
                | ConnectionState::Ready
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Handshaking => "handshaking",
            ConnectionState::Ready => "ready",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Atomic wrapper around [`ConnectionState`]
#[derive(Debug)]
pub struct AtomicConnectionState(AtomicU8);

impl AtomicConnectionState {
    pub fn new(state: ConnectionState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    #[inline]
    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Store a new state, returning the previous one
    #[inline]
    pub fn set(&self, state: ConnectionState) -> ConnectionState {
        ConnectionState::from_u8(self.0.swap(state as u8, Ordering::AcqRel))
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.get() == ConnectionState::Ready
    }

    #[inline]
    pub fn is_disconnected(&self) -> bool {
        self.get() == ConnectionState::Disconnected
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        self.get() == ConnectionState::Error
    }
}

impl Default for AtomicConnectionState {
    fn default() -> Self {
        Self::new(ConnectionState::Disconnected)
    }
}

/// Client metrics snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub frames_sent: u64,
    pub frames_received: u64,
    pub frames_dropped: u64,
    pub reconnect_count: u64,
    pub connection_state: ConnectionState,
}

/// Frame and reconnect counters
#[derive(Debug, Default)]
pub struct AtomicMetrics {
    frames_sent: AtomicU64,
    frames_received: AtomicU64,
    frames_dropped: AtomicU64,
    reconnect_count: AtomicU64,
}

impl AtomicMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn increment_sent(&self) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Inbound frame that could not be decoded or had an unknown kind
    #[inline]
    pub fn increment_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_reconnects(&self) {
        self.reconnect_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent.load(Ordering::Relaxed)
    }

    pub fn frames_received(&self) -> u64 {
        self.frames_received.load(Ordering::Relaxed)
    }

    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped.load(Ordering::Relaxed)
    }

    pub fn reconnect_count(&self) -> u64 {
        self.reconnect_count.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self, connection_state: ConnectionState) -> Metrics {
        Metrics {
            frames_sent: self.frames_sent(),
            frames_received: self.frames_received(),
            frames_dropped: self.frames_dropped(),
            reconnect_count: self.reconnect_count(),
            connection_state,
        }
    }
}
