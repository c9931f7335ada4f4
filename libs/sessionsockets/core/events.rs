use super::connection_state::ConnectionState;
use std::time::Duration;

/// Lifecycle notifications emitted by the manager
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// Connection state changed
    StateChanged(ConnectionState),
    /// Handshake acknowledged; queued frames have been flushed
    Ready {
        connection_id: String,
        is_reconnect: bool,
    },
    /// Unintentional closure; a retry is scheduled
    Reconnecting { attempt: u32, delay: Duration },
    /// Retry budget used up; terminal until connect() is called
    ReconnectExhausted { attempts: u32 },
    /// Peer refused the handshake
    HandshakeRejected { code: String, message: String },
    /// An outbound message was refused
    SendRejected { reason: String },
    /// Any other surfaced error
    Error(String),
}
