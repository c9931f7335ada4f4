use thiserror::Error;

/// Main error type for sessionsockets
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    /// Transport failed to open or to carry a frame
    #[error("Transport error: {0}")]
    Transport(String),

    /// Connection closed unexpectedly
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    /// Peer answered the handshake with an error frame or a mismatched ack
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// No handshake_ack arrived within the configured bound
    #[error("Handshake timed out after {0:?}")]
    HandshakeTimeout(std::time::Duration),

    /// Frame could not be encoded
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Outbound queue is at capacity
    #[error("Outbound queue full (capacity {capacity})")]
    QueueFull { capacity: usize },

    /// Operation not allowed in the current connection state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Operation needs a session but connect() was never called
    #[error("No session: call connect() first")]
    NoSession,

    /// Reconnection attempts exhausted
    #[error("Reconnection failed after {attempts} attempts")]
    ReconnectionExhausted { attempts: u32 },

    /// Channel send error
    #[error("Channel send error: {0}")]
    ChannelSend(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Result type for sessionsockets operations
pub type Result<T> = std::result::Result<T, SessionError>;
