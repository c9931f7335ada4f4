//! Handshake sub-protocol
//!
//! Every new transport starts with exactly one `handshake` frame and waits
//! for a matching `handshake_ack`. This module only tracks the exchange; the
//! connection manager decides what each outcome does to connection state.

use super::codec;
use super::messages::{ClientMessage, Handshake, HandshakeAck, SessionId};
use crate::error::Result;
use crate::traits::TransportId;
use std::time::{Duration, Instant};

/// Default client kind announced in the handshake
pub const DEFAULT_CLIENT_KIND: &str = "pwa";

/// Default bound on waiting for `handshake_ack`
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
struct PendingHandshake {
    session_id: SessionId,
    transport: TransportId,
    started_at: Instant,
}

/// Result of feeding an ack to the protocol
#[derive(Debug, Clone, PartialEq)]
pub enum AckOutcome {
    /// Ack matches the pending handshake
    Accepted {
        connection_id: String,
        is_reconnect: bool,
        elapsed: Duration,
    },
    /// Ack names a different session than the one handshaken
    Rejected(String),
    /// No handshake is pending; ack has no handshake meaning
    Ignored,
}

/// Builds handshake frames and matches acknowledgments
#[derive(Debug)]
pub struct HandshakeProtocol {
    client_kind: String,
    client_version: Option<String>,
    pending: Option<PendingHandshake>,
}

impl HandshakeProtocol {
    pub fn new(client_kind: impl Into<String>, client_version: Option<String>) -> Self {
        Self {
            client_kind: client_kind.into(),
            client_version,
            pending: None,
        }
    }

    /// Encode the handshake frame for `transport` and mark it pending
    pub fn begin(&mut self, session_id: &SessionId, transport: TransportId) -> Result<String> {
        let frame = codec::encode(&ClientMessage::Handshake(Handshake {
            session_id: session_id.clone(),
            client_type: self.client_kind.clone(),
            client_version: self.client_version.clone(),
        }))?;

        self.pending = Some(PendingHandshake {
            session_id: session_id.clone(),
            transport,
            started_at: Instant::now(),
        });
        Ok(frame)
    }

    pub fn on_ack(&mut self, ack: &HandshakeAck) -> AckOutcome {
        let Some(pending) = self.pending.take() else {
            return AckOutcome::Ignored;
        };

        if ack.session_id != pending.session_id {
            return AckOutcome::Rejected(format!(
                "ack for session {} while handshaking session {} on {}",
                ack.session_id, pending.session_id, pending.transport
            ));
        }

        AckOutcome::Accepted {
            connection_id: ack.connection_id.clone(),
            is_reconnect: ack.is_reconnect,
            elapsed: pending.started_at.elapsed(),
        }
    }

    /// Drop any pending exchange (closure, timeout, error frame, disconnect)
    pub fn abort(&mut self) -> bool {
        self.pending.take().is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending_transport(&self) -> Option<TransportId> {
        self.pending.as_ref().map(|p| p.transport)
    }

    pub fn client_kind(&self) -> &str {
        &self.client_kind
    }
}

impl Default for HandshakeProtocol {
    fn default() -> Self {
        Self::new(DEFAULT_CLIENT_KIND, Some(env!("CARGO_PKG_VERSION").to_string()))
    }
}
