//! Transport seam between the connection manager and the network
//!
//! The manager never performs I/O itself. It asks a [`Connector`] for a new
//! [`Transport`] and later receives [`TransportEvent`]s tagged with the
//! [`TransportId`] it minted, so events from a transport that has since been
//! replaced can be recognised and ignored.

use crate::error::Result;
use std::fmt;

/// Identifier of one transport instance, unique per manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransportId(pub u64);

impl fmt::Display for TransportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transport-{}", self.0)
    }
}

/// Events a transport reports back into the event loop
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The underlying socket is open and can carry frames
    Opened,
    /// One inbound UTF-8 text frame
    Frame(String),
    /// The socket closed or failed; carries a human readable reason
    Closed(String),
}

/// One live connection to the peer
///
/// Implementations must preserve the order of `send` calls on the wire.
pub trait Transport: Send {
    /// Hand a text frame to the transport for transmission
    fn send(&mut self, frame: String) -> Result<()>;

    /// Close the transport. No further events for it will be acted upon.
    fn close(&mut self);
}

/// Factory for transports
pub trait Connector: Send {
    /// Begin opening a transport.
    ///
    /// Returning `Ok` means the attempt is underway; its outcome arrives
    /// later as `Opened` or `Closed` for `id`. Returning `Err` means the
    /// attempt failed immediately and is handled as a closure.
    fn open(&mut self, id: TransportId) -> Result<Box<dyn Transport>>;
}
