//! Observer trait for dispatched inbound messages
//!
//! Observers are registered per [`MessageKind`](crate::core::messages::MessageKind)
//! and invoked sequentially, in registration order, on the event loop.
//!
//! # Example
//!
//! ```ignore
//! struct ResponsePrinter;
//!
//! impl Observer for ResponsePrinter {
//!     fn on_message(&mut self, message: &ServerMessage) -> Result<()> {
//!         if let ServerMessage::AgentResponse(response) = message {
//!             println!("agent: {}", response.content);
//!         }
//!         Ok(())
//!     }
//! }
//! ```

use crate::core::messages::ServerMessage;
use crate::error::Result;

/// Receives decoded server messages of the kinds it subscribed to
///
/// **Important**: observers run on the event loop. They must not block.
///
/// # Errors
/// A returned error is logged and does not affect sibling observers or
/// later messages. A panic is caught and treated the same way.
pub trait Observer: Send + 'static {
    fn on_message(&mut self, message: &ServerMessage) -> Result<()>;
}

impl<F> Observer for F
where
    F: FnMut(&ServerMessage) -> Result<()> + Send + 'static,
{
    fn on_message(&mut self, message: &ServerMessage) -> Result<()> {
        self(message)
    }
}
