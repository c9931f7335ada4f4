//! Inbound message dispatch
//!
//! ```text
//! frame → codec → ConnectionManager bookkeeping (ack / status / error)
//!                        ↓
//!                 MessageDispatcher → observers[kind] (registration order)
//! ```
//!
//! Every observer registered for a kind sees every message of that kind.
//! An observer that returns an error or panics is logged and skipped; the
//! remaining observers still run.

use super::messages::{MessageKind, ServerMessage};
use crate::traits::Observer;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, error};

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

/// Outcome of dispatching one message
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
}

struct Registration {
    id: SubscriptionId,
    observer: Box<dyn Observer>,
}

/// Publish/subscribe registry keyed by message kind
#[derive(Default)]
pub struct MessageDispatcher {
    observers: HashMap<MessageKind, Vec<Registration>>,
    next_id: u64,
}

impl MessageDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, kind: MessageKind, observer: Box<dyn Observer>) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.observers
            .entry(kind)
            .or_default()
            .push(Registration { id, observer });
        debug!("Observer {:?} subscribed to {}", id, kind);
        id
    }

    /// Remove a subscription. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        for registrations in self.observers.values_mut() {
            if let Some(index) = registrations.iter().position(|r| r.id == id) {
                registrations.remove(index);
                return true;
            }
        }
        false
    }

    pub fn observer_count(&self, kind: MessageKind) -> usize {
        self.observers.get(&kind).map_or(0, Vec::len)
    }

    /// Deliver `message` to every observer of its kind, in registration order
    pub fn dispatch(&mut self, message: &ServerMessage) -> DispatchReport {
        let kind = message.kind();
        let mut report = DispatchReport::default();

        let Some(registrations) = self.observers.get_mut(&kind) else {
            return report;
        };

        for registration in registrations.iter_mut() {
            let observer = &mut registration.observer;
            match catch_unwind(AssertUnwindSafe(|| observer.on_message(message))) {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(e)) => {
                    report.failed += 1;
                    error!("Observer {:?} failed on {}: {}", registration.id, kind, e);
                }
                Err(panic) => {
                    report.failed += 1;
                    error!(
                        "Observer {:?} panicked on {}: {}",
                        registration.id,
                        kind,
                        panic_message(panic.as_ref())
                    );
                }
            }
        }

        report
    }
}

impl std::fmt::Debug for MessageDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: HashMap<_, _> = self.observers.iter().map(|(k, v)| (*k, v.len())).collect();
        f.debug_struct("MessageDispatcher").field("observers", &counts).finish()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

// =============================================================================
// Session status bookkeeping
// =============================================================================

/// Observable agent-side status of the session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionStatus {
    pub is_typing: bool,
    pub typing_text: Option<String>,
    /// Last `session_status.status` value
    pub status: Option<String>,
    pub message: Option<String>,
    pub progress: Option<f64>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl SessionStatus {
    /// Apply a status-bearing frame. Returns true if the frame changed
    /// anything tracked here.
    pub fn apply(&mut self, message: &ServerMessage) -> bool {
        match message {
            ServerMessage::TypingIndicator(typing) => {
                self.is_typing = typing.is_typing;
                self.typing_text = if typing.is_typing { typing.text.clone() } else { None };
            }
            ServerMessage::SessionStatus(status) => {
                self.status = Some(status.status.clone());
                self.message = status.message.clone();
                self.progress = status.progress;
            }
            // A final response always ends the typing phase
            ServerMessage::AgentResponse(response) if response.is_final && self.is_typing => {
                self.is_typing = false;
                self.typing_text = None;
            }
            _ => return false,
        }
        self.updated_at = Some(Utc::now());
        true
    }
}
