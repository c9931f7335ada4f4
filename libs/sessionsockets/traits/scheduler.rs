use std::fmt;
use std::time::Duration;

/// Identifier of one scheduled timer, unique per manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer-{}", self.0)
    }
}

/// Single-shot cancellable timers
///
/// When a scheduled timer elapses the implementation must deliver `id`
/// back to the manager's `on_timer`. A cancelled timer must not be
/// delivered; the manager additionally ignores ids it no longer tracks.
pub trait Scheduler: Send {
    fn schedule(&mut self, id: TimerId, delay: Duration);

    fn cancel(&mut self, id: TimerId);
}
