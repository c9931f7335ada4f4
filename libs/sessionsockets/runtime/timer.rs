use super::client::LoopEvent;
use crate::traits::{Scheduler, TimerId};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

/// [`Scheduler`] backed by `tokio::time::sleep` tasks
///
/// A fired timer is delivered to the session loop as [`LoopEvent::Timer`].
/// Cancelling aborts the sleeping task.
pub struct TokioScheduler {
    loop_tx: UnboundedSender<LoopEvent>,
    pending: HashMap<TimerId, JoinHandle<()>>,
}

impl TokioScheduler {
    pub(crate) fn new(loop_tx: UnboundedSender<LoopEvent>) -> Self {
        Self {
            loop_tx,
            pending: HashMap::new(),
        }
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&mut self, id: TimerId, delay: Duration) {
        self.pending.retain(|_, handle| !handle.is_finished());

        let loop_tx = self.loop_tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = loop_tx.send(LoopEvent::Timer(id));
        });

        if let Some(previous) = self.pending.insert(id, handle) {
            previous.abort();
        }
    }

    fn cancel(&mut self, id: TimerId) {
        if let Some(handle) = self.pending.remove(&id) {
            handle.abort();
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        for (_, handle) in self.pending.drain() {
            handle.abort();
        }
    }
}
