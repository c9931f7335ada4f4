//! Graceful shutdown management

use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::info;

/// Shutdown request shared between the signal handler and the main loop
///
/// Cheap to clone; all clones observe the same request.
#[derive(Clone)]
pub struct ShutdownManager {
    stop: Arc<watch::Sender<bool>>,
}

impl ShutdownManager {
    pub fn new() -> Self {
        let (stop, _) = watch::channel(false);
        Self {
            stop: Arc::new(stop),
        }
    }

    /// Spawn a Ctrl+C signal handler that triggers shutdown
    pub fn spawn_signal_handler(&self) {
        let shutdown = self.clone();
        tokio::spawn(async move {
            if signal::ctrl_c().await.is_ok() {
                info!("");
                info!("Received shutdown signal (Ctrl+C)");
                info!("Shutting down gracefully...");
                shutdown.trigger();
            }
        });
    }

    /// Request shutdown from inside the process (e.g. stdin closed)
    pub fn trigger(&self) {
        self.stop.send_replace(true);
    }

    pub fn is_running(&self) -> bool {
        !*self.stop.borrow()
    }

    /// Resolves once shutdown has been requested
    pub async fn requested(&self) {
        let mut rx = self.stop.subscribe();
        // The sender lives as long as self, so this cannot fail
        let _ = rx.wait_for(|stop| *stop).await;
    }
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}
