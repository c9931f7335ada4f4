pub mod states;

use super::client::SessionClient;
use super::timer::TokioScheduler;
use super::ws::WsConnector;
use crate::core::config::ManagerConfig;
use crate::core::manager::ConnectionManager;
use crate::core::messages::{MessageKind, SessionId};
use crate::traits::*;
use states::*;
use std::time::Duration;
use tracing::debug;

/// Type-state builder for [`SessionClient`]
///
/// The URL must be set before `build()` becomes available. Observers added
/// here are registered before the session loop starts, so they see every
/// frame from the first transport on.
pub struct SessionClientBuilder<U>
where
    U: UrlState,
{
    _state: TypeState<U>,
    url: Option<String>,
    config: ManagerConfig,
    observers: Vec<(MessageKind, Box<dyn Observer>)>,
    session: Option<SessionId>,
}

impl SessionClientBuilder<NoUrl> {
    /// Create a new builder instance
    pub fn new() -> Self {
        Self {
            _state: TypeState::new(),
            url: None,
            config: ManagerConfig::default(),
            observers: Vec::new(),
            session: None,
        }
    }

    pub fn url(self, url: impl Into<String>) -> SessionClientBuilder<HasUrl> {
        SessionClientBuilder {
            _state: TypeState::new(),
            url: Some(url.into()),
            config: self.config,
            observers: self.observers,
            session: self.session,
        }
    }
}

impl Default for SessionClientBuilder<NoUrl> {
    fn default() -> Self {
        Self::new()
    }
}

impl<U> SessionClientBuilder<U>
where
    U: UrlState,
{
    /// Client kind announced in the handshake (default `pwa`)
    pub fn client_kind(mut self, kind: impl Into<String>) -> Self {
        self.config = self.config.client_kind(kind);
        self
    }

    pub fn client_version(mut self, version: impl Into<String>) -> Self {
        self.config = self.config.client_version(Some(version.into()));
        self
    }

    pub fn reconnect_strategy<S>(mut self, strategy: S) -> Self
    where
        S: ReconnectionStrategy + 'static,
    {
        self.config = self.config.reconnect_strategy(strategy);
        self
    }

    /// Bound from opening a transport to its `handshake_ack`; `None` waits forever
    pub fn handshake_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config = self.config.handshake_timeout(timeout);
        self
    }

    /// Outbound queue capacity; `None` is unbounded
    pub fn queue_capacity(mut self, capacity: Option<usize>) -> Self {
        self.config = self.config.queue_capacity(capacity);
        self
    }

    /// Undrained lifecycle events kept before the oldest is dropped
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config = self.config.event_capacity(capacity);
        self
    }

    /// Replace the whole manager configuration
    pub fn config(mut self, config: ManagerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn observer<O: Observer>(mut self, kind: MessageKind, observer: O) -> Self {
        self.observers.push((kind, Box::new(observer)));
        self
    }

    /// Connect to this session as soon as the client is built
    pub fn session(mut self, session_id: impl Into<SessionId>) -> Self {
        self.session = Some(session_id.into());
        self
    }
}

impl SessionClientBuilder<HasUrl> {
    /// Build the client and start its session loop
    ///
    /// Must be called from within a tokio runtime.
    pub async fn build(self) -> Result<SessionClient> {
        let url = self
            .url
            .ok_or_else(|| SessionError::Configuration("url is required".to_string()))?;

        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(SessionError::Configuration(format!(
                "url must use ws:// or wss://, got {}",
                url
            )));
        }

        let (loop_tx, loop_rx) = tokio::sync::mpsc::unbounded_channel();

        let mut manager = ConnectionManager::new(
            self.config,
            Box::new(WsConnector::new(url.clone(), loop_tx.clone())),
            Box::new(TokioScheduler::new(loop_tx.clone())),
        );

        for (kind, observer) in self.observers {
            manager.subscribe_boxed(kind, observer);
        }

        if let Some(session_id) = self.session {
            manager.connect(session_id);
        }

        debug!("Session client built for {}", url);
        Ok(SessionClient::spawn(manager, loop_tx, loop_rx))
    }
}
