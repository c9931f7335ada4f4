//! Playback collaborator bridge
//!
//! The audio engine is an external black box behind [`PlaybackEngine`].
//! [`PlaybackBridge`] subscribes to `clip_updated` and `player_state_update`
//! frames, drives the engine, and reports engine failures on an explicit
//! channel returned by [`PlaybackBridge::new`].

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use sessionsockets::{MessageKind, Observer, ServerMessage};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlaybackError {
    /// The engine has no clip with this id loaded
    #[error("Unknown clip: {0}")]
    UnknownClip(String),

    /// Pattern code failed to evaluate
    #[error("Pattern evaluation failed for {clip_id}: {message}")]
    Evaluation { clip_id: String, message: String },

    /// The engine cannot be driven right now
    #[error("Playback engine unavailable: {0}")]
    Unavailable(String),
}

/// Audio/pattern playback engine
pub trait PlaybackEngine: Send + 'static {
    fn play(&mut self, clip_ids: &[String]) -> Result<(), PlaybackError>;
    fn stop(&mut self) -> Result<(), PlaybackError>;
    fn update(&mut self, clip_id: &str, code: &str) -> Result<(), PlaybackError>;
}

/// Engine operation that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOp {
    Play,
    Stop,
    Update,
}

/// Failure reported on the bridge's error channel
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackFailure {
    pub op: PlaybackOp,
    pub error: PlaybackError,
}

/// Observer feeding playback frames to a [`PlaybackEngine`]
///
/// Clones share the engine, so one bridge can be registered for both
/// message kinds.
pub struct PlaybackBridge<E> {
    engine: Arc<Mutex<E>>,
    errors: Sender<PlaybackFailure>,
}

impl<E: PlaybackEngine> PlaybackBridge<E> {
    pub fn new(engine: E) -> (Self, Receiver<PlaybackFailure>) {
        let (errors, error_rx) = unbounded();
        let bridge = Self {
            engine: Arc::new(Mutex::new(engine)),
            errors,
        };
        (bridge, error_rx)
    }

    /// Message kinds this bridge must be subscribed to
    pub const KINDS: [MessageKind; 2] = [MessageKind::ClipUpdated, MessageKind::PlayerStateUpdate];

    /// Shared handle to the engine
    pub fn engine(&self) -> Arc<Mutex<E>> {
        Arc::clone(&self.engine)
    }

    fn report(&self, op: PlaybackOp, result: Result<(), PlaybackError>) {
        if let Err(error) = result {
            warn!("Playback {:?} failed: {}", op, error);
            // Nobody listening is not a failure of the bridge
            let _ = self.errors.send(PlaybackFailure { op, error });
        }
    }
}

impl<E> Clone for PlaybackBridge<E> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            errors: self.errors.clone(),
        }
    }
}

impl<E: PlaybackEngine> Observer for PlaybackBridge<E> {
    fn on_message(&mut self, message: &ServerMessage) -> sessionsockets::Result<()> {
        match message {
            ServerMessage::ClipUpdated(update) => {
                debug!("Updating clip {}", update.clip_id);
                let result = self.engine.lock().update(&update.clip_id, &update.new_code);
                self.report(PlaybackOp::Update, result);
            }
            ServerMessage::PlayerStateUpdate(state) if state.is_playing => {
                let clips = state.loaded_clips.clone().unwrap_or_default();
                let result = self.engine.lock().play(&clips);
                self.report(PlaybackOp::Play, result);
            }
            ServerMessage::PlayerStateUpdate(_) => {
                let result = self.engine.lock().stop();
                self.report(PlaybackOp::Stop, result);
            }
            _ => {}
        }
        Ok(())
    }
}
