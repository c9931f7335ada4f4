//! Tokio runtime for the connection manager
//!
//! ```text
//! SessionClient ──Command──┐
//! WsTransport tasks ───────┼──► LoopEvent channel ──► session loop ──► ConnectionManager
//! TokioScheduler timers ───┘                                               │
//!                                              ClientEvent (crossbeam) ◄───┘
//! ```
//!
//! One tokio task owns the manager and processes every stimulus in arrival
//! order, so the manager itself needs no locking.

pub mod builder;
pub mod client;
pub mod timer;
pub mod ws;

pub use builder::{states, SessionClientBuilder};
pub use client::SessionClient;
pub use timer::TokioScheduler;
pub use ws::{WsConnector, WsTransport};
