//! Strudel session client - main library
//!
//! Composition root for the workspace.
//!
//! ## Architecture
//!
//! - **bin_common**: Shared utilities for binaries (CLI, console output, local tools, logging, shutdown)
//! - **playback**: Bridge between dispatched frames and the playback engine
//! - **sessionsockets**: Session protocol engine (re-exported from workspace)
//! - **session_config**: YAML/env configuration (re-exported from workspace)
//!
//! ## Usage in Binaries
//!
//! ```rust,ignore
//! use strudel_client::bin_common::{init_tracing, ShutdownManager};
//! use strudel_client::session_config::SessionConfig;
//! ```

// Re-export workspace libraries for convenience
pub use session_config;
pub use sessionsockets;

pub mod playback;

// Binary common utilities
pub mod bin_common {
    //! Common utilities for binary executables

    pub mod cli;
    pub mod console;
    pub mod local_tools;
    pub mod logging;
    pub mod shutdown;

    pub use cli::{parse_args, resolve_session_id};
    pub use console::write_frame;
    pub use local_tools::answer_tool_request;
    pub use logging::init_tracing;
    pub use shutdown::ShutdownManager;
}
