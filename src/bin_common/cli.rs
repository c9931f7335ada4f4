//! CLI utilities for binaries

use sessionsockets::SessionId;

/// Parse command line arguments for a binary
///
/// Returns a vector of arguments (excluding the program name)
pub fn parse_args() -> Vec<String> {
    std::env::args().skip(1).collect()
}

/// Session id from the first argument, or a fresh UUID v4
///
/// Returns the id and whether it was generated.
pub fn resolve_session_id(args: &[String]) -> (SessionId, bool) {
    match args.first().map(|arg| arg.trim()).filter(|arg| !arg.is_empty()) {
        Some(id) => (SessionId::from(id), false),
        None => (SessionId::from(uuid::Uuid::new_v4().to_string()), true),
    }
}
