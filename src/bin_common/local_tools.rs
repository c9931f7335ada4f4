//! Tools this client runs on the agent's behalf

use serde_json::{json, Value};
use sessionsockets::messages::ToolRequest;

pub const SEND_NOTIFICATION: &str = "pwa_send_notification";

/// Run `request` locally, or decline it with a reason for the agent
///
/// Only notifications are supported; they are shown on stdout.
pub fn answer_tool_request(request: &ToolRequest) -> Result<Value, String> {
    if request.tool_name != SEND_NOTIFICATION {
        return Err(format!("{} is not available in session-chat", request.tool_name));
    }

    let title = request
        .parameters
        .get("title")
        .and_then(Value::as_str)
        .unwrap_or("Notification");
    match request.parameters.get("body").and_then(Value::as_str) {
        Some(body) => println!("[notify] {}: {}", title, body),
        None => println!("[notify] {}", title),
    }
    Ok(json!({ "success": true }))
}
