//! Console rendering of dispatched frames

use serde_json::Value;
use sessionsockets::core::DomainFrame;
use sessionsockets::ServerMessage;
use std::io::{self, Write};

/// Render `message` to `out`
///
/// Output is flushed after every frame so partial agent responses, which
/// carry no newline, show up as they stream in.
pub fn write_frame<W: Write>(out: &mut W, message: &ServerMessage) -> io::Result<()> {
    match message {
        ServerMessage::AgentResponse(response) if response.is_final => {
            writeln!(out, "agent> {}", response.content)?
        }
        ServerMessage::AgentResponse(response) => write!(out, "{}", response.content)?,
        ServerMessage::TypingIndicator(typing) if typing.is_typing => writeln!(
            out,
            "... {}",
            typing.text.as_deref().unwrap_or("agent is typing")
        )?,
        ServerMessage::TypingIndicator(_) => {}
        ServerMessage::SessionStatus(status) => match &status.message {
            Some(message) => writeln!(out, "[status] {}: {}", status.status, message)?,
            None => writeln!(out, "[status] {}", status.status)?,
        },
        ServerMessage::Notification(frame) => writeln!(out, "{}", describe_notification(frame))?,
        ServerMessage::ToolReport(report) => writeln!(out, "[tool] running {}", report.tool_name)?,
        ServerMessage::ToolResult(result) => {
            writeln!(out, "[tool] {} -> {}", result.tool_name, result.content)?
        }
        ServerMessage::Error(error) => writeln!(out, "[error] {}: {}", error.code, error.message)?,
        _ => return Ok(()),
    }
    out.flush()
}

/// One-line rendering of a server `notification` frame
pub fn describe_notification(frame: &DomainFrame) -> String {
    let text = |field: &str| frame.get(field).and_then(Value::as_str);
    match (text("title"), text("message").or_else(|| text("body"))) {
        (Some(title), Some(message)) => format!("[notice] {}: {}", title, message),
        (Some(only), None) | (None, Some(only)) => format!("[notice] {}", only),
        (None, None) => format!("[notice] {}", Value::Object(frame.fields.clone())),
    }
}
