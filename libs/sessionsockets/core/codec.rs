//! Frame codec
//!
//! Outbound frames are serialized straight from [`ClientMessage`]. Inbound
//! frames are decoded in two steps: the `type` discriminator is read from a
//! generic JSON object first, then the kind-specific body is deserialized.
//! This keeps "unknown kind" distinct from "known kind, bad body".

use super::messages::{ClientMessage, DomainFrame, MessageKind, ServerMessage};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

/// Reasons an inbound frame could not be decoded
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("malformed frame: {0}")]
    Malformed(String),

    #[error("frame has no string `type` field")]
    MissingType,

    #[error("unknown frame kind `{0}`")]
    UnknownKind(String),

    #[error("invalid `{kind}` frame: {reason}")]
    InvalidBody { kind: String, reason: String },
}

/// Serialize a client frame to its wire text
pub fn encode(message: &ClientMessage) -> crate::Result<String> {
    serde_json::to_string(message)
        .map_err(|e| crate::SessionError::Protocol(format!("failed to encode {}: {}", message.kind(), e)))
}

/// Decode one inbound text frame
pub fn decode(frame: &str) -> Result<ServerMessage, DecodeError> {
    let value: Value =
        serde_json::from_str(frame).map_err(|e| DecodeError::Malformed(e.to_string()))?;

    let mut fields = match value {
        Value::Object(map) => map,
        other => {
            return Err(DecodeError::Malformed(format!(
                "expected a JSON object, got {}",
                json_type_name(&other)
            )))
        }
    };

    let kind_name = match fields.get("type") {
        Some(Value::String(kind)) => kind.clone(),
        _ => return Err(DecodeError::MissingType),
    };

    let kind = MessageKind::from_type(&kind_name)
        .ok_or_else(|| DecodeError::UnknownKind(kind_name.clone()))?;

    let message = match kind {
        MessageKind::HandshakeAck => ServerMessage::HandshakeAck(body(&kind_name, fields)?),
        MessageKind::AgentResponse => ServerMessage::AgentResponse(body(&kind_name, fields)?),
        MessageKind::TypingIndicator => ServerMessage::TypingIndicator(body(&kind_name, fields)?),
        MessageKind::Error => ServerMessage::Error(body(&kind_name, fields)?),
        MessageKind::SessionStatus => ServerMessage::SessionStatus(body(&kind_name, fields)?),
        MessageKind::ToolReport => ServerMessage::ToolReport(body(&kind_name, fields)?),
        MessageKind::ToolResult => ServerMessage::ToolResult(body(&kind_name, fields)?),
        MessageKind::ToolRequest => ServerMessage::ToolRequest(body(&kind_name, fields)?),
        MessageKind::ClipUpdated => ServerMessage::ClipUpdated(body(&kind_name, fields)?),
        MessageKind::SongUpdated => ServerMessage::SongUpdated(body(&kind_name, fields)?),
        MessageKind::PlaylistUpdated => ServerMessage::PlaylistUpdated(body(&kind_name, fields)?),
        MessageKind::PlayerStateUpdate => {
            ServerMessage::PlayerStateUpdate(body(&kind_name, fields)?)
        }
        MessageKind::Notification => ServerMessage::Notification(domain(kind_name, &mut fields)),
        MessageKind::FormRequest => ServerMessage::FormRequest(domain(kind_name, &mut fields)),
        MessageKind::FileDownload => ServerMessage::FileDownload(domain(kind_name, &mut fields)),
        MessageKind::ResourceUpdated => {
            ServerMessage::ResourceUpdated(domain(kind_name, &mut fields))
        }
    };

    Ok(message)
}

fn body<T: DeserializeOwned>(kind: &str, fields: Map<String, Value>) -> Result<T, DecodeError> {
    serde_json::from_value(Value::Object(fields)).map_err(|e| DecodeError::InvalidBody {
        kind: kind.to_string(),
        reason: e.to_string(),
    })
}

fn domain(kind: String, fields: &mut Map<String, Value>) -> DomainFrame {
    fields.remove("type");
    DomainFrame {
        kind,
        fields: std::mem::take(fields),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
