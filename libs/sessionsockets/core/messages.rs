//! Wire message types
//!
//! Every frame is a JSON object with a mandatory `type` discriminator.
//! Client frames are serialized through [`ClientMessage`]; server frames are
//! decoded by [`codec::decode`](super::codec::decode) into [`ServerMessage`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Caller-supplied identifier of a logical conversation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// =============================================================================
// Client -> server
// =============================================================================

/// Frames the client sends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Handshake(Handshake),
    UserMessage(UserMessage),
    ToolResponse(ToolResponse),
}

impl ClientMessage {
    /// Wire name of this frame's `type`
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::Handshake(_) => "handshake",
            ClientMessage::UserMessage(_) => "user_message",
            ClientMessage::ToolResponse(_) => "tool_response",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Handshake {
    pub session_id: SessionId,
    pub client_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserMessage {
    pub session_id: SessionId,
    pub message: String,
    /// Item context (clip, song, playlist) the message refers to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    pub request_id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResponse {
    /// Build a response from the outcome of running a requested tool
    pub fn from_result(request_id: impl Into<String>, result: Result<Value, String>) -> Self {
        match result {
            Ok(data) => Self {
                request_id: request_id.into(),
                success: true,
                data: Some(data),
                error: None,
            },
            Err(error) => Self {
                request_id: request_id.into(),
                success: false,
                data: None,
                error: Some(error),
            },
        }
    }
}

// =============================================================================
// Server -> client
// =============================================================================

/// Routing key for inbound frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    HandshakeAck,
    AgentResponse,
    TypingIndicator,
    Error,
    SessionStatus,
    ToolReport,
    ToolResult,
    ToolRequest,
    ClipUpdated,
    SongUpdated,
    PlaylistUpdated,
    PlayerStateUpdate,
    Notification,
    FormRequest,
    FileDownload,
    /// Any other `*_updated` frame
    ResourceUpdated,
}

impl MessageKind {
    /// Map a wire `type` to its kind. Unknown types yield `None`.
    pub fn from_type(kind: &str) -> Option<Self> {
        let kind = match kind {
            "handshake_ack" => MessageKind::HandshakeAck,
            "agent_response" => MessageKind::AgentResponse,
            "typing_indicator" => MessageKind::TypingIndicator,
            "error" => MessageKind::Error,
            "session_status" => MessageKind::SessionStatus,
            "tool_report" => MessageKind::ToolReport,
            "tool_result" => MessageKind::ToolResult,
            "tool_request" => MessageKind::ToolRequest,
            "clip_updated" => MessageKind::ClipUpdated,
            "song_updated" => MessageKind::SongUpdated,
            "playlist_updated" => MessageKind::PlaylistUpdated,
            "player_state_update" => MessageKind::PlayerStateUpdate,
            "notification" => MessageKind::Notification,
            "form_request" => MessageKind::FormRequest,
            "file_download" => MessageKind::FileDownload,
            other if other.len() > "_updated".len() && other.ends_with("_updated") => {
                MessageKind::ResourceUpdated
            }
            _ => return None,
        };
        Some(kind)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::HandshakeAck => "handshake_ack",
            MessageKind::AgentResponse => "agent_response",
            MessageKind::TypingIndicator => "typing_indicator",
            MessageKind::Error => "error",
            MessageKind::SessionStatus => "session_status",
            MessageKind::ToolReport => "tool_report",
            MessageKind::ToolResult => "tool_result",
            MessageKind::ToolRequest => "tool_request",
            MessageKind::ClipUpdated => "clip_updated",
            MessageKind::SongUpdated => "song_updated",
            MessageKind::PlaylistUpdated => "playlist_updated",
            MessageKind::PlayerStateUpdate => "player_state_update",
            MessageKind::Notification => "notification",
            MessageKind::FormRequest => "form_request",
            MessageKind::FileDownload => "file_download",
            MessageKind::ResourceUpdated => "*_updated",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoded frames the server sends
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    HandshakeAck(HandshakeAck),
    AgentResponse(AgentResponse),
    TypingIndicator(TypingIndicator),
    Error(ErrorFrame),
    SessionStatus(SessionStatusFrame),
    ToolReport(ToolReport),
    ToolResult(ToolResult),
    ToolRequest(ToolRequest),
    ClipUpdated(ClipUpdated),
    SongUpdated(SongUpdated),
    PlaylistUpdated(PlaylistUpdated),
    PlayerStateUpdate(PlayerStateUpdate),
    Notification(DomainFrame),
    FormRequest(DomainFrame),
    FileDownload(DomainFrame),
    ResourceUpdated(DomainFrame),
}

impl ServerMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            ServerMessage::HandshakeAck(_) => MessageKind::HandshakeAck,
            ServerMessage::AgentResponse(_) => MessageKind::AgentResponse,
            ServerMessage::TypingIndicator(_) => MessageKind::TypingIndicator,
            ServerMessage::Error(_) => MessageKind::Error,
            ServerMessage::SessionStatus(_) => MessageKind::SessionStatus,
            ServerMessage::ToolReport(_) => MessageKind::ToolReport,
            ServerMessage::ToolResult(_) => MessageKind::ToolResult,
            ServerMessage::ToolRequest(_) => MessageKind::ToolRequest,
            ServerMessage::ClipUpdated(_) => MessageKind::ClipUpdated,
            ServerMessage::SongUpdated(_) => MessageKind::SongUpdated,
            ServerMessage::PlaylistUpdated(_) => MessageKind::PlaylistUpdated,
            ServerMessage::PlayerStateUpdate(_) => MessageKind::PlayerStateUpdate,
            ServerMessage::Notification(_) => MessageKind::Notification,
            ServerMessage::FormRequest(_) => MessageKind::FormRequest,
            ServerMessage::FileDownload(_) => MessageKind::FileDownload,
            ServerMessage::ResourceUpdated(_) => MessageKind::ResourceUpdated,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_tool_timeout_ms() -> u64 {
    30_000
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandshakeAck {
    pub session_id: SessionId,
    pub connection_id: String,
    #[serde(default)]
    pub is_reconnect: bool,
    /// Server-side snapshot of the session, if provided
    #[serde(default)]
    pub session_info: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub content: String,
    #[serde(default = "default_true")]
    pub is_final: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypingIndicator {
    pub is_typing: bool,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorFrame {
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub details: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStatusFrame {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub progress: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolReport {
    pub tool_name: String,
    #[serde(default)]
    pub tool_call_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_name: String,
    #[serde(default)]
    pub content: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRequest {
    pub request_id: String,
    pub tool_name: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    #[serde(default = "default_tool_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipUpdated {
    pub clip_id: String,
    pub new_code: String,
    #[serde(default)]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongUpdated {
    pub song_id: String,
    #[serde(default)]
    pub clip_ids: Vec<String>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistUpdated {
    pub playlist_id: String,
    #[serde(default)]
    pub song_ids: Vec<String>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerStateUpdate {
    pub is_playing: bool,
    #[serde(default)]
    pub loaded_clips: Option<Vec<String>>,
    #[serde(default)]
    pub current_bpm: Option<u32>,
}

/// Free-form frame forwarded to observers as received
#[derive(Debug, Clone, PartialEq)]
pub struct DomainFrame {
    /// Wire `type` of the frame
    pub kind: String,
    /// All fields except `type`
    pub fields: Map<String, Value>,
}

impl DomainFrame {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}
