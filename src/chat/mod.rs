pub mod reducer;
pub mod session;
pub mod sse;
pub mod stream;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use reducer::{ConversationState, SubmitRejected, Submission, Transition};
pub use session::ChatSession;

/// Shown when an inbound event is not a valid stream payload.
pub const PARSE_ERROR_MESSAGE: &str = "Failed to parse server response";
/// Shown when the streaming connection fails or drops.
pub const TRANSPORT_ERROR_MESSAGE: &str =
    "Failed to reach the server, please check your network connection";

/// Identity of one turn in the conversation log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TurnId(Uuid);

impl TurnId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TurnId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TurnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

/// One message in the visible conversation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTurn {
    pub id: TurnId,
    pub is_user: bool,
    pub content: String,
    pub finished: bool,
    pub error_message: Option<String>,
    pub usage: Option<TokenUsage>,
    pub created_at: DateTime<Local>,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: TurnId::new(),
            is_user: true,
            content: content.into(),
            finished: true,
            error_message: None,
            usage: None,
            created_at: Local::now(),
        }
    }

    pub fn assistant() -> Self {
        Self {
            id: TurnId::new(),
            is_user: false,
            content: String::new(),
            finished: false,
            error_message: None,
            usage: None,
            created_at: Local::now(),
        }
    }

    /// A turn is terminal once it finished or failed; it is never mutated again.
    pub fn is_terminal(&self) -> bool {
        self.finished || self.error_message.is_some()
    }
}

/// Wire payload of one SSE `message` event.
///
/// Every field may be missing; `null` is treated the same as absent.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamEvent {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub finished: Option<bool>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub usage: Option<TokenUsage>,
}

impl StreamEvent {
    pub fn parse(raw: &str) -> Result<Self, ChatError> {
        serde_json::from_str(raw).map_err(|e| ChatError::Parse(e.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Server returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Stream closed before a terminal event")]
    Closed,
    #[error("Parse error: {0}")]
    Parse(String),
}

impl Serialize for ChatError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
