//! Message types for conversation logs
//!
//! A message belongs to exactly one session and moves through a small
//! lifecycle: created as `Sent` (user) or `Receiving` (streaming
//! placeholder), then settled into one of the terminal statuses
//! `Received`, `Failed`, or `Cancelled`.

use crate::ids::new_message_id;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role of the message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Message written by the user
    User,
    /// Message produced by the assistant
    Assistant,
    /// System-originated message (prompts, error reports)
    System,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::System => write!(f, "system"),
        }
    }
}

/// Kind of message payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Ordinary text content
    Text,
    /// Error report surfaced to the user
    Error,
}

/// Lifecycle status of a message
///
/// `Receiving` marks a placeholder whose content is still being streamed;
/// consumers that aggregate finalized data (statistics, search) must treat
/// it as in-flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    /// Sent by the caller, no response expected for this entry
    Sent,
    /// Streaming placeholder, content incomplete
    Receiving,
    /// Fully received terminal state
    Received,
    /// Exchange failed terminal state, set on the user message when a
    /// non-streamed request fails
    Failed,
    /// Stream cancelled terminal state, partial content preserved
    Cancelled,
}

impl MessageStatus {
    /// Returns true when the status is terminal or sent
    ///
    /// Only `Receiving` is considered in-flight.
    pub fn is_finalized(&self) -> bool {
        !matches!(self, Self::Receiving)
    }
}

/// Token usage reported by the transport for one exchange
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Number of tokens in the prompt
    pub prompt_tokens: usize,
    /// Number of tokens in the completion
    pub completion_tokens: usize,
    /// Total tokens used (prompt + completion)
    pub total_tokens: usize,
}

impl TokenUsage {
    /// Create a new TokenUsage instance
    ///
    /// # Examples
    ///
    /// ```
    /// use chatstore::TokenUsage;
    ///
    /// let usage = TokenUsage::new(100, 50);
    /// assert_eq!(usage.total_tokens, 150);
    /// ```
    pub fn new(prompt_tokens: usize, completion_tokens: usize) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Metadata attached to a completed assistant message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageMetadata {
    /// Wall-clock time between request start and completion, in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<u64>,

    /// Token usage reported by the transport
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,

    /// Model that produced the response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Provider finish reason ("stop", "length", ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// A single message in a session's log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message identifier (ULID)
    pub id: String,
    /// Owning session id
    pub session_id: String,
    /// Author role
    pub role: MessageRole,
    /// Payload kind
    pub kind: MessageKind,
    /// Text content; for a `Receiving` placeholder this is the
    /// accumulated-so-far stream output
    pub content: String,
    /// Lifecycle status
    pub status: MessageStatus,
    /// Creation timestamp
    pub timestamp: DateTime<Utc>,
    /// Completion metadata, present on settled assistant messages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetadata>,
    /// Pinned by the user
    #[serde(default)]
    pub pinned: bool,
    /// Starred by the user
    #[serde(default)]
    pub starred: bool,
}

impl Message {
    /// Creates a user message with status `Sent`
    ///
    /// # Examples
    ///
    /// ```
    /// use chatstore::{Message, MessageRole, MessageStatus};
    ///
    /// let msg = Message::user("s1", "Hello!");
    /// assert_eq!(msg.role, MessageRole::User);
    /// assert_eq!(msg.status, MessageStatus::Sent);
    /// ```
    pub fn user(session_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(session_id, MessageRole::User, content.into(), MessageStatus::Sent)
    }

    /// Creates a settled assistant message with status `Received`
    pub fn assistant(session_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(
            session_id,
            MessageRole::Assistant,
            content.into(),
            MessageStatus::Received,
        )
    }

    /// Creates an empty assistant placeholder with status `Receiving`
    ///
    /// The placeholder is appended before the first chunk arrives so UI
    /// layers can bind to its id immediately.
    pub fn receiving_placeholder(session_id: impl Into<String>) -> Self {
        Self::new(
            session_id,
            MessageRole::Assistant,
            String::new(),
            MessageStatus::Receiving,
        )
    }

    /// Creates a settled message with an explicit role and status `Received`
    ///
    /// Used when seeding sessions from templates, where the initial
    /// messages are stored verbatim rather than streamed.
    pub fn received(
        session_id: impl Into<String>,
        role: MessageRole,
        content: impl Into<String>,
    ) -> Self {
        Self::new(session_id, role, content.into(), MessageStatus::Received)
    }

    /// Creates a system message with status `Received`
    pub fn system(session_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(
            session_id,
            MessageRole::System,
            content.into(),
            MessageStatus::Received,
        )
    }

    /// Creates a system error message carrying the failure text
    pub fn system_error(session_id: impl Into<String>, error: impl Into<String>) -> Self {
        let mut message = Self::system(session_id, error);
        message.kind = MessageKind::Error;
        message
    }

    fn new(
        session_id: impl Into<String>,
        role: MessageRole,
        content: String,
        status: MessageStatus,
    ) -> Self {
        Self {
            id: new_message_id(),
            session_id: session_id.into(),
            role,
            kind: MessageKind::Text,
            content,
            status,
            timestamp: Utc::now(),
            metadata: None,
            pinned: false,
            starred: false,
        }
    }

    /// Returns the total tokens attributed to this message, zero when
    /// no usage metadata is attached
    pub fn total_tokens(&self) -> usize {
        self.metadata
            .as_ref()
            .and_then(|m| m.token_usage)
            .map(|u| u.total_tokens)
            .unwrap_or(0)
    }
}
