//! Session types for the chat store
//!
//! A session is a logical conversation thread with its own message log
//! and configuration. The `message_count` and `total_tokens` fields are
//! denormalized caches that the store resyncs from the message log after
//! every mutation.

use crate::ids::new_session_id;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Visibility status of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Session is live and shown in the main list
    Active,
    /// Session is archived but retained
    Archived,
}

/// Per-session configuration overriding store defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Model requested from the transport
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// System prompt injected at the head of every request context
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Sampling temperature forwarded to the transport
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,

    /// Override of the store-wide request context window
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_context_messages: Option<usize>,
}

/// A logical conversation thread
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Unique session identifier (ULID)
    pub id: String,
    /// User-facing title
    pub title: String,
    /// Free-form session type ("chat", "support", ...)
    pub session_type: String,
    /// Active or archived
    pub status: SessionStatus,
    /// Per-session configuration
    pub config: SessionConfig,
    /// When the session was created
    pub created_at: DateTime<Utc>,
    /// When the session was last modified
    pub updated_at: DateTime<Utc>,
    /// When a message was last appended or settled
    pub last_activity_at: DateTime<Utc>,
    /// Cached message count, always equal to the log length
    pub message_count: usize,
    /// Cached token total, always equal to the sum over the log
    pub total_tokens: usize,
    /// Pinned to the top of the session list
    pub pinned: bool,
    /// Starred by the user
    pub starred: bool,
}

impl Session {
    /// Create a new active session
    ///
    /// # Examples
    ///
    /// ```
    /// use chatstore::{Session, SessionConfig, SessionStatus};
    ///
    /// let session = Session::new("Planning", "chat", SessionConfig::default());
    /// assert_eq!(session.status, SessionStatus::Active);
    /// assert_eq!(session.message_count, 0);
    /// ```
    pub fn new(
        title: impl Into<String>,
        session_type: impl Into<String>,
        config: SessionConfig,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: new_session_id(),
            title: title.into(),
            session_type: session_type.into(),
            status: SessionStatus::Active,
            config,
            created_at: now,
            updated_at: now,
            last_activity_at: now,
            message_count: 0,
            total_tokens: 0,
            pinned: false,
            starred: false,
        }
    }

    /// Mark the session as modified right now
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Mark message activity right now
    pub fn touch_activity(&mut self) {
        let now = Utc::now();
        self.updated_at = now;
        self.last_activity_at = now;
    }
}

/// Partial update applied to a session
///
/// Fields left as `None` are unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionPatch {
    /// New title
    pub title: Option<String>,
    /// New session type
    pub session_type: Option<String>,
    /// New status (archive/unarchive)
    pub status: Option<SessionStatus>,
    /// Replacement configuration
    pub config: Option<SessionConfig>,
    /// New pinned flag
    pub pinned: Option<bool>,
    /// New starred flag
    pub starred: Option<bool>,
}

impl SessionPatch {
    /// Apply the patch to a session, refreshing `updated_at`
    pub fn apply(self, session: &mut Session) {
        if let Some(title) = self.title {
            session.title = title;
        }
        if let Some(session_type) = self.session_type {
            session.session_type = session_type;
        }
        if let Some(status) = self.status {
            session.status = status;
        }
        if let Some(config) = self.config {
            session.config = config;
        }
        if let Some(pinned) = self.pinned {
            session.pinned = pinned;
        }
        if let Some(starred) = self.starred {
            session.starred = starred;
        }
        session.touch();
    }
}
