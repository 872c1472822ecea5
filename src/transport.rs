//! Abstract transport contracts consumed by the store
//!
//! The store never talks to a network directly. Integrations implement
//! `ChatTransport` for the two exchange shapes: a one-shot request and a
//! stream opened against the source. Incremental chunks and terminal
//! events are pumped back into the store by the integration layer using
//! the ticket returned from `ChatStore::send_stream_message`.

use crate::error::Result;
use crate::message::{Message, TokenUsage};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Request payload handed to the transport
///
/// `messages` carries only the request context window (system prompt plus
/// the most recent finalized messages), not the whole stored history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Session the exchange belongs to
    pub session_id: String,
    /// Context window for the request
    pub messages: Vec<Message>,
    /// Model requested, when the session or store defaults name one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Sampling temperature, when configured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

/// Response from a non-streamed exchange
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Full assistant response text
    pub content: String,
    /// Model that produced the response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Source-reported processing time in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<u64>,
    /// Token usage for the exchange
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    /// Provider finish reason
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// Terminal payload for a successful stream
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamCompletion {
    /// Token usage for the whole stream
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    /// Model that produced the stream
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Provider finish reason
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// Handle to an open stream
///
/// `abort` signals the source to stop producing. The store finalizes its
/// local state without waiting for the source to acknowledge; any chunks
/// the source emits afterwards are discarded by the generation check.
pub trait StreamHandle: Send {
    /// Signal cooperative cancellation to the source
    fn abort(&self);
}

/// Transport implemented by network/IPC integrations outside this crate
///
/// # Examples
///
/// ```no_run
/// use chatstore::transport::{ChatTransport, ChatRequest, ChatResponse, StreamHandle};
/// use chatstore::error::Result;
/// use async_trait::async_trait;
///
/// struct MyTransport;
///
/// struct NoopHandle;
/// impl StreamHandle for NoopHandle {
///     fn abort(&self) {}
/// }
///
/// #[async_trait]
/// impl ChatTransport for MyTransport {
///     async fn request_once(&self, _request: ChatRequest) -> Result<ChatResponse> {
///         Ok(ChatResponse {
///             content: "Hello!".to_string(),
///             model: None,
///             processing_time_ms: None,
///             usage: None,
///             finish_reason: None,
///         })
///     }
///
///     async fn open_stream(&self, _request: ChatRequest) -> Result<Box<dyn StreamHandle>> {
///         Ok(Box::new(NoopHandle))
///     }
/// }
/// ```
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Perform a non-streamed exchange
    ///
    /// # Errors
    ///
    /// Returns an error when the source fails; the store converts the
    /// failure into a visible system error message.
    async fn request_once(&self, request: ChatRequest) -> Result<ChatResponse>;

    /// Open a stream against the source
    ///
    /// The returned handle must support cooperative cancellation. Chunk
    /// and terminal delivery is the integration's responsibility, via
    /// `ChatStore::stream_chunk` / `stream_complete` / `stream_error`.
    ///
    /// # Errors
    ///
    /// Returns an error when stream setup fails.
    async fn open_stream(&self, request: ChatRequest) -> Result<Box<dyn StreamHandle>>;
}
