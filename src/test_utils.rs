//! Shared helpers for unit tests

use crate::error::{ChatStoreError, Result};
use crate::transport::{ChatRequest, ChatResponse, ChatTransport, StreamHandle};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Scripted outcome for one transport call
pub enum ScriptedReply {
    /// `request_once` succeeds with this response
    Response(ChatResponse),
    /// `open_stream` succeeds and hands out a handle
    Stream,
    /// The call fails with this message
    Failure(String),
}

/// Stream handle that records abort signals
pub struct MockStreamHandle {
    aborted: Arc<AtomicBool>,
}

impl StreamHandle for MockStreamHandle {
    fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
    }
}

/// Transport double that replays a queue of scripted replies
///
/// Each call pops the next reply; an empty queue fails the call. The
/// requests the store built are captured for assertions.
pub struct MockTransport {
    replies: Mutex<VecDeque<ScriptedReply>>,
    requests: Mutex<Vec<ChatRequest>>,
    /// Set when any handed-out stream handle is aborted
    pub aborted: Arc<AtomicBool>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            aborted: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Queue a successful non-streamed response with the given content
    pub fn push_response(&self, content: &str) {
        self.push(ScriptedReply::Response(ChatResponse {
            content: content.to_string(),
            model: Some("mock-model".to_string()),
            processing_time_ms: Some(5),
            usage: None,
            finish_reason: Some("stop".to_string()),
        }))
    }

    /// Queue a successful stream open
    pub fn push_stream(&self) {
        self.push(ScriptedReply::Stream)
    }

    /// Queue a failure
    pub fn push_failure(&self, message: &str) {
        self.push(ScriptedReply::Failure(message.to_string()))
    }

    pub fn push(&self, reply: ScriptedReply) {
        self.replies
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push_back(reply);
    }

    /// Requests captured so far, oldest first
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    pub fn was_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    fn next_reply(&self, request: ChatRequest) -> Result<ScriptedReply> {
        self.requests
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(request);
        self.replies
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .pop_front()
            .ok_or_else(|| ChatStoreError::Transport("no scripted reply queued".to_string()).into())
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatTransport for MockTransport {
    async fn request_once(&self, request: ChatRequest) -> Result<ChatResponse> {
        match self.next_reply(request)? {
            ScriptedReply::Response(response) => Ok(response),
            ScriptedReply::Stream => {
                Err(ChatStoreError::Transport("scripted stream for request_once".to_string())
                    .into())
            }
            ScriptedReply::Failure(message) => Err(ChatStoreError::Transport(message).into()),
        }
    }

    async fn open_stream(&self, request: ChatRequest) -> Result<Box<dyn StreamHandle>> {
        match self.next_reply(request)? {
            ScriptedReply::Stream => Ok(Box::new(MockStreamHandle {
                aborted: Arc::clone(&self.aborted),
            })),
            ScriptedReply::Response(_) => {
                Err(ChatStoreError::Transport("scripted response for open_stream".to_string())
                    .into())
            }
            ScriptedReply::Failure(message) => Err(ChatStoreError::Stream(message).into()),
        }
    }
}
