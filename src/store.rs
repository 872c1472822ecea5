//! The chat store facade
//!
//! `ChatStore` owns the session repository, message log, stream
//! controller, template registry, and event bus, and wires them into the
//! operations UI layers call. All state lives in this one value; it is
//! created once at startup and passed by `&mut`; there are no ambient
//! globals.
//!
//! Mutation happens on the caller's task. The async methods suspend only
//! while the transport sets up an exchange; every observable state change
//! is applied synchronously before or after that await.

use crate::config::StoreConfig;
use crate::error::{ChatStoreError, Result};
use crate::events::{EventBus, Listener, ListenerId, StoreEvent};
use crate::export::{self, ExportFormat};
use crate::log::MessageLog;
use crate::message::{Message, MessageMetadata, MessageStatus};
use crate::search::{self, SearchOptions, SearchResult};
use crate::session::{Session, SessionConfig, SessionPatch};
use crate::stats::{self, GlobalStats, SessionStats};
use crate::storage::SqliteStorage;
use crate::stream::{StreamController, StreamTicket};
use crate::templates::{SessionTemplate, TemplateRegistry};
use crate::transport::{ChatRequest, ChatTransport, StreamCompletion};
use chrono::Utc;
use std::sync::Arc;

/// Partial update applied to a message
///
/// Fields left as `None` are unchanged.
#[derive(Debug, Clone, Default)]
pub struct MessagePatch {
    /// Replacement content
    pub content: Option<String>,
    /// New pinned flag
    pub pinned: Option<bool>,
    /// New starred flag
    pub starred: Option<bool>,
}

/// Outcome of a batch delete, with per-item isolation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchDeleteResult {
    /// Ids that were deleted
    pub success_ids: Vec<String>,
    /// Ids that could not be deleted
    pub failure_ids: Vec<String>,
    /// One error description per failure, index-aligned with `failure_ids`
    pub errors: Vec<String>,
}

/// Conversational session manager
///
/// # Examples
///
/// ```no_run
/// use chatstore::{ChatStore, StoreConfig};
/// use std::sync::Arc;
/// # use chatstore::transport::{ChatTransport, ChatRequest, ChatResponse, StreamHandle};
/// # use async_trait::async_trait;
/// # struct MyTransport;
/// # #[async_trait]
/// # impl ChatTransport for MyTransport {
/// #     async fn request_once(&self, _r: ChatRequest) -> chatstore::error::Result<ChatResponse> { unimplemented!() }
/// #     async fn open_stream(&self, _r: ChatRequest) -> chatstore::error::Result<Box<dyn StreamHandle>> { unimplemented!() }
/// # }
///
/// # tokio_test::block_on(async {
/// let mut store = ChatStore::new(StoreConfig::default(), Arc::new(MyTransport)).unwrap();
/// let session_id = store.create_session(Some("Planning"), None, None);
/// let ticket = store.send_stream_message(&session_id, "Hello").await.unwrap();
/// store.stream_chunk(&ticket, "Hi");
/// # });
/// ```
pub struct ChatStore {
    config: StoreConfig,
    transport: Arc<dyn ChatTransport>,
    sessions: Vec<Session>,
    log: MessageLog,
    streams: StreamController,
    templates: TemplateRegistry,
    events: EventBus,
    current_session_id: Option<String>,
}

impl std::fmt::Debug for ChatStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatStore")
            .field("sessions", &self.sessions.len())
            .field("streams", &self.streams)
            .field("current_session_id", &self.current_session_id)
            .finish()
    }
}

impl ChatStore {
    /// Create an empty store with the given configuration and transport
    ///
    /// # Errors
    ///
    /// Returns `ChatStoreError::Config` when the configuration is invalid.
    pub fn new(config: StoreConfig, transport: Arc<dyn ChatTransport>) -> Result<Self> {
        config.validate()?;
        let max_per_session = config.limits.max_messages_per_session;
        Ok(Self {
            config,
            transport,
            sessions: Vec::new(),
            log: MessageLog::new(max_per_session),
            streams: StreamController::new(),
            templates: TemplateRegistry::new(),
            events: EventBus::new(),
            current_session_id: None,
        })
    }

    /// Rebuild a store from a persisted snapshot
    ///
    /// Stream controller state is never persisted, so a restored store
    /// always comes back with every stream idle. The stored configuration
    /// is used when present, otherwise defaults.
    pub fn restore(storage: &SqliteStorage, transport: Arc<dyn ChatTransport>) -> Result<Self> {
        let config = storage.load_config()?.unwrap_or_default();
        let mut store = Self::new(config, transport)?;

        for (session, messages) in storage.load_sessions()? {
            store.log.create_session(&session.id);
            for message in messages {
                store.log.append(message)?;
            }
            store.sessions.push(session);
        }
        for template in storage.load_templates()? {
            store.templates.upsert(template);
        }

        store.current_session_id = store.sessions.first().map(|s| s.id.clone());
        tracing::info!(sessions = store.sessions.len(), "store restored from snapshot");
        Ok(store)
    }

    /// Write the full store state to the snapshot storage
    ///
    /// Sessions, message logs, templates, and configuration are written;
    /// live stream state is deliberately excluded.
    pub fn persist(&self, storage: &SqliteStorage) -> Result<()> {
        storage.clear()?;
        for session in &self.sessions {
            storage.save_session(session, &self.log.messages(&session.id))?;
        }
        for template in self.templates.list() {
            storage.save_template(&template)?;
        }
        storage.save_config(&self.config)?;
        Ok(())
    }

    /// Store configuration in effect
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    // ---- event bus ----

    /// Register an event listener
    pub fn add_listener(&mut self, listener: Listener) -> ListenerId {
        self.events.add_listener(listener)
    }

    /// Remove an event listener; returns true when one was removed
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.events.remove_listener(id)
    }

    // ---- session repository ----

    /// Create a session, making it current, and return its id
    pub fn create_session(
        &mut self,
        title: Option<&str>,
        session_type: Option<&str>,
        config: Option<SessionConfig>,
    ) -> String {
        let session = Session::new(
            title.unwrap_or(&self.config.defaults.session_title),
            session_type.unwrap_or(&self.config.defaults.session_type),
            config.unwrap_or_default(),
        );
        let id = session.id.clone();

        self.log.create_session(&id);
        self.sessions.push(session);
        self.current_session_id = Some(id.clone());

        tracing::debug!(session_id = %id, "session created");
        self.events.emit(&StoreEvent::SessionCreated {
            session_id: id.clone(),
        });
        id
    }

    /// Snapshot of one session
    pub fn session(&self, session_id: &str) -> Option<Session> {
        self.sessions.iter().find(|s| s.id == session_id).cloned()
    }

    /// Snapshot of all sessions in creation order
    pub fn sessions(&self) -> Vec<Session> {
        self.sessions.clone()
    }

    /// Id of the current session, if any
    pub fn current_session_id(&self) -> Option<&str> {
        self.current_session_id.as_deref()
    }

    /// Apply a partial update to a session
    pub fn update_session(&mut self, session_id: &str, patch: SessionPatch) -> Result<()> {
        let Some(session) = self.sessions.iter_mut().find(|s| s.id == session_id) else {
            return Err(self.fail(
                "update_session",
                ChatStoreError::SessionNotFound(session_id.to_string()),
            ));
        };
        patch.apply(session);
        self.events.emit(&StoreEvent::SessionUpdated {
            session_id: session_id.to_string(),
        });
        Ok(())
    }

    /// Rename a session
    pub fn rename_session(&mut self, session_id: &str, title: impl Into<String>) -> Result<()> {
        self.update_session(
            session_id,
            SessionPatch {
                title: Some(title.into()),
                ..Default::default()
            },
        )
    }

    /// Flip a session's pinned flag, returning the new value
    pub fn toggle_pin(&mut self, session_id: &str) -> Result<bool> {
        let Some(session) = self.sessions.iter_mut().find(|s| s.id == session_id) else {
            return Err(self.fail(
                "toggle_pin",
                ChatStoreError::SessionNotFound(session_id.to_string()),
            ));
        };
        session.pinned = !session.pinned;
        session.touch();
        let pinned = session.pinned;
        self.events.emit(&StoreEvent::SessionUpdated {
            session_id: session_id.to_string(),
        });
        Ok(pinned)
    }

    /// Flip a session's starred flag, returning the new value
    pub fn toggle_star(&mut self, session_id: &str) -> Result<bool> {
        let Some(session) = self.sessions.iter_mut().find(|s| s.id == session_id) else {
            return Err(self.fail(
                "toggle_star",
                ChatStoreError::SessionNotFound(session_id.to_string()),
            ));
        };
        session.starred = !session.starred;
        session.touch();
        let starred = session.starred;
        self.events.emit(&StoreEvent::SessionUpdated {
            session_id: session_id.to_string(),
        });
        Ok(starred)
    }

    /// Make another session current
    ///
    /// Fails without changing anything (and broadcasts an `Error` event)
    /// when the id is unknown.
    pub fn switch_session(&mut self, session_id: &str) -> Result<()> {
        if !self.sessions.iter().any(|s| s.id == session_id) {
            return Err(self.fail(
                "switch_session",
                ChatStoreError::SessionNotFound(session_id.to_string()),
            ));
        }
        self.current_session_id = Some(session_id.to_string());
        self.events.emit(&StoreEvent::SessionUpdated {
            session_id: session_id.to_string(),
        });
        Ok(())
    }

    /// Delete a session, cascading to its messages and any active stream
    ///
    /// The stream is aborted synchronously before the log is removed so a
    /// late callback can never write into a deleted session. The current
    /// session is reassigned to another existing session, or cleared.
    pub fn delete_session(&mut self, session_id: &str) -> Result<()> {
        let Some(index) = self.sessions.iter().position(|s| s.id == session_id) else {
            return Err(self.fail(
                "delete_session",
                ChatStoreError::SessionNotFound(session_id.to_string()),
            ));
        };

        if let Some(finished) = self.streams.abort(session_id) {
            tracing::debug!(
                session_id,
                message_id = %finished.message_id,
                "aborted active stream during session delete"
            );
        }

        self.log.remove_session(session_id);
        self.sessions.remove(index);

        if self.current_session_id.as_deref() == Some(session_id) {
            self.current_session_id = self.sessions.first().map(|s| s.id.clone());
        }

        self.events.emit(&StoreEvent::SessionDeleted {
            session_id: session_id.to_string(),
        });
        Ok(())
    }

    /// Deep-copy a session, returning the new id
    ///
    /// Message content is copied verbatim; ids and timestamps are fresh,
    /// so deleting the clone never affects the original.
    pub fn clone_session(&mut self, session_id: &str) -> Result<String> {
        let Some(source) = self.sessions.iter().find(|s| s.id == session_id).cloned() else {
            return Err(self.fail(
                "clone_session",
                ChatStoreError::SessionNotFound(session_id.to_string()),
            ));
        };

        let clone = Session::new(
            format!("{} (copy)", source.title),
            source.session_type.clone(),
            source.config.clone(),
        );
        let clone_id = clone.id.clone();

        self.log.create_session(&clone_id);
        self.sessions.push(clone);

        for source_message in self.log.messages(session_id) {
            let mut copied =
                Message::received(&clone_id, source_message.role, source_message.content);
            copied.kind = source_message.kind;
            copied.status = source_message.status;
            copied.metadata = source_message.metadata;
            copied.pinned = source_message.pinned;
            copied.starred = source_message.starred;
            self.log.append(copied)?;
        }
        self.sync_session(&clone_id);

        self.events.emit(&StoreEvent::SessionCreated {
            session_id: clone_id.clone(),
        });
        Ok(clone_id)
    }

    /// Delete several sessions, isolating per-item failures
    pub fn batch_delete_sessions(&mut self, session_ids: &[String]) -> BatchDeleteResult {
        let mut result = BatchDeleteResult::default();
        for id in session_ids {
            match self.delete_session(id) {
                Ok(()) => result.success_ids.push(id.clone()),
                Err(e) => {
                    result.failure_ids.push(id.clone());
                    result.errors.push(e.to_string());
                }
            }
        }
        result
    }

    // ---- message log ----

    /// Snapshot of a session's messages
    pub fn messages(&self, session_id: &str) -> Vec<Message> {
        self.log.messages(session_id)
    }

    /// Snapshot of one message
    pub fn message(&self, session_id: &str, message_id: &str) -> Option<Message> {
        self.log.message(session_id, message_id)
    }

    /// Apply a partial update to a message
    ///
    /// A `content` patch is held to the same validation as sent content.
    pub fn update_message(
        &mut self,
        session_id: &str,
        message_id: &str,
        patch: MessagePatch,
    ) -> Result<()> {
        if let Some(content) = &patch.content {
            if let Err(e) = self.validate_content(content) {
                return Err(self.fail("update_message", e));
            }
        }
        let outcome = self.log.update(session_id, message_id, |message| {
            if let Some(content) = patch.content {
                message.content = content;
            }
            if let Some(pinned) = patch.pinned {
                message.pinned = pinned;
            }
            if let Some(starred) = patch.starred {
                message.starred = starred;
            }
        });
        if let Err(e) = outcome {
            self.emit_error("update_message", &e);
            return Err(e);
        }

        self.sync_session(session_id);
        self.events.emit(&StoreEvent::MessageUpdated {
            session_id: session_id.to_string(),
            message_id: message_id.to_string(),
        });
        Ok(())
    }

    /// Delete a single message from a session
    ///
    /// Deleting the placeholder of a live stream aborts that stream first,
    /// so the controller never points at a message that no longer exists.
    pub fn delete_message(&mut self, session_id: &str, message_id: &str) -> Result<()> {
        if self.streams.active_message_id(session_id) == Some(message_id) {
            self.streams.abort(session_id);
        }
        if let Err(e) = self.log.delete(session_id, message_id) {
            self.emit_error("delete_message", &e);
            return Err(e);
        }

        self.sync_session(session_id);
        self.events.emit(&StoreEvent::MessageDeleted {
            session_id: session_id.to_string(),
            message_id: message_id.to_string(),
        });
        Ok(())
    }

    /// Delete several messages from a session, isolating per-item failures
    pub fn batch_delete_messages(
        &mut self,
        session_id: &str,
        message_ids: &[String],
    ) -> BatchDeleteResult {
        let mut result = BatchDeleteResult::default();
        for id in message_ids {
            match self.delete_message(session_id, id) {
                Ok(()) => result.success_ids.push(id.clone()),
                Err(e) => {
                    result.failure_ids.push(id.clone());
                    result.errors.push(e.to_string());
                }
            }
        }
        result
    }

    /// Remove every message from a session
    ///
    /// Any active stream is aborted first so the controller never points
    /// at a message that no longer exists.
    pub fn clear_messages(&mut self, session_id: &str) -> Result<()> {
        if !self.log.contains_session(session_id) {
            return Err(self.fail(
                "clear_messages",
                ChatStoreError::SessionNotFound(session_id.to_string()),
            ));
        }

        self.streams.abort(session_id);
        self.log.clear(session_id)?;
        self.sync_session(session_id);
        self.events.emit(&StoreEvent::SessionUpdated {
            session_id: session_id.to_string(),
        });
        Ok(())
    }

    // ---- exchanges ----

    /// Perform a non-streamed exchange
    ///
    /// Appends the user message, invokes the transport, and appends the
    /// assistant response with its metadata. On transport failure the user
    /// message stays in the log marked `Failed`, a system error message is
    /// appended instead of the response, and the error propagates.
    ///
    /// Returns the assistant message id.
    pub async fn send_message(&mut self, session_id: &str, content: &str) -> Result<String> {
        if let Err(e) = self.validate_content(content) {
            return Err(self.fail("send_message", e));
        }
        if !self.log.contains_session(session_id) {
            return Err(self.fail(
                "send_message",
                ChatStoreError::SessionNotFound(session_id.to_string()),
            ));
        }

        let user_id = self.append_message(Message::user(session_id, content))?;
        self.events.emit(&StoreEvent::MessageSent {
            session_id: session_id.to_string(),
            message_id: user_id.clone(),
        });

        let request = self.build_request(session_id);
        let transport = Arc::clone(&self.transport);
        let started = std::time::Instant::now();

        match transport.request_once(request).await {
            Ok(response) => {
                let mut assistant = Message::assistant(session_id, response.content);
                assistant.metadata = Some(MessageMetadata {
                    processing_time_ms: response
                        .processing_time_ms
                        .or(Some(started.elapsed().as_millis() as u64)),
                    token_usage: response.usage,
                    model: response.model,
                    finish_reason: response.finish_reason,
                });
                let assistant_id = self.append_message(assistant)?;
                self.events.emit(&StoreEvent::MessageSent {
                    session_id: session_id.to_string(),
                    message_id: assistant_id.clone(),
                });
                Ok(assistant_id)
            }
            Err(e) => {
                self.log.update(session_id, &user_id, |m| {
                    m.status = MessageStatus::Failed;
                })?;
                self.events.emit(&StoreEvent::MessageUpdated {
                    session_id: session_id.to_string(),
                    message_id: user_id,
                });
                self.append_message(Message::system_error(session_id, e.to_string()))?;
                Err(self.fail(
                    "send_message",
                    ChatStoreError::Transport(e.to_string()),
                ))
            }
        }
    }

    /// Start a streamed exchange
    ///
    /// Appends the user message and an empty `Receiving` placeholder,
    /// opens the stream against the transport, and registers the single
    /// live stream slot for the session. The returned ticket carries the
    /// placeholder message id, valid immediately even though no content
    /// has arrived yet.
    ///
    /// # Errors
    ///
    /// Fails before any mutation on invalid content, an unknown session,
    /// or an already-active stream. When stream setup itself fails, the
    /// placeholder is removed and replaced by a system error message.
    pub async fn send_stream_message(
        &mut self,
        session_id: &str,
        content: &str,
    ) -> Result<StreamTicket> {
        if let Err(e) = self.validate_content(content) {
            return Err(self.fail("send_stream_message", e));
        }
        if !self.log.contains_session(session_id) {
            return Err(self.fail(
                "send_stream_message",
                ChatStoreError::SessionNotFound(session_id.to_string()),
            ));
        }
        if self.streams.is_active(session_id) {
            return Err(self.fail(
                "send_stream_message",
                ChatStoreError::StreamActive(session_id.to_string()),
            ));
        }

        let user_id = self.append_message(Message::user(session_id, content))?;
        self.events.emit(&StoreEvent::MessageSent {
            session_id: session_id.to_string(),
            message_id: user_id,
        });

        let placeholder_id = self.append_message(Message::receiving_placeholder(session_id))?;
        self.events.emit(&StoreEvent::MessageSent {
            session_id: session_id.to_string(),
            message_id: placeholder_id.clone(),
        });

        let request = self.build_request(session_id);
        let transport = Arc::clone(&self.transport);

        match transport.open_stream(request).await {
            Ok(handle) => {
                let ticket = self.streams.begin(session_id, &placeholder_id, handle)?;
                Ok(ticket)
            }
            Err(e) => {
                // Setup failed before any chunk; the placeholder is not
                // user-visible on failure.
                self.log.delete(session_id, &placeholder_id)?;
                self.append_message(Message::system_error(session_id, e.to_string()))?;
                self.events.emit(&StoreEvent::StreamError {
                    session_id: session_id.to_string(),
                    error: e.to_string(),
                });
                Err(self.fail(
                    "send_stream_message",
                    ChatStoreError::Stream(e.to_string()),
                ))
            }
        }
    }

    /// Apply an incremental chunk to a live stream
    ///
    /// Returns false for stale tickets (aborted, completed, or superseded
    /// streams); stale chunks mutate nothing.
    pub fn stream_chunk(&mut self, ticket: &StreamTicket, delta: &str) -> bool {
        let Some(outcome) = self.streams.apply_chunk(ticket, delta) else {
            return false;
        };

        let accumulated = outcome.accumulated.clone();
        if let Err(e) = self.log.update(&ticket.session_id, &outcome.message_id, |m| {
            m.content = accumulated;
        }) {
            tracing::warn!(error = %e, "placeholder missing while applying chunk");
            return false;
        }

        if outcome.first_chunk {
            self.events.emit(&StoreEvent::StreamStart {
                session_id: ticket.session_id.clone(),
                message_id: outcome.message_id.clone(),
            });
        }
        self.events.emit(&StoreEvent::StreamChunk {
            session_id: ticket.session_id.clone(),
            message_id: outcome.message_id,
            delta: delta.to_string(),
        });
        true
    }

    /// Settle a live stream after the source reports success
    ///
    /// The placeholder becomes `Received` with completion metadata
    /// attached, and the session's token counter picks up the reported
    /// usage. Returns false for stale tickets.
    pub fn stream_complete(&mut self, ticket: &StreamTicket, completion: StreamCompletion) -> bool {
        let Some(finished) = self.streams.complete(ticket) else {
            return false;
        };

        let metadata = MessageMetadata {
            processing_time_ms: Some(finished.elapsed_ms),
            token_usage: completion.usage,
            model: completion.model,
            finish_reason: completion.finish_reason,
        };
        let accumulated = finished.accumulated;
        if let Err(e) = self.log.update(&ticket.session_id, &finished.message_id, |m| {
            m.content = accumulated;
            m.status = MessageStatus::Received;
            m.metadata = Some(metadata);
        }) {
            tracing::warn!(error = %e, "placeholder missing while completing stream");
            return false;
        }

        self.sync_session(&ticket.session_id);
        self.events.emit(&StoreEvent::MessageUpdated {
            session_id: ticket.session_id.clone(),
            message_id: finished.message_id.clone(),
        });
        self.events.emit(&StoreEvent::StreamComplete {
            session_id: ticket.session_id.clone(),
            message_id: finished.message_id,
        });
        true
    }

    /// Settle a live stream after the source reports failure
    ///
    /// The placeholder is deleted entirely, since it is not user-visible on
    /// failure, and exactly one system error message is appended.
    /// Returns false for stale tickets.
    pub fn stream_error(&mut self, ticket: &StreamTicket, error: &str) -> bool {
        let Some(finished) = self.streams.fail(ticket) else {
            return false;
        };

        if let Err(e) = self.log.delete(&ticket.session_id, &finished.message_id) {
            tracing::warn!(error = %e, "placeholder missing while failing stream");
        }
        if let Err(e) = self.append_message(Message::system_error(&ticket.session_id, error)) {
            tracing::warn!(error = %e, "could not append stream error message");
        }

        self.sync_session(&ticket.session_id);
        self.events.emit(&StoreEvent::StreamError {
            session_id: ticket.session_id.clone(),
            error: error.to_string(),
        });
        true
    }

    /// Cancel the active stream for a session, if any
    ///
    /// Signals the handle, marks the placeholder `Cancelled` with the
    /// accumulated partial content preserved, and clears the slot without
    /// waiting for the source. Returns the cancelled message id, or
    /// `None` when no stream was active.
    pub fn stop_streaming(&mut self, session_id: &str) -> Option<String> {
        let finished = self.streams.abort(session_id)?;

        let accumulated = finished.accumulated;
        if let Err(e) = self.log.update(session_id, &finished.message_id, |m| {
            m.content = accumulated;
            m.status = MessageStatus::Cancelled;
        }) {
            tracing::warn!(error = %e, "placeholder missing while cancelling stream");
        }

        self.sync_session(session_id);
        self.events.emit(&StoreEvent::MessageUpdated {
            session_id: session_id.to_string(),
            message_id: finished.message_id.clone(),
        });
        self.events.emit(&StoreEvent::StreamCancelled {
            session_id: session_id.to_string(),
            message_id: finished.message_id.clone(),
        });
        Some(finished.message_id)
    }

    /// True when the session has a live stream
    pub fn is_streaming(&self, session_id: &str) -> bool {
        self.streams.is_active(session_id)
    }

    // ---- statistics ----

    /// Derived aggregates for one session
    pub fn session_stats(&mut self, session_id: &str) -> Result<SessionStats> {
        if !self.log.contains_session(session_id) {
            return Err(self.fail(
                "session_stats",
                ChatStoreError::SessionNotFound(session_id.to_string()),
            ));
        }
        Ok(stats::compute_session_stats(&self.log.messages(session_id)))
    }

    /// Derived aggregates across the whole store, windows relative to now
    pub fn global_stats(&self) -> GlobalStats {
        stats::compute_global_stats(&self.sessions, &self.log, Utc::now())
    }

    // ---- search ----

    /// Search one session's messages
    pub fn search_session(
        &mut self,
        session_id: &str,
        keyword: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>> {
        if !self.log.contains_session(session_id) {
            return Err(self.fail(
                "search_session",
                ChatStoreError::SessionNotFound(session_id.to_string()),
            ));
        }
        Ok(search::search_messages(
            &self.log.messages(session_id),
            keyword,
            options,
        ))
    }

    /// Search every session's messages, truncated to `limit` hits
    pub fn search_all(
        &self,
        keyword: &str,
        options: &SearchOptions,
        limit: usize,
    ) -> Vec<SearchResult> {
        search::global_search(&self.log, keyword, options, limit)
    }

    // ---- templates ----

    /// Insert or replace a template, returning its id
    pub fn add_template(&mut self, template: SessionTemplate) -> String {
        self.templates.upsert(template)
    }

    /// Look up a template
    pub fn template(&self, template_id: &str) -> Option<SessionTemplate> {
        self.templates.get(template_id).cloned()
    }

    /// Snapshot of all templates
    pub fn templates(&self) -> Vec<SessionTemplate> {
        self.templates.list()
    }

    /// Remove a template
    pub fn remove_template(&mut self, template_id: &str) -> Result<()> {
        if self.templates.remove(template_id).is_none() {
            return Err(self.fail(
                "remove_template",
                ChatStoreError::Template(template_id.to_string()),
            ));
        }
        Ok(())
    }

    /// Create a session from a template, returning the new session id
    ///
    /// The template's config (with its system prompt folded in) and type
    /// are applied, and its initial messages are seeded verbatim as
    /// already received.
    pub fn create_from_template(&mut self, template_id: &str) -> Result<String> {
        let Some(template) = self.templates.get(template_id).cloned() else {
            return Err(self.fail(
                "create_from_template",
                ChatStoreError::Template(template_id.to_string()),
            ));
        };

        let session_id = self.create_session(
            Some(&template.name),
            Some(&template.session_type),
            Some(template.instantiate_config()),
        );

        for seed in &template.initial_messages {
            let message_id =
                self.append_message(Message::received(&session_id, seed.role, &seed.content))?;
            self.events.emit(&StoreEvent::MessageSent {
                session_id: session_id.clone(),
                message_id,
            });
        }

        Ok(session_id)
    }

    // ---- export / import ----

    /// Serialize a session in the requested format
    pub fn export_session(&mut self, session_id: &str, format: ExportFormat) -> Result<String> {
        let Some(session) = self.session(session_id) else {
            return Err(self.fail(
                "export_session",
                ChatStoreError::SessionNotFound(session_id.to_string()),
            ));
        };
        export::export_session(&session, &self.log.messages(session_id), format)
    }

    /// Import a session from a JSON export, returning its fresh id
    ///
    /// All ids are regenerated; content and timestamps are preserved.
    pub fn import_session(&mut self, json: &str) -> Result<String> {
        let (session, messages) = match export::import_session_json(json) {
            Ok(parsed) => parsed,
            Err(e) => {
                self.emit_error("import_session", &e);
                return Err(e);
            }
        };

        let session_id = session.id.clone();
        self.log.create_session(&session_id);
        self.sessions.push(session);
        for message in messages {
            self.log.append(message)?;
        }
        self.sync_session(&session_id);

        self.events.emit(&StoreEvent::SessionCreated {
            session_id: session_id.clone(),
        });
        Ok(session_id)
    }

    // ---- internals ----

    /// Append a message and resync the owning session's counters
    fn append_message(&mut self, message: Message) -> Result<String> {
        let session_id = message.session_id.clone();
        let id = self.log.append(message)?;
        self.sync_session(&session_id);
        Ok(id)
    }

    /// Resync a session's denormalized counters from its log
    ///
    /// Keeps the invariant that `message_count` and `total_tokens` always
    /// equal the values derived from the message log.
    fn sync_session(&mut self, session_id: &str) {
        let (count, tokens) = self.log.derived_counters(session_id);
        if let Some(session) = self.sessions.iter_mut().find(|s| s.id == session_id) {
            session.message_count = count;
            session.total_tokens = tokens;
            session.touch_activity();
        }
    }

    fn validate_content(&self, content: &str) -> std::result::Result<(), ChatStoreError> {
        if content.trim().is_empty() {
            return Err(ChatStoreError::Validation("message content is empty".to_string()));
        }
        let length = content.chars().count();
        if length > self.config.limits.max_content_length {
            return Err(ChatStoreError::Validation(format!(
                "message content exceeds {} characters (got {})",
                self.config.limits.max_content_length, length
            )));
        }
        Ok(())
    }

    /// Build the transport request context for a session
    ///
    /// The context carries the session's system prompt (when set) plus
    /// the most recent finalized messages up to the configured window.
    /// Stored history is never truncated by this; only the request is.
    fn build_request(&self, session_id: &str) -> ChatRequest {
        let session = self.sessions.iter().find(|s| s.id == session_id);
        let config = session.map(|s| s.config.clone()).unwrap_or_default();

        let window = config
            .max_context_messages
            .unwrap_or(self.config.limits.max_context_messages);

        let mut context: Vec<Message> = Vec::new();
        if let Some(prompt) = &config.system_prompt {
            context.push(Message::system(session_id, prompt));
        }

        let finalized: Vec<Message> = self
            .log
            .messages(session_id)
            .into_iter()
            .filter(|m| m.status.is_finalized())
            .collect();
        let skip = finalized.len().saturating_sub(window);
        context.extend(finalized.into_iter().skip(skip));

        ChatRequest {
            session_id: session_id.to_string(),
            messages: context,
            model: config.model.or_else(|| self.config.defaults.model.clone()),
            temperature: config.temperature,
        }
    }

    fn emit_error(&mut self, context: &str, error: &dyn std::fmt::Display) {
        self.events.emit(&StoreEvent::Error {
            context: context.to_string(),
            error: error.to_string(),
        });
    }

    /// Broadcast an error event and convert the error for propagation
    fn fail(&mut self, context: &str, error: ChatStoreError) -> anyhow::Error {
        self.emit_error(context, &error);
        error.into()
    }
}
