//! Single-slot stream controller
//!
//! At most one stream is live per session. Every live stream carries a
//! generation number captured in the `StreamTicket` handed back to the
//! caller; chunk and terminal callbacks must present a ticket whose
//! generation matches the live entry, so callbacks from an aborted or
//! superseded stream are provably inert even when a new stream for the
//! same session is already active.

use crate::error::{ChatStoreError, Result};
use crate::transport::StreamHandle;
use std::collections::HashMap;
use std::time::Instant;

/// Ticket identifying one specific stream attempt
///
/// Returned by `ChatStore::send_stream_message`; the integration layer
/// presents it with every chunk and terminal callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamTicket {
    /// Session the stream belongs to
    pub session_id: String,
    /// Placeholder assistant message bound to the stream
    pub message_id: String,
    /// Generation captured at start; stale callbacks fail this check
    pub generation: u64,
}

/// Live stream bookkeeping, one entry per streaming session
struct ActiveStream {
    message_id: String,
    generation: u64,
    accumulated: String,
    started_at: Instant,
    first_chunk_seen: bool,
    handle: Box<dyn StreamHandle>,
}

/// Result of applying a chunk to a live stream
#[derive(Debug, Clone)]
pub struct ChunkOutcome {
    /// Placeholder message id
    pub message_id: String,
    /// Full accumulated text including this chunk
    pub accumulated: String,
    /// True when this was the first chunk of the stream
    pub first_chunk: bool,
}

/// Snapshot handed back when a stream leaves the controller
#[derive(Debug, Clone)]
pub struct FinishedStream {
    /// Placeholder message id
    pub message_id: String,
    /// Accumulated text at the moment the stream ended
    pub accumulated: String,
    /// Wall-clock time since `begin`, in milliseconds
    pub elapsed_ms: u64,
}

/// Owns every live stream in the store
#[derive(Default)]
pub struct StreamController {
    active: HashMap<String, ActiveStream>,
    next_generation: u64,
}

impl std::fmt::Debug for StreamController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamController")
            .field("active_sessions", &self.active.len())
            .finish()
    }
}

impl StreamController {
    /// Create an empty controller
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new stream for a session
    ///
    /// # Errors
    ///
    /// Returns `ChatStoreError::StreamActive` when the session already has
    /// a live entry; the caller must stop the previous stream first.
    pub fn begin(
        &mut self,
        session_id: &str,
        message_id: &str,
        handle: Box<dyn StreamHandle>,
    ) -> Result<StreamTicket> {
        if self.active.contains_key(session_id) {
            return Err(ChatStoreError::StreamActive(session_id.to_string()).into());
        }

        self.next_generation += 1;
        let generation = self.next_generation;

        self.active.insert(
            session_id.to_string(),
            ActiveStream {
                message_id: message_id.to_string(),
                generation,
                accumulated: String::new(),
                started_at: Instant::now(),
                first_chunk_seen: false,
                handle,
            },
        );

        tracing::debug!(session_id, message_id, generation, "stream started");

        Ok(StreamTicket {
            session_id: session_id.to_string(),
            message_id: message_id.to_string(),
            generation,
        })
    }

    /// True when the session has a live stream
    pub fn is_active(&self, session_id: &str) -> bool {
        self.active.contains_key(session_id)
    }

    /// Placeholder message id of the session's live stream, if any
    pub fn active_message_id(&self, session_id: &str) -> Option<&str> {
        self.active.get(session_id).map(|e| e.message_id.as_str())
    }

    /// Number of live streams across all sessions
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Append a chunk to the live stream named by the ticket
    ///
    /// Returns `None` when the ticket is stale (stream aborted, completed,
    /// or superseded); stale chunks must not mutate anything.
    pub fn apply_chunk(&mut self, ticket: &StreamTicket, delta: &str) -> Option<ChunkOutcome> {
        let entry = self.live_entry_mut(ticket)?;

        let first_chunk = !entry.first_chunk_seen;
        entry.first_chunk_seen = true;
        entry.accumulated.push_str(delta);

        Some(ChunkOutcome {
            message_id: entry.message_id.clone(),
            accumulated: entry.accumulated.clone(),
            first_chunk,
        })
    }

    /// Remove the live stream named by the ticket after a successful end
    ///
    /// Returns `None` for a stale ticket.
    pub fn complete(&mut self, ticket: &StreamTicket) -> Option<FinishedStream> {
        self.take_live(ticket)
    }

    /// Remove the live stream named by the ticket after a source failure
    ///
    /// Returns `None` for a stale ticket.
    pub fn fail(&mut self, ticket: &StreamTicket) -> Option<FinishedStream> {
        self.take_live(ticket)
    }

    /// Abort the live stream for a session, if any
    ///
    /// Signals the handle and removes the entry immediately; the source's
    /// acknowledgment is not awaited. Returns `None` when the session has
    /// no live stream.
    pub fn abort(&mut self, session_id: &str) -> Option<FinishedStream> {
        let entry = self.active.remove(session_id)?;
        entry.handle.abort();

        tracing::debug!(
            session_id,
            message_id = %entry.message_id,
            "stream aborted"
        );

        Some(FinishedStream {
            message_id: entry.message_id,
            accumulated: entry.accumulated,
            elapsed_ms: entry.started_at.elapsed().as_millis() as u64,
        })
    }

    fn live_entry_mut(&mut self, ticket: &StreamTicket) -> Option<&mut ActiveStream> {
        let entry = self.active.get_mut(&ticket.session_id)?;
        if entry.generation != ticket.generation {
            tracing::debug!(
                session_id = %ticket.session_id,
                stale_generation = ticket.generation,
                live_generation = entry.generation,
                "discarding stale stream callback"
            );
            return None;
        }
        Some(entry)
    }

    fn take_live(&mut self, ticket: &StreamTicket) -> Option<FinishedStream> {
        // Peek first so a stale ticket never evicts a newer stream.
        self.live_entry_mut(ticket)?;
        let entry = self.active.remove(&ticket.session_id)?;

        Some(FinishedStream {
            message_id: entry.message_id,
            accumulated: entry.accumulated,
            elapsed_ms: entry.started_at.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    struct NoopHandle;

    impl StreamHandle for NoopHandle {
        fn abort(&self) {}
    }

    struct FlagHandle(Arc<AtomicBool>);

    impl StreamHandle for FlagHandle {
        fn abort(&self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_begin_and_chunk_accumulation() {
        let mut controller = StreamController::new();
        let ticket = controller.begin("s1", "m1", Box::new(NoopHandle)).unwrap();

        let first = controller.apply_chunk(&ticket, "Hi").unwrap();
        assert!(first.first_chunk);
        assert_eq!(first.accumulated, "Hi");

        let second = controller.apply_chunk(&ticket, " there").unwrap();
        assert!(!second.first_chunk);
        assert_eq!(second.accumulated, "Hi there");
        assert_eq!(second.message_id, "m1");
    }

    #[test]
    fn test_second_begin_for_same_session_fails() {
        let mut controller = StreamController::new();
        controller.begin("s1", "m1", Box::new(NoopHandle)).unwrap();

        let result = controller.begin("s1", "m2", Box::new(NoopHandle));
        assert!(result.is_err());
        assert_eq!(controller.active_count(), 1);
    }

    #[test]
    fn test_complete_clears_entry() {
        let mut controller = StreamController::new();
        let ticket = controller.begin("s1", "m1", Box::new(NoopHandle)).unwrap();
        controller.apply_chunk(&ticket, "done");

        let finished = controller.complete(&ticket).unwrap();
        assert_eq!(finished.accumulated, "done");
        assert!(!controller.is_active("s1"));
    }

    #[test]
    fn test_abort_signals_handle_and_preserves_partial_text() {
        let aborted = Arc::new(AtomicBool::new(false));
        let mut controller = StreamController::new();
        let ticket = controller
            .begin("s1", "m1", Box::new(FlagHandle(aborted.clone())))
            .unwrap();
        controller.apply_chunk(&ticket, "partial");

        let finished = controller.abort("s1").unwrap();
        assert!(aborted.load(Ordering::SeqCst));
        assert_eq!(finished.accumulated, "partial");
        assert!(!controller.is_active("s1"));
    }

    #[test]
    fn test_abort_without_stream_is_noop() {
        let mut controller = StreamController::new();
        assert!(controller.abort("s1").is_none());
    }

    #[test]
    fn test_stale_callbacks_after_abort_are_inert() {
        let mut controller = StreamController::new();
        let ticket = controller.begin("s1", "m1", Box::new(NoopHandle)).unwrap();
        controller.abort("s1");

        assert!(controller.apply_chunk(&ticket, "late").is_none());
        assert!(controller.complete(&ticket).is_none());
        assert!(controller.fail(&ticket).is_none());
    }

    #[test]
    fn test_stale_ticket_cannot_touch_successor_stream() {
        let mut controller = StreamController::new();
        let old = controller.begin("s1", "m1", Box::new(NoopHandle)).unwrap();
        controller.abort("s1");

        let new = controller.begin("s1", "m2", Box::new(NoopHandle)).unwrap();
        controller.apply_chunk(&new, "fresh");

        // The old ticket shares the session id but not the generation.
        assert!(controller.apply_chunk(&old, "stale").is_none());
        assert!(controller.complete(&old).is_none());
        assert!(controller.is_active("s1"));

        let finished = controller.complete(&new).unwrap();
        assert_eq!(finished.accumulated, "fresh");
    }

    #[test]
    fn test_generations_increase_monotonically() {
        let mut controller = StreamController::new();
        let a = controller.begin("s1", "m1", Box::new(NoopHandle)).unwrap();
        let b = controller.begin("s2", "m2", Box::new(NoopHandle)).unwrap();
        assert!(b.generation > a.generation);
    }
}
