//! Synchronous event bus for store lifecycle notifications
//!
//! Events fan out to registered listeners on the caller's thread, in
//! registration order. A panicking listener is isolated so the remaining
//! listeners still run and the emitter never unwinds.

use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Lifecycle event emitted by the store
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreEvent {
    /// A session was created
    SessionCreated {
        /// Id of the new session
        session_id: String,
    },
    /// A session was updated (patch, rename, pin, star, switch)
    SessionUpdated {
        /// Id of the updated session
        session_id: String,
    },
    /// A session and its messages were deleted
    SessionDeleted {
        /// Id of the deleted session
        session_id: String,
    },
    /// A message was appended to a session's log
    MessageSent {
        /// Owning session
        session_id: String,
        /// Id of the appended message
        message_id: String,
    },
    /// A message was mutated in place
    MessageUpdated {
        /// Owning session
        session_id: String,
        /// Id of the updated message
        message_id: String,
    },
    /// A message was removed from a session's log
    MessageDeleted {
        /// Owning session
        session_id: String,
        /// Id of the removed message
        message_id: String,
    },
    /// First chunk of a stream arrived
    StreamStart {
        /// Owning session
        session_id: String,
        /// Placeholder message id
        message_id: String,
    },
    /// A stream chunk was applied to the placeholder
    StreamChunk {
        /// Owning session
        session_id: String,
        /// Placeholder message id
        message_id: String,
        /// The incremental text that arrived
        delta: String,
    },
    /// A stream finished successfully
    StreamComplete {
        /// Owning session
        session_id: String,
        /// Settled message id
        message_id: String,
    },
    /// A stream was cancelled by the caller, partial content preserved
    StreamCancelled {
        /// Owning session
        session_id: String,
        /// Cancelled message id
        message_id: String,
    },
    /// A stream failed; the placeholder was replaced by an error message
    StreamError {
        /// Owning session
        session_id: String,
        /// Failure description
        error: String,
    },
    /// Generic error broadcast so UI layers can surface failures
    Error {
        /// Operation that failed
        context: String,
        /// Failure description
        error: String,
    },
}

/// Listener callback invoked for every emitted event
pub type Listener = Box<dyn FnMut(&StoreEvent) + Send>;

/// Handle identifying a registered listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Synchronous fan-out of store events
///
/// # Examples
///
/// ```
/// use chatstore::events::{EventBus, StoreEvent};
/// use std::sync::{Arc, Mutex};
///
/// let mut bus = EventBus::new();
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let sink = seen.clone();
/// let id = bus.add_listener(Box::new(move |event| {
///     sink.lock().unwrap().push(event.clone());
/// }));
///
/// bus.emit(&StoreEvent::SessionCreated { session_id: "s1".into() });
/// assert_eq!(seen.lock().unwrap().len(), 1);
///
/// bus.remove_listener(id);
/// bus.emit(&StoreEvent::SessionCreated { session_id: "s2".into() });
/// assert_eq!(seen.lock().unwrap().len(), 1);
/// ```
#[derive(Default)]
pub struct EventBus {
    listeners: Vec<(ListenerId, Listener)>,
    next_id: u64,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl EventBus {
    /// Create an empty bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener, returning a handle usable with `remove_listener`
    pub fn add_listener(&mut self, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, listener));
        id
    }

    /// Remove a listener; unknown handles are a no-op
    ///
    /// Returns true when a listener was removed.
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Deliver an event to every listener in registration order
    ///
    /// A panicking listener is caught and logged; delivery continues with
    /// the remaining listeners.
    pub fn emit(&mut self, event: &StoreEvent) {
        for (id, listener) in &mut self.listeners {
            let outcome = catch_unwind(AssertUnwindSafe(|| listener(event)));
            if outcome.is_err() {
                tracing::warn!(listener = id.0, ?event, "event listener panicked");
            }
        }
    }
}
