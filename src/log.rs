//! Per-session ordered message logs
//!
//! The log owns every message in the store, keyed by session id. Appends
//! are ordered, point deletes and in-place updates are supported, and a
//! per-session cap drops the oldest messages FIFO on overflow. Reads hand
//! out cloned snapshots; callers never alias the internal vectors.

use crate::error::{ChatStoreError, Result};
use crate::message::Message;
use std::collections::HashMap;

/// Ordered message collections for all sessions
#[derive(Debug, Default)]
pub struct MessageLog {
    logs: HashMap<String, Vec<Message>>,
    max_per_session: usize,
}

impl MessageLog {
    /// Create an empty log with the given per-session cap
    pub fn new(max_per_session: usize) -> Self {
        Self {
            logs: HashMap::new(),
            max_per_session,
        }
    }

    /// Register an empty log for a new session
    pub fn create_session(&mut self, session_id: impl Into<String>) {
        self.logs.entry(session_id.into()).or_default();
    }

    /// Remove a session's log entirely, returning the messages it held
    pub fn remove_session(&mut self, session_id: &str) -> Option<Vec<Message>> {
        self.logs.remove(session_id)
    }

    /// True when the log knows the session
    pub fn contains_session(&self, session_id: &str) -> bool {
        self.logs.contains_key(session_id)
    }

    /// Append a message, dropping the oldest entry when the cap is hit
    ///
    /// Returns the id of the appended message.
    ///
    /// # Errors
    ///
    /// Returns `ChatStoreError::SessionNotFound` for an unknown session.
    pub fn append(&mut self, message: Message) -> Result<String> {
        let log = self
            .logs
            .get_mut(&message.session_id)
            .ok_or_else(|| ChatStoreError::SessionNotFound(message.session_id.clone()))?;

        if log.len() >= self.max_per_session {
            let dropped = log.remove(0);
            tracing::debug!(
                session_id = %message.session_id,
                dropped_id = %dropped.id,
                "message cap reached, dropping oldest entry"
            );
        }

        let id = message.id.clone();
        log.push(message);
        Ok(id)
    }

    /// Mutate a message in place via the provided closure
    ///
    /// # Errors
    ///
    /// Returns `SessionNotFound` or `MessageNotFound` when the target is
    /// missing; the log is untouched in either case.
    pub fn update<F>(&mut self, session_id: &str, message_id: &str, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut Message),
    {
        let log = self
            .logs
            .get_mut(session_id)
            .ok_or_else(|| ChatStoreError::SessionNotFound(session_id.to_string()))?;

        let message = log
            .iter_mut()
            .find(|m| m.id == message_id)
            .ok_or_else(|| ChatStoreError::MessageNotFound {
                session_id: session_id.to_string(),
                message_id: message_id.to_string(),
            })?;

        mutate(message);
        Ok(())
    }

    /// Remove a single message, returning it
    ///
    /// # Errors
    ///
    /// Returns `SessionNotFound` or `MessageNotFound` when missing.
    pub fn delete(&mut self, session_id: &str, message_id: &str) -> Result<Message> {
        let log = self
            .logs
            .get_mut(session_id)
            .ok_or_else(|| ChatStoreError::SessionNotFound(session_id.to_string()))?;

        let index = log.iter().position(|m| m.id == message_id).ok_or_else(|| {
            ChatStoreError::MessageNotFound {
                session_id: session_id.to_string(),
                message_id: message_id.to_string(),
            }
        })?;

        Ok(log.remove(index))
    }

    /// Remove every message from a session, keeping the session registered
    ///
    /// # Errors
    ///
    /// Returns `SessionNotFound` for an unknown session.
    pub fn clear(&mut self, session_id: &str) -> Result<()> {
        let log = self
            .logs
            .get_mut(session_id)
            .ok_or_else(|| ChatStoreError::SessionNotFound(session_id.to_string()))?;
        log.clear();
        Ok(())
    }

    /// Snapshot of a session's messages, empty for unknown sessions
    pub fn messages(&self, session_id: &str) -> Vec<Message> {
        self.logs.get(session_id).cloned().unwrap_or_default()
    }

    /// Snapshot of a single message
    pub fn message(&self, session_id: &str, message_id: &str) -> Option<Message> {
        self.logs
            .get(session_id)?
            .iter()
            .find(|m| m.id == message_id)
            .cloned()
    }

    /// Number of messages held for a session
    pub fn len(&self, session_id: &str) -> usize {
        self.logs.get(session_id).map(Vec::len).unwrap_or(0)
    }

    /// True when the session holds no messages
    pub fn is_empty(&self, session_id: &str) -> bool {
        self.len(session_id) == 0
    }

    /// Derived counters for a session: (message count, total tokens)
    ///
    /// The store syncs the session's denormalized caches from these after
    /// every mutation.
    pub fn derived_counters(&self, session_id: &str) -> (usize, usize) {
        match self.logs.get(session_id) {
            Some(log) => {
                let tokens = log.iter().map(Message::total_tokens).sum();
                (log.len(), tokens)
            }
            None => (0, 0),
        }
    }

    /// Iterate session ids with their message snapshots
    pub fn all_sessions(&self) -> impl Iterator<Item = (&String, &Vec<Message>)> {
        self.logs.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{MessageMetadata, MessageStatus, TokenUsage};

    fn log_with_session() -> MessageLog {
        let mut log = MessageLog::new(10);
        log.create_session("s1");
        log
    }

    #[test]
    fn test_append_and_snapshot() {
        let mut log = log_with_session();
        let id = log.append(Message::user("s1", "Hello")).unwrap();

        let messages = log.messages("s1");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, id);
        assert_eq!(messages[0].content, "Hello");
    }

    #[test]
    fn test_append_unknown_session_fails() {
        let mut log = MessageLog::new(10);
        let result = log.append(Message::user("missing", "Hello"));
        assert!(result.is_err());
    }

    #[test]
    fn test_fifo_cap_drops_oldest() {
        let mut log = MessageLog::new(3);
        log.create_session("s1");

        for i in 0..5 {
            log.append(Message::user("s1", format!("msg {}", i))).unwrap();
        }

        let messages = log.messages("s1");
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].content, "msg 2");
        assert_eq!(messages[2].content, "msg 4");
    }

    #[test]
    fn test_update_in_place() {
        let mut log = log_with_session();
        let id = log.append(Message::receiving_placeholder("s1")).unwrap();

        log.update("s1", &id, |m| {
            m.content = "partial".to_string();
        })
        .unwrap();

        assert_eq!(log.message("s1", &id).unwrap().content, "partial");
    }

    #[test]
    fn test_update_missing_message_fails() {
        let mut log = log_with_session();
        let result = log.update("s1", "missing", |_| {});
        assert!(result.is_err());
    }

    #[test]
    fn test_delete_returns_message() {
        let mut log = log_with_session();
        let id = log.append(Message::user("s1", "bye")).unwrap();

        let removed = log.delete("s1", &id).unwrap();
        assert_eq!(removed.content, "bye");
        assert!(log.is_empty("s1"));
    }

    #[test]
    fn test_clear_keeps_session_registered() {
        let mut log = log_with_session();
        log.append(Message::user("s1", "one")).unwrap();
        log.append(Message::user("s1", "two")).unwrap();

        log.clear("s1").unwrap();
        assert!(log.is_empty("s1"));
        assert!(log.contains_session("s1"));
    }

    #[test]
    fn test_remove_session_returns_messages() {
        let mut log = log_with_session();
        log.append(Message::user("s1", "one")).unwrap();

        let removed = log.remove_session("s1").unwrap();
        assert_eq!(removed.len(), 1);
        assert!(!log.contains_session("s1"));
    }

    #[test]
    fn test_snapshots_do_not_alias_internal_state() {
        let mut log = log_with_session();
        log.append(Message::user("s1", "original")).unwrap();

        let mut snapshot = log.messages("s1");
        snapshot[0].content = "mutated".to_string();

        assert_eq!(log.messages("s1")[0].content, "original");
    }

    #[test]
    fn test_derived_counters() {
        let mut log = log_with_session();
        log.append(Message::user("s1", "q")).unwrap();

        let mut answer = Message::assistant("s1", "a");
        answer.metadata = Some(MessageMetadata {
            token_usage: Some(TokenUsage::new(10, 32)),
            ..Default::default()
        });
        log.append(answer).unwrap();

        assert_eq!(log.derived_counters("s1"), (2, 42));
        assert_eq!(log.derived_counters("missing"), (0, 0));
    }

    #[test]
    fn test_status_transition_via_update() {
        let mut log = log_with_session();
        let id = log.append(Message::receiving_placeholder("s1")).unwrap();

        log.update("s1", &id, |m| {
            m.status = MessageStatus::Cancelled;
        })
        .unwrap();

        assert_eq!(
            log.message("s1", &id).unwrap().status,
            MessageStatus::Cancelled
        );
    }
}
