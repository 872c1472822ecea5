//! Derived statistics for sessions and the whole store
//!
//! Everything in this module is a pure function of the message log (and,
//! for global statistics, the session list and a caller-supplied "now").
//! Nothing here is cached across calls; the store's denormalized session
//! counters are resynced from these derivations after every mutation.
//!
//! Messages still in `Receiving` status are in-flight and excluded from
//! every finalized aggregate.

use crate::log::MessageLog;
use crate::message::{Message, MessageRole};
use crate::session::{Session, SessionStatus};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Aggregates derived from a single session's message log
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    /// Finalized messages in the log
    pub total_messages: usize,
    /// Messages with role user
    pub user_messages: usize,
    /// Messages with role assistant
    pub assistant_messages: usize,
    /// Messages with role system
    pub system_messages: usize,
    /// Sum of token usage across finalized messages
    pub total_tokens: usize,
    /// Mean response time over messages carrying processing metadata
    pub avg_response_time_ms: f64,
    /// Fastest recorded response, None when no metadata exists
    pub min_response_time_ms: Option<u64>,
    /// Slowest recorded response, None when no metadata exists
    pub max_response_time_ms: Option<u64>,
    /// Seconds between first and last message, zero below 2 messages
    pub session_duration_secs: i64,
    /// Timestamp of the first finalized message
    pub first_message_at: Option<DateTime<Utc>>,
    /// Timestamp of the last finalized message
    pub last_message_at: Option<DateTime<Utc>>,
}

/// Aggregates across every session in the store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalStats {
    /// Number of sessions, regardless of status
    pub total_sessions: usize,
    /// Sessions with status Active
    pub active_sessions: usize,
    /// Sessions with status Archived
    pub archived_sessions: usize,
    /// Finalized messages across all sessions
    pub total_messages: usize,
    /// Token usage summed across all sessions
    pub total_tokens: usize,
    /// Mean finalized messages per session, zero with no sessions
    pub avg_messages_per_session: f64,
    /// Finalized messages timestamped within the last 24 hours
    pub messages_last_24h: usize,
    /// Finalized messages timestamped within the last 7 days
    pub messages_last_7d: usize,
}

/// Compute per-session aggregates from a message snapshot
///
/// Deterministic pure function: equal inputs give equal outputs.
/// Response-time statistics derive only from messages carrying
/// `metadata.processing_time_ms`.
///
/// # Examples
///
/// ```
/// use chatstore::{stats::compute_session_stats, Message};
///
/// let messages = vec![
///     Message::user("s1", "Hello"),
///     Message::assistant("s1", "Hi there"),
/// ];
/// let stats = compute_session_stats(&messages);
/// assert_eq!(stats.total_messages, 2);
/// assert_eq!(stats.user_messages, 1);
/// assert_eq!(stats.assistant_messages, 1);
/// ```
pub fn compute_session_stats(messages: &[Message]) -> SessionStats {
    let mut stats = SessionStats::default();
    let mut response_times: Vec<u64> = Vec::new();

    for message in messages.iter().filter(|m| m.status.is_finalized()) {
        stats.total_messages += 1;
        match message.role {
            MessageRole::User => stats.user_messages += 1,
            MessageRole::Assistant => stats.assistant_messages += 1,
            MessageRole::System => stats.system_messages += 1,
        }
        stats.total_tokens += message.total_tokens();

        if let Some(ms) = message.metadata.as_ref().and_then(|m| m.processing_time_ms) {
            response_times.push(ms);
        }

        if stats.first_message_at.is_none() {
            stats.first_message_at = Some(message.timestamp);
        }
        stats.last_message_at = Some(message.timestamp);
    }

    if !response_times.is_empty() {
        let sum: u64 = response_times.iter().sum();
        stats.avg_response_time_ms = sum as f64 / response_times.len() as f64;
        stats.min_response_time_ms = response_times.iter().min().copied();
        stats.max_response_time_ms = response_times.iter().max().copied();
    }

    if stats.total_messages >= 2 {
        if let (Some(first), Some(last)) = (stats.first_message_at, stats.last_message_at) {
            stats.session_duration_secs = (last - first).num_seconds();
        }
    }

    stats
}

/// Compute store-wide aggregates
///
/// Rolling 24h/7d windows compare message timestamps against `now` at
/// call time; the result is never cached across calls.
pub fn compute_global_stats(
    sessions: &[Session],
    log: &MessageLog,
    now: DateTime<Utc>,
) -> GlobalStats {
    let mut stats = GlobalStats {
        total_sessions: sessions.len(),
        ..Default::default()
    };

    for session in sessions {
        match session.status {
            SessionStatus::Active => stats.active_sessions += 1,
            SessionStatus::Archived => stats.archived_sessions += 1,
        }
    }

    let day_ago = now - Duration::hours(24);
    let week_ago = now - Duration::days(7);

    for (_, messages) in log.all_sessions() {
        for message in messages.iter().filter(|m| m.status.is_finalized()) {
            stats.total_messages += 1;
            stats.total_tokens += message.total_tokens();
            if message.timestamp > day_ago {
                stats.messages_last_24h += 1;
            }
            if message.timestamp > week_ago {
                stats.messages_last_7d += 1;
            }
        }
    }

    if stats.total_sessions > 0 {
        stats.avg_messages_per_session = stats.total_messages as f64 / stats.total_sessions as f64;
    }

    stats
}
