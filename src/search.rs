//! Keyword and regex search across session message logs
//!
//! Matching is literal substring by default; when `use_regex` is set and
//! the pattern is invalid, the engine silently falls back to literal
//! matching, so a query never fails. Role/kind/time filters apply before
//! snippet extraction, and in-flight (`Receiving`) messages are skipped.

use crate::log::MessageLog;
use crate::message::{Message, MessageKind, MessageRole};
use chrono::{DateTime, Utc};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// Number of characters kept on each side of the first match
const SNIPPET_RADIUS: usize = 50;

/// Query options for a search
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchOptions {
    /// Match case exactly; default is case-insensitive
    #[serde(default)]
    pub case_sensitive: bool,
    /// Treat the keyword as a regular expression
    #[serde(default)]
    pub use_regex: bool,
    /// Restrict matches to these roles
    #[serde(default)]
    pub roles: Option<Vec<MessageRole>>,
    /// Restrict matches to these message kinds
    #[serde(default)]
    pub kinds: Option<Vec<MessageKind>>,
    /// Only messages at or after this instant
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    /// Only messages at or before this instant
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
}

/// A single search hit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// Session the message belongs to
    pub session_id: String,
    /// Matched message id
    pub message_id: String,
    /// Role of the matched message
    pub role: MessageRole,
    /// Timestamp of the matched message
    pub timestamp: DateTime<Utc>,
    /// Text window around the first match
    pub snippet: String,
    /// Fixed relevance score; filtering is the only ranking applied
    pub score: f64,
}

/// Search a single session's message snapshot
///
/// # Examples
///
/// ```
/// use chatstore::search::{search_messages, SearchOptions};
/// use chatstore::Message;
///
/// let messages = vec![
///     Message::user("s1", "I have a Cat"),
///     Message::user("s1", "dog"),
/// ];
/// let hits = search_messages(&messages, "cat", &SearchOptions::default());
/// assert_eq!(hits.len(), 1);
/// assert!(hits[0].snippet.contains("Cat"));
/// ```
pub fn search_messages(
    messages: &[Message],
    keyword: &str,
    options: &SearchOptions,
) -> Vec<SearchResult> {
    let Some(matcher) = build_matcher(keyword, options) else {
        return Vec::new();
    };

    messages
        .iter()
        .filter(|m| passes_filters(m, options))
        .filter_map(|m| {
            matcher.find(&m.content).map(|found| SearchResult {
                session_id: m.session_id.clone(),
                message_id: m.id.clone(),
                role: m.role,
                timestamp: m.timestamp,
                snippet: extract_snippet(&m.content, found.start(), found.end()),
                score: 1.0,
            })
        })
        .collect()
}

/// Search every session's log, truncating to `limit` results
pub fn global_search(
    log: &MessageLog,
    keyword: &str,
    options: &SearchOptions,
    limit: usize,
) -> Vec<SearchResult> {
    let mut results = Vec::new();
    for (_, messages) in log.all_sessions() {
        results.extend(search_messages(messages, keyword, options));
    }
    results.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.message_id.cmp(&b.message_id)));
    results.truncate(limit);
    results
}

/// Build the matcher for a query, falling back to literal on bad regex
///
/// Returns `None` only for a blank keyword, which matches nothing.
fn build_matcher(keyword: &str, options: &SearchOptions) -> Option<Regex> {
    if keyword.trim().is_empty() {
        return None;
    }

    if options.use_regex {
        match RegexBuilder::new(keyword)
            .case_insensitive(!options.case_sensitive)
            .build()
        {
            Ok(re) => return Some(re),
            Err(e) => {
                tracing::debug!(keyword, error = %e, "invalid search regex, using literal match");
            }
        }
    }

    RegexBuilder::new(&regex::escape(keyword))
        .case_insensitive(!options.case_sensitive)
        .build()
        .ok()
}

fn passes_filters(message: &Message, options: &SearchOptions) -> bool {
    if !message.status.is_finalized() {
        return false;
    }
    if let Some(roles) = &options.roles {
        if !roles.contains(&message.role) {
            return false;
        }
    }
    if let Some(kinds) = &options.kinds {
        if !kinds.contains(&message.kind) {
            return false;
        }
    }
    if let Some(start) = options.start_time {
        if message.timestamp < start {
            return false;
        }
    }
    if let Some(end) = options.end_time {
        if message.timestamp > end {
            return false;
        }
    }
    true
}

/// Extract a character window around the match at [start, end) byte offsets
fn extract_snippet(content: &str, match_start: usize, match_end: usize) -> String {
    let start_char = content[..match_start].chars().count();
    let end_char = start_char + content[match_start..match_end].chars().count();

    let window_start = start_char.saturating_sub(SNIPPET_RADIUS);
    let window_end = end_char + SNIPPET_RADIUS;

    content
        .chars()
        .skip(window_start)
        .take(window_end - window_start)
        .collect()
}
