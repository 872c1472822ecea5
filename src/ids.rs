//! Identifier generation for sessions, messages, and templates
//!
//! ULIDs (Universally Unique Lexicographically Sortable Identifiers)
//! are preferred over UUIDs as they are sortable by timestamp and more
//! human-readable. All ids in the store come from this module so that
//! collision resistance and format are decided in one place.

use ulid::Ulid;

/// Generate a new session id
///
/// # Examples
///
/// ```
/// use chatstore::ids::new_session_id;
///
/// let id = new_session_id();
/// assert_eq!(id.len(), 26);
/// ```
pub fn new_session_id() -> String {
    Ulid::new().to_string()
}

/// Generate a new message id
///
/// # Examples
///
/// ```
/// use chatstore::ids::new_message_id;
///
/// let id = new_message_id();
/// assert_eq!(id.len(), 26);
/// ```
pub fn new_message_id() -> String {
    Ulid::new().to_string()
}

/// Generate a new template id
pub fn new_template_id() -> String {
    Ulid::new().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_is_valid_ulid() {
        let id = new_session_id();
        assert!(!id.is_empty());
        assert_eq!(id.len(), 26); // ULID string length
        assert!(ulid::Ulid::from_string(&id).is_ok());
    }

    #[test]
    fn test_ids_are_unique() {
        let a = new_session_id();
        let b = new_session_id();
        assert_ne!(a, b);

        let m1 = new_message_id();
        let m2 = new_message_id();
        assert_ne!(m1, m2);
    }

    #[test]
    fn test_ids_sort_by_creation_time() {
        let first = new_message_id();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = new_message_id();
        assert!(first < second);
    }
}
