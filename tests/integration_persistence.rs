//! Integration tests for snapshot persistence
//!
//! Tests the full persist and restore round trip through SQLite,
//! including the rule that live stream state never survives a restart.

mod common;

use common::{create_temp_storage, new_store, ScriptedTransport};

use chatstore::{
    ChatStore, MessageRole, MessageStatus, SessionPatch, SessionStatus, SessionTemplate,
};

#[tokio::test]
async fn test_persist_and_restore_round_trip() {
    let (storage, _tmp) = create_temp_storage();
    let (mut store, transport) = new_store();

    let first = store.create_session(Some("First"), None, None);
    let second = store.create_session(Some("Second"), None, None);
    transport.push_response("reply one");
    transport.push_response("reply two");
    store.send_message(&first, "hello").await.expect("send one");
    store.send_message(&second, "world").await.expect("send two");
    store
        .update_session(
            &second,
            SessionPatch {
                status: Some(SessionStatus::Archived),
                ..Default::default()
            },
        )
        .expect("archive");
    store.add_template(SessionTemplate::new("Preset", "chat"));

    store.persist(&storage).expect("persist succeeds");

    let restored =
        ChatStore::restore(&storage, ScriptedTransport::new()).expect("restore succeeds");
    assert_eq!(restored.sessions().len(), 2);
    assert_eq!(restored.templates().len(), 1);

    let first_back = restored.session(&first).expect("first survives");
    assert_eq!(first_back.title, "First");
    assert_eq!(first_back.message_count, 2);

    let second_back = restored.session(&second).expect("second survives");
    assert_eq!(second_back.status, SessionStatus::Archived);

    let messages = restored.messages(&first);
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, MessageRole::User);
    assert_eq!(messages[0].content, "hello");
    assert_eq!(messages[1].content, "reply one");
}

#[tokio::test]
async fn test_persist_excludes_stream_state() {
    let (storage, _tmp) = create_temp_storage();
    let (mut store, transport) = new_store();
    let session_id = store.create_session(Some("Streaming"), None, None);
    transport.push_stream();

    let ticket = store
        .send_stream_message(&session_id, "go")
        .await
        .expect("stream opens");
    store.stream_chunk(&ticket, "partial");
    store.persist(&storage).expect("persist succeeds");

    let mut restored =
        ChatStore::restore(&storage, ScriptedTransport::new()).expect("restore succeeds");
    assert!(!restored.is_streaming(&session_id));
    // The placeholder comes back as a plain record still marked receiving,
    // and the old ticket means nothing to the restored store.
    assert!(!restored.stream_chunk(&ticket, "late"));
    let placeholder = restored
        .message(&session_id, &ticket.message_id)
        .expect("placeholder persisted");
    assert_eq!(placeholder.status, MessageStatus::Receiving);
    assert_eq!(placeholder.content, "partial");
}

#[tokio::test]
async fn test_persist_removes_rows_for_deleted_sessions() {
    let (storage, _tmp) = create_temp_storage();
    let (mut store, transport) = new_store();

    let keep = store.create_session(Some("Keep"), None, None);
    let drop_id = store.create_session(Some("Drop"), None, None);
    transport.push_response("reply");
    store.send_message(&keep, "hello").await.expect("send");
    store.persist(&storage).expect("first persist");

    store.delete_session(&drop_id).expect("delete succeeds");
    store.persist(&storage).expect("second persist");

    let restored =
        ChatStore::restore(&storage, ScriptedTransport::new()).expect("restore succeeds");
    assert_eq!(restored.sessions().len(), 1);
    assert!(restored.session(&drop_id).is_none());
    assert!(restored.session(&keep).is_some());
}

#[test]
fn test_restore_from_empty_storage() {
    let (storage, _tmp) = create_temp_storage();
    let restored =
        ChatStore::restore(&storage, ScriptedTransport::new()).expect("restore succeeds");
    assert!(restored.sessions().is_empty());
    assert!(restored.templates().is_empty());
    assert_eq!(restored.current_session_id(), None);
}

#[tokio::test]
async fn test_restored_store_keeps_working() {
    let (storage, _tmp) = create_temp_storage();
    let (mut store, transport) = new_store();
    let session_id = store.create_session(Some("Continue"), None, None);
    transport.push_response("before restart");
    store.send_message(&session_id, "first").await.expect("send");
    store.persist(&storage).expect("persist succeeds");

    let fresh_transport = ScriptedTransport::new();
    let mut restored =
        ChatStore::restore(&storage, fresh_transport.clone()).expect("restore succeeds");
    assert_eq!(restored.current_session_id(), Some(session_id.as_str()));

    fresh_transport.push_response("after restart");
    restored
        .send_message(&session_id, "second")
        .await
        .expect("send after restore");
    assert_eq!(restored.messages(&session_id).len(), 4);
    assert_eq!(
        restored.session(&session_id).expect("present").message_count,
        4
    );
}
