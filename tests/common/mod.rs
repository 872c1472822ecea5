use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use chatstore::error::Result;
use chatstore::storage::SqliteStorage;
use chatstore::transport::{ChatRequest, ChatResponse, ChatTransport, StreamHandle};
use chatstore::{ChatStore, ChatStoreError, StoreConfig};

/// Route store tracing through a test subscriber, honoring `RUST_LOG`
///
/// Safe to call from every test; only the first call installs the
/// subscriber.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

#[allow(dead_code)]
pub fn create_temp_storage() -> (SqliteStorage, TempDir) {
    init_tracing();
    let tmp = TempDir::new().expect("failed to create tempdir");
    let db_path = tmp.path().join("chatstore.db");
    let storage =
        SqliteStorage::new_with_path(db_path).expect("failed to create sqlite storage with path");
    (storage, tmp)
}

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    std::fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

/// Scripted outcome for one transport call
#[allow(dead_code)]
pub enum ScriptedReply {
    Response(ChatResponse),
    Stream,
    Failure(String),
}

pub struct ScriptedStreamHandle {
    aborted: Arc<AtomicBool>,
}

impl StreamHandle for ScriptedStreamHandle {
    fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
    }
}

/// Transport double replaying a queue of scripted replies
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<ScriptedReply>>,
    requests: Mutex<Vec<ChatRequest>>,
    aborted: Arc<AtomicBool>,
}

#[allow(dead_code)]
impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            aborted: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn push_response(&self, content: &str) {
        self.replies
            .lock()
            .expect("replies lock poisoned")
            .push_back(ScriptedReply::Response(ChatResponse {
                content: content.to_string(),
                model: Some("scripted-model".to_string()),
                processing_time_ms: Some(7),
                usage: None,
                finish_reason: Some("stop".to_string()),
            }));
    }

    pub fn push_stream(&self) {
        self.replies
            .lock()
            .expect("replies lock poisoned")
            .push_back(ScriptedReply::Stream);
    }

    pub fn push_failure(&self, message: &str) {
        self.replies
            .lock()
            .expect("replies lock poisoned")
            .push_back(ScriptedReply::Failure(message.to_string()));
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().expect("requests lock poisoned").clone()
    }

    pub fn was_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    fn next_reply(&self, request: ChatRequest) -> Result<ScriptedReply> {
        self.requests
            .lock()
            .expect("requests lock poisoned")
            .push(request);
        self.replies
            .lock()
            .expect("replies lock poisoned")
            .pop_front()
            .ok_or_else(|| ChatStoreError::Transport("no scripted reply queued".to_string()).into())
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    async fn request_once(&self, request: ChatRequest) -> Result<ChatResponse> {
        match self.next_reply(request)? {
            ScriptedReply::Response(response) => Ok(response),
            ScriptedReply::Stream => Err(ChatStoreError::Transport(
                "scripted stream for request_once".to_string(),
            )
            .into()),
            ScriptedReply::Failure(message) => Err(ChatStoreError::Transport(message).into()),
        }
    }

    async fn open_stream(&self, request: ChatRequest) -> Result<Box<dyn StreamHandle>> {
        match self.next_reply(request)? {
            ScriptedReply::Stream => Ok(Box::new(ScriptedStreamHandle {
                aborted: Arc::clone(&self.aborted),
            })),
            ScriptedReply::Response(_) => Err(ChatStoreError::Transport(
                "scripted response for open_stream".to_string(),
            )
            .into()),
            ScriptedReply::Failure(message) => Err(ChatStoreError::Stream(message).into()),
        }
    }
}

#[allow(dead_code)]
pub fn new_store() -> (ChatStore, Arc<ScriptedTransport>) {
    init_tracing();
    let transport = ScriptedTransport::new();
    let store = ChatStore::new(StoreConfig::default(), transport.clone())
        .expect("default config is valid");
    (store, transport)
}
