//! ChatStore - Conversational session management library
//!
//! This library provides the in-memory state layer for a chat
//! application: sessions, message logs, streaming response lifecycle,
//! statistics, search, templates, and a snapshot persistence layer.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `store`: The `ChatStore` facade that wires everything together
//! - `session`: Session records, configuration, and partial updates
//! - `message`: Message records, roles, statuses, and metadata
//! - `log`: Per-session ordered message storage with a FIFO cap
//! - `stream`: Generation-checked lifecycle for streamed responses
//! - `transport`: The backend abstraction exchanges go through
//! - `events`: Synchronous event bus for state-change notifications
//! - `stats`: Derived per-session and global aggregates
//! - `search`: Keyword and regex search with snippet extraction
//! - `templates`: Reusable session presets
//! - `export`: Session export and import in several formats
//! - `storage`: SQLite snapshot persistence
//! - `config`: Store configuration and validation
//! - `error`: Error types and result aliases
//!
//! # Example
//!
//! ```no_run
//! use chatstore::{ChatStore, StoreConfig};
//! # use chatstore::transport::{ChatTransport, ChatRequest, ChatResponse, StreamHandle};
//! # use async_trait::async_trait;
//! # use std::sync::Arc;
//! # struct Backend;
//! # #[async_trait]
//! # impl ChatTransport for Backend {
//! #     async fn request_once(&self, _r: ChatRequest) -> chatstore::error::Result<ChatResponse> { unimplemented!() }
//! #     async fn open_stream(&self, _r: ChatRequest) -> chatstore::error::Result<Box<dyn StreamHandle>> { unimplemented!() }
//! # }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = StoreConfig::default();
//!     config.validate()?;
//!     let mut store = ChatStore::new(config, Arc::new(Backend))?;
//!
//!     let session_id = store.create_session(Some("Notes"), None, None);
//!     store.send_message(&session_id, "hello").await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod export;
pub mod ids;
pub mod log;
pub mod message;
pub mod search;
pub mod session;
pub mod stats;
pub mod storage;
pub mod store;
pub mod stream;
pub mod templates;
pub mod transport;

// Re-export commonly used types
pub use config::StoreConfig;
pub use error::{ChatStoreError, Result};
pub use events::{Listener, ListenerId, StoreEvent};
pub use export::ExportFormat;
pub use message::{Message, MessageKind, MessageRole, MessageStatus, TokenUsage};
pub use search::{SearchOptions, SearchResult};
pub use session::{Session, SessionConfig, SessionPatch, SessionStatus};
pub use stats::{GlobalStats, SessionStats};
pub use storage::SqliteStorage;
pub use store::{BatchDeleteResult, ChatStore, MessagePatch};
pub use stream::StreamTicket;
pub use templates::{SessionTemplate, TemplateMessage, TemplateRegistry};
pub use transport::{ChatRequest, ChatResponse, ChatTransport, StreamCompletion, StreamHandle};

#[cfg(test)]
pub mod test_utils;
