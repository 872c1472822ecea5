//! Snapshot persistence for the chat store
//!
//! Sessions (with their message logs), templates, and the store
//! configuration are persisted as JSON rows in an embedded SQLite
//! database. Ephemeral stream controller state is never written; a
//! restored store always comes back with every stream idle.

use crate::config::StoreConfig;
use crate::error::{ChatStoreError, Result};
use crate::message::Message;
use crate::session::Session;
use crate::templates::SessionTemplate;
use anyhow::Context;
use chrono::Utc;
use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::PathBuf;

/// SQLite-backed snapshot store
pub struct SqliteStorage {
    db_path: PathBuf,
}

impl SqliteStorage {
    /// Create a storage instance in the user's data directory
    ///
    /// The database path can be overridden with the `CHATSTORE_DB`
    /// environment variable, which makes it easy to point at a test
    /// database without changing the application data dir.
    ///
    /// # Errors
    ///
    /// Returns `ChatStoreError::Storage` when the data directory cannot
    /// be determined or created.
    pub fn new() -> Result<Self> {
        if let Ok(override_path) = std::env::var("CHATSTORE_DB") {
            return Self::new_with_path(override_path);
        }

        let proj_dirs = ProjectDirs::from("com", "chatstore", "chatstore")
            .ok_or_else(|| ChatStoreError::Storage("Could not determine data directory".into()))?;

        let data_dir = proj_dirs.data_dir();
        std::fs::create_dir_all(data_dir)
            .context("Failed to create data directory")
            .map_err(|e| ChatStoreError::Storage(e.to_string()))?;

        Self::new_with_path(data_dir.join("chatstore.db"))
    }

    /// Create a storage instance at an explicit database path
    ///
    /// Primarily useful for tests working against a temporary directory.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use chatstore::storage::SqliteStorage;
    ///
    /// let storage = SqliteStorage::new_with_path("/tmp/chatstore_test.db").unwrap();
    /// ```
    pub fn new_with_path<P: Into<PathBuf>>(db_path: P) -> Result<Self> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create parent directory for database")
                .map_err(|e| ChatStoreError::Storage(e.to_string()))?;
        }

        let storage = Self { db_path };
        storage.init()?;
        Ok(storage)
    }

    /// Initialize the database schema
    fn init(&self) -> Result<()> {
        let conn = self.open()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                session JSON NOT NULL,
                messages JSON NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS templates (
                id TEXT PRIMARY KEY,
                template JSON NOT NULL
            );
            CREATE TABLE IF NOT EXISTS store_config (
                key TEXT PRIMARY KEY,
                config JSON NOT NULL
            );",
        )
        .context("Failed to create tables")
        .map_err(|e| ChatStoreError::Storage(e.to_string()))?;

        Ok(())
    }

    fn open(&self) -> Result<Connection> {
        Connection::open(&self.db_path)
            .context("Failed to open database")
            .map_err(|e| ChatStoreError::Storage(e.to_string()).into())
    }

    /// Remove every session and template row
    ///
    /// Used before writing a full snapshot so rows for deleted sessions
    /// do not linger.
    pub fn clear(&self) -> Result<()> {
        let conn = self.open()?;
        conn.execute_batch("DELETE FROM sessions; DELETE FROM templates;")
            .context("Failed to clear storage")
            .map_err(|e| ChatStoreError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Save or replace a session row with its message log
    pub fn save_session(&self, session: &Session, messages: &[Message]) -> Result<()> {
        let conn = self.open()?;

        let session_json = serde_json::to_string(session)
            .context("Failed to serialize session")
            .map_err(|e| ChatStoreError::Storage(e.to_string()))?;
        let messages_json = serde_json::to_string(messages)
            .context("Failed to serialize messages")
            .map_err(|e| ChatStoreError::Storage(e.to_string()))?;

        conn.execute(
            "INSERT OR REPLACE INTO sessions (id, session, messages, updated_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![session.id, session_json, messages_json, Utc::now().to_rfc3339()],
        )
        .context("Failed to save session")
        .map_err(|e| ChatStoreError::Storage(e.to_string()))?;

        Ok(())
    }

    /// Delete a session row; unknown ids are a no-op
    pub fn delete_session(&self, session_id: &str) -> Result<()> {
        let conn = self.open()?;
        conn.execute("DELETE FROM sessions WHERE id = ?1", params![session_id])
            .context("Failed to delete session")
            .map_err(|e| ChatStoreError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Load every persisted session with its message log
    pub fn load_sessions(&self) -> Result<Vec<(Session, Vec<Message>)>> {
        let conn = self.open()?;
        let mut stmt = conn
            .prepare("SELECT session, messages FROM sessions ORDER BY updated_at ASC")
            .context("Failed to prepare query")
            .map_err(|e| ChatStoreError::Storage(e.to_string()))?;

        let rows = stmt
            .query_map([], |row| {
                let session_json: String = row.get(0)?;
                let messages_json: String = row.get(1)?;
                Ok((session_json, messages_json))
            })
            .context("Failed to query sessions")
            .map_err(|e| ChatStoreError::Storage(e.to_string()))?;

        let mut sessions = Vec::new();
        for row in rows {
            let (session_json, messages_json) = row
                .context("Failed to read session row")
                .map_err(|e| ChatStoreError::Storage(e.to_string()))?;
            let session: Session = serde_json::from_str(&session_json)
                .context("Failed to deserialize session")
                .map_err(|e| ChatStoreError::Storage(e.to_string()))?;
            let messages: Vec<Message> = serde_json::from_str(&messages_json)
                .context("Failed to deserialize messages")
                .map_err(|e| ChatStoreError::Storage(e.to_string()))?;
            sessions.push((session, messages));
        }

        Ok(sessions)
    }

    /// Save or replace a template row
    pub fn save_template(&self, template: &SessionTemplate) -> Result<()> {
        let conn = self.open()?;
        let template_json = serde_json::to_string(template)
            .context("Failed to serialize template")
            .map_err(|e| ChatStoreError::Storage(e.to_string()))?;

        conn.execute(
            "INSERT OR REPLACE INTO templates (id, template) VALUES (?1, ?2)",
            params![template.id, template_json],
        )
        .context("Failed to save template")
        .map_err(|e| ChatStoreError::Storage(e.to_string()))?;

        Ok(())
    }

    /// Delete a template row; unknown ids are a no-op
    pub fn delete_template(&self, template_id: &str) -> Result<()> {
        let conn = self.open()?;
        conn.execute("DELETE FROM templates WHERE id = ?1", params![template_id])
            .context("Failed to delete template")
            .map_err(|e| ChatStoreError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Load every persisted template
    pub fn load_templates(&self) -> Result<Vec<SessionTemplate>> {
        let conn = self.open()?;
        let mut stmt = conn
            .prepare("SELECT template FROM templates")
            .context("Failed to prepare query")
            .map_err(|e| ChatStoreError::Storage(e.to_string()))?;

        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .context("Failed to query templates")
            .map_err(|e| ChatStoreError::Storage(e.to_string()))?;

        let mut templates = Vec::new();
        for row in rows {
            let template_json = row
                .context("Failed to read template row")
                .map_err(|e| ChatStoreError::Storage(e.to_string()))?;
            let template: SessionTemplate = serde_json::from_str(&template_json)
                .context("Failed to deserialize template")
                .map_err(|e| ChatStoreError::Storage(e.to_string()))?;
            templates.push(template);
        }

        Ok(templates)
    }

    /// Persist the store configuration
    pub fn save_config(&self, config: &StoreConfig) -> Result<()> {
        let conn = self.open()?;
        let config_json = serde_json::to_string(config)
            .context("Failed to serialize config")
            .map_err(|e| ChatStoreError::Storage(e.to_string()))?;

        conn.execute(
            "INSERT OR REPLACE INTO store_config (key, config) VALUES ('store', ?1)",
            params![config_json],
        )
        .context("Failed to save config")
        .map_err(|e| ChatStoreError::Storage(e.to_string()))?;

        Ok(())
    }

    /// Load the persisted store configuration, if any
    pub fn load_config(&self) -> Result<Option<StoreConfig>> {
        let conn = self.open()?;
        let config_json: Option<String> = conn
            .query_row(
                "SELECT config FROM store_config WHERE key = 'store'",
                [],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to query config")
            .map_err(|e| ChatStoreError::Storage(e.to_string()))?;

        match config_json {
            Some(json) => {
                let config: StoreConfig = serde_json::from_str(&json)
                    .context("Failed to deserialize config")
                    .map_err(|e| ChatStoreError::Storage(e.to_string()))?;
                Ok(Some(config))
            }
            None => Ok(None),
        }
    }
}
