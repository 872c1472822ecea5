//! Session export and import
//!
//! JSON export is a full-fidelity serialization of the session and its
//! messages; Markdown and plain text are one-way transcript renderings.
//! Import always regenerates session and message ids so an imported
//! session can never collide with a live one.

use crate::error::{ChatStoreError, Result};
use crate::ids::{new_message_id, new_session_id};
use crate::message::Message;
use crate::session::Session;
use serde::{Deserialize, Serialize};

/// Supported export formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Full-fidelity JSON, re-importable
    Json,
    /// Markdown transcript
    Markdown,
    /// Plain text transcript
    Text,
}

/// Serialized shape of an exported session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionExport {
    /// The exported session record
    pub session: Session,
    /// The session's message log at export time
    pub messages: Vec<Message>,
}

/// Render a session and its messages in the requested format
pub fn export_session(
    session: &Session,
    messages: &[Message],
    format: ExportFormat,
) -> Result<String> {
    match format {
        ExportFormat::Json => {
            let export = SessionExport {
                session: session.clone(),
                messages: messages.to_vec(),
            };
            Ok(serde_json::to_string_pretty(&export)?)
        }
        ExportFormat::Markdown => Ok(render_markdown(session, messages)),
        ExportFormat::Text => Ok(render_text(session, messages)),
    }
}

/// Parse a JSON export, regenerating all ids
///
/// Content, roles, statuses, metadata, and timestamps are preserved; the
/// session id and every message id are replaced and messages are rewired
/// to the fresh session id.
///
/// # Errors
///
/// Returns `ChatStoreError::Export` when the payload is not a valid
/// session export.
pub fn import_session_json(json: &str) -> Result<(Session, Vec<Message>)> {
    let export: SessionExport = serde_json::from_str(json)
        .map_err(|e| ChatStoreError::Export(format!("invalid session export: {}", e)))?;

    let mut session = export.session;
    session.id = new_session_id();

    let mut messages = export.messages;
    for message in &mut messages {
        message.id = new_message_id();
        message.session_id = session.id.clone();
    }

    Ok((session, messages))
}

fn render_markdown(session: &Session, messages: &[Message]) -> String {
    let mut out = String::new();
    out.push_str(&format!("# {}\n\n", session.title));
    out.push_str(&format!(
        "- Type: {}\n- Created: {}\n- Messages: {}\n- Tokens: {}\n\n",
        session.session_type,
        session.created_at.to_rfc3339(),
        messages.len(),
        session.total_tokens,
    ));

    for message in messages {
        out.push_str(&format!(
            "## {} ({})\n\n{}\n\n",
            message.role,
            message.timestamp.to_rfc3339(),
            message.content,
        ));
    }

    out
}

fn render_text(session: &Session, messages: &[Message]) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n{}\n\n", session.title, "=".repeat(session.title.len())));

    for message in messages {
        out.push_str(&format!(
            "[{}] {}: {}\n",
            message.timestamp.to_rfc3339(),
            message.role,
            message.content,
        ));
    }

    out
}
