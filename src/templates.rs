//! Named session templates
//!
//! A template seeds a new session with a type, configuration, an optional
//! system prompt, and a set of initial messages added verbatim as already
//! received. Registry CRUD is plain keyed storage.

use crate::ids::new_template_id;
use crate::message::MessageRole;
use crate::session::SessionConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One seeded message inside a template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateMessage {
    /// Author role of the seeded message
    pub role: MessageRole,
    /// Seeded content, copied verbatim into the new session
    pub content: String,
}

/// A named preset for creating sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionTemplate {
    /// Unique template identifier (ULID)
    pub id: String,
    /// Display name
    pub name: String,
    /// Optional description shown in pickers
    #[serde(default)]
    pub description: Option<String>,
    /// Session type applied to sessions created from this template
    pub session_type: String,
    /// Configuration applied to the new session
    #[serde(default)]
    pub config: SessionConfig,
    /// System prompt injected into the session config when present
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Messages seeded into the new session as `Received`
    #[serde(default)]
    pub initial_messages: Vec<TemplateMessage>,
}

impl SessionTemplate {
    /// Create a template with a fresh id and empty seed data
    pub fn new(name: impl Into<String>, session_type: impl Into<String>) -> Self {
        Self {
            id: new_template_id(),
            name: name.into(),
            description: None,
            session_type: session_type.into(),
            config: SessionConfig::default(),
            system_prompt: None,
            initial_messages: Vec::new(),
        }
    }

    /// Session config for an instantiation, with the template's system
    /// prompt folded in when present
    pub fn instantiate_config(&self) -> SessionConfig {
        let mut config = self.config.clone();
        if let Some(prompt) = &self.system_prompt {
            config.system_prompt = Some(prompt.clone());
        }
        config
    }
}

/// Keyed storage for session templates
#[derive(Debug, Default)]
pub struct TemplateRegistry {
    templates: HashMap<String, SessionTemplate>,
}

impl TemplateRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a template, returning its id
    pub fn upsert(&mut self, template: SessionTemplate) -> String {
        let id = template.id.clone();
        self.templates.insert(id.clone(), template);
        id
    }

    /// Look up a template by id
    pub fn get(&self, id: &str) -> Option<&SessionTemplate> {
        self.templates.get(id)
    }

    /// Remove a template, returning it when present
    pub fn remove(&mut self, id: &str) -> Option<SessionTemplate> {
        self.templates.remove(id)
    }

    /// Snapshot of all templates, sorted by name
    pub fn list(&self) -> Vec<SessionTemplate> {
        let mut templates: Vec<_> = self.templates.values().cloned().collect();
        templates.sort_by(|a, b| a.name.cmp(&b.name));
        templates
    }

    /// Number of stored templates
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// True when no templates are stored
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
