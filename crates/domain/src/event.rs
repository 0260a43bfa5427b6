//! The event log data model (spec §3).
//!
//! An [`Event`] is the atomic, immutable unit of session history. Nothing in
//! the teacher codebase models this directly — the closest analogue is
//! `sessions::transcript::TranscriptLine`, an append-only JSONL record, but
//! that's a flat `{role, content}` pair with no call-id correlation, no
//! state-delta actions, and no partial/turn_complete markers. This module is
//! therefore new, built directly from the spec's data model section rather
//! than adapted from an existing file, reusing [`crate::tool`]'s `Role` and
//! `ToolCall`/`ToolDefinition` shapes where they already fit.

use crate::tool::Role;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One part of an event's content. Spec §3: "text, tool_call {name, args,
/// call_id}, tool_result {call_id, payload}, or reasoning/thought text."
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "thought")]
    Thought { text: String },
    #[serde(rename = "tool_call")]
    ToolCall {
        call_id: String,
        name: String,
        args: serde_json::Value,
    },
    #[serde(rename = "tool_result")]
    ToolResult {
        call_id: String,
        payload: serde_json::Value,
    },
}

/// Input/output/thinking token counts attached to a model event.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct UsageMetadata {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub thinking_tokens: u32,
}

/// A state-delta action carried by an event. Keys without a scope prefix
/// target session state; `user:`/`app:`/`temp:` prefixes redirect the update
/// (spec §3 invariant 4, §4.3 "state scopes").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Actions {
    #[serde(default)]
    pub state_delta: HashMap<String, serde_json::Value>,
}

impl Actions {
    pub fn is_empty(&self) -> bool {
        self.state_delta.is_empty()
    }
}

/// Which state table a state-delta key targets, determined by its prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateScope {
    Session,
    User,
    App,
    /// Transient: applied to the in-memory session only, never persisted.
    Temp,
}

/// Split a state-delta key into its scope and the unprefixed key name.
pub fn classify_key(key: &str) -> (StateScope, &str) {
    if let Some(rest) = key.strip_prefix("user:") {
        (StateScope::User, rest)
    } else if let Some(rest) = key.strip_prefix("app:") {
        (StateScope::App, rest)
    } else if let Some(rest) = key.strip_prefix("temp:") {
        (StateScope::Temp, rest)
    } else {
        (StateScope::Session, key)
    }
}

/// The atomic unit of session history (spec §3). Immutable once persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    /// Monotonic within a session, ascending.
    pub timestamp: i64,
    /// Groups all events produced for one user turn.
    pub invocation_id: String,
    /// `user`, a model-agent name, or a tool name.
    pub author: String,
    /// Reserved for future forks; unused today.
    #[serde(default)]
    pub branch: Option<String>,
    pub content: Vec<EventPart>,
    #[serde(default)]
    pub actions: Actions,
    pub partial: bool,
    pub turn_complete: bool,
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub interrupted: bool,
    #[serde(default)]
    pub usage: Option<UsageMetadata>,
}

impl Event {
    pub fn new(invocation_id: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            invocation_id: invocation_id.into(),
            author: author.into(),
            branch: None,
            content: Vec::new(),
            actions: Actions::default(),
            partial: false,
            turn_complete: false,
            error_code: None,
            error_message: None,
            interrupted: false,
            usage: None,
        }
    }

    pub fn user_text(invocation_id: impl Into<String>, text: impl Into<String>) -> Self {
        let mut e = Self::new(invocation_id, "user");
        e.turn_complete = false;
        e.content.push(EventPart::Text { text: text.into() });
        e
    }

    /// All call_ids of tool_call parts in this event's content, in order.
    pub fn tool_call_ids(&self) -> Vec<&str> {
        self.content
            .iter()
            .filter_map(|p| match p {
                EventPart::ToolCall { call_id, .. } => Some(call_id.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Concatenated text content (text parts only, joined with no separator
    /// since text parts accumulate as one streamed message).
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|p| match p {
                EventPart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn author_role(&self) -> Role {
        match self.author.as_str() {
            "user" => Role::User,
            a if a.starts_with("tool") => Role::Tool,
            _ => Role::Assistant,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_key_scopes() {
        assert_eq!(classify_key("foo"), (StateScope::Session, "foo"));
        assert_eq!(classify_key("user:name"), (StateScope::User, "name"));
        assert_eq!(classify_key("app:theme"), (StateScope::App, "theme"));
        assert_eq!(classify_key("temp:scratch"), (StateScope::Temp, "scratch"));
    }

    #[test]
    fn tool_call_ids_extracts_in_order() {
        let mut e = Event::new("inv-1", "model");
        e.content.push(EventPart::Text {
            text: "let me check".into(),
        });
        e.content.push(EventPart::ToolCall {
            call_id: "c1".into(),
            name: "read_file".into(),
            args: serde_json::json!({"path": "a.rs"}),
        });
        e.content.push(EventPart::ToolCall {
            call_id: "c2".into(),
            name: "exec".into(),
            args: serde_json::json!({}),
        });
        assert_eq!(e.tool_call_ids(), vec!["c1", "c2"]);
    }

    #[test]
    fn text_joins_only_text_parts() {
        let mut e = Event::new("inv-1", "model");
        e.content.push(EventPart::Text { text: "42".into() });
        e.content.push(EventPart::ToolCall {
            call_id: "c1".into(),
            name: "x".into(),
            args: serde_json::json!({}),
        });
        e.content.push(EventPart::Text {
            text: " lines".into(),
        });
        assert_eq!(e.text(), "42 lines");
    }

    #[test]
    fn user_text_event_has_single_text_part() {
        let e = Event::user_text("inv-1", "hello");
        assert_eq!(e.text(), "hello");
        assert_eq!(e.author, "user");
    }
}
