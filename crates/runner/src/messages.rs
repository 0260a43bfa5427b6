//! Reconstruct provider-neutral messages from a session's event log, and
//! build the assistant event that records one model turn.
//!
//! Grounded on the teacher's `runtime::transcript_lines_to_messages` /
//! `build_assistant_tool_message` (`crates/gateway/src/runtime/mod.rs`), adapted
//! from its flat `TranscriptLine{role, content}` shape to the richer
//! `Event`/`EventPart` model (tool_call/tool_result parts instead of a
//! side-channel `metadata.call_id`).

use codeagent_domain::event::{Event, EventPart};
use codeagent_domain::tool::{ContentPart, Message, MessageContent, Role, ToolCall};

/// Convert a session's persisted event log into the message list a provider
/// adapter expects. Partial (streaming-only) events are never persisted, so
/// every event here is already final.
pub fn events_to_messages(events: &[Event]) -> Vec<Message> {
    let mut messages = Vec::new();

    for event in events {
        let role = event.author_role();
        let mut parts = Vec::new();

        for part in &event.content {
            match part {
                EventPart::Text { text } => parts.push(ContentPart::Text { text: text.clone() }),
                EventPart::ToolCall { call_id, name, args } => {
                    parts.push(ContentPart::ToolUse { id: call_id.clone(), name: name.clone(), input: args.clone() })
                }
                EventPart::ToolResult { call_id, payload } => parts.push(ContentPart::ToolResult {
                    tool_use_id: call_id.clone(),
                    content: payload_to_text(payload),
                    is_error: payload.get("success").and_then(|v| v.as_bool()).map(|ok| !ok).unwrap_or(false),
                }),
                EventPart::Thought { .. } => {} // reasoning is never replayed back to the provider
            }
        }

        if parts.is_empty() {
            continue;
        }

        messages.push(Message { role, content: MessageContent::Parts(parts) });
    }

    messages
}

fn payload_to_text(payload: &serde_json::Value) -> String {
    match payload.as_str() {
        Some(s) => s.to_string(),
        None => payload.to_string(),
    }
}

/// Build the assistant event for one finished model turn: accumulated text
/// plus any tool calls it requested, in emission order.
pub fn build_assistant_event(invocation_id: &str, text: &str, tool_calls: &[ToolCall]) -> Event {
    let mut event = Event::new(invocation_id, "model");
    if !text.is_empty() {
        event.content.push(EventPart::Text { text: text.to_string() });
    }
    for tc in tool_calls {
        event.content.push(EventPart::ToolCall {
            call_id: tc.call_id.clone(),
            name: tc.tool_name.clone(),
            args: tc.arguments.clone(),
        });
    }
    event.turn_complete = tool_calls.is_empty();
    event
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeagent_domain::event::UsageMetadata;

    #[test]
    fn user_text_event_becomes_user_message() {
        let e = Event::user_text("inv-1", "hello");
        let msgs = events_to_messages(&[e]);
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].role, Role::User);
        assert_eq!(msgs[0].content.extract_all_text(), "hello");
    }

    #[test]
    fn tool_call_and_result_round_trip_to_parts() {
        let mut model_event = Event::new("inv-1", "model");
        model_event.content.push(EventPart::ToolCall {
            call_id: "c1".into(),
            name: "read_file".into(),
            args: serde_json::json!({"path": "a.rs"}),
        });

        let mut tool_event = Event::new("inv-1", "tool:read_file");
        tool_event.content.push(EventPart::ToolResult {
            call_id: "c1".into(),
            payload: serde_json::json!("file contents"),
        });

        let msgs = events_to_messages(&[model_event, tool_event]);
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].role, Role::Assistant);
        assert_eq!(msgs[1].role, Role::Tool);
    }

    #[test]
    fn empty_usage_event_is_skipped() {
        let mut e = Event::new("inv-1", "model");
        e.usage = Some(UsageMetadata::default());
        let msgs = events_to_messages(&[e]);
        assert!(msgs.is_empty());
    }

    #[test]
    fn build_assistant_event_marks_turn_complete_without_tool_calls() {
        let event = build_assistant_event("inv-1", "done", &[]);
        assert!(event.turn_complete);
        assert_eq!(event.text(), "done");
    }

    #[test]
    fn build_assistant_event_not_complete_with_pending_tool_calls() {
        let tc = ToolCall { call_id: "c1".into(), tool_name: "exec".into(), arguments: serde_json::json!({}) };
        let event = build_assistant_event("inv-1", "", &[tc]);
        assert!(!event.turn_complete);
        assert_eq!(event.tool_call_ids(), vec!["c1"]);
    }
}
