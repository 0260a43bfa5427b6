//! The turn loop (spec §4.1) — the Runner's core orchestrator.
//!
//! Grounded on the teacher's `runtime::turn::run_turn`/`run_turn_inner`
//! (`crates/gateway/src/runtime/turn.rs`): one user message in, a bounded
//! streaming tool-call loop, ordered events out. The HTTP/SSE-channel
//! plumbing, run-store bookkeeping (`RunNode`/`RunEvent`), quota checks, and
//! memory auto-capture are teacher-specific and have no counterpart here;
//! what's kept is the shape of the loop itself — stream the model's reply,
//! assemble any tool calls, dispatch them sequentially, persist, repeat.

use std::sync::Arc;
use std::time::Duration;

use codeagent_domain::error::Error as DomainError;
use codeagent_domain::event::Event;
use codeagent_domain::session::SessionRef;
use codeagent_domain::stream::{StreamEvent, Usage};
use codeagent_domain::tool::ToolCall;
use codeagent_providers::{ChatRequest, LlmProvider};
use codeagent_store::SessionStore;
use codeagent_tools::{ToolContext, ToolRegistry};
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::messages::{build_assistant_event, events_to_messages};
use crate::system_prompt::build_system_prompt;

/// Maximum number of adapter retries for a transient error before the turn
/// fails (spec §4.1.4: "Retry transient network errors up to 3 times").
const MAX_RETRIES: u32 = 3;
/// Base delay for the retry backoff: `250ms * 2^n`, jittered.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(250);

/// One event in the ordered stream the Runner produces for a turn (spec
/// §4.1 contract: "stream of (Event, error)", §4.5 "Display Pipeline" is the
/// consumer). `Serialize` backs the `--output-format=json` mode, one object
/// per event.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunnerEvent {
    /// The user's message, echoed back once it's persisted.
    User { text: String },
    /// A streamed text delta. UI-only — never persisted on its own.
    Partial { text: String },
    /// A streamed reasoning/thinking delta.
    Thinking { text: String },
    /// The finalised model event for this iteration, already persisted.
    ModelFinal { text: String, tool_calls: Vec<ToolCall> },
    /// A tool is about to run.
    ToolCall { call_id: String, tool_name: String, arguments: serde_json::Value },
    /// A tool finished running.
    ToolResult { call_id: String, tool_name: String, result: serde_json::Value, is_error: bool },
    /// The turn ended normally with a final answer.
    Done { text: String, usage: Usage },
    /// The turn loop hit `max_iterations` without producing a final answer.
    IterationLimit,
    /// The turn was cancelled; `partial_text` is whatever had streamed so far.
    Interrupted { partial_text: String },
    /// A terminal, non-retriable error.
    Error { code: &'static str, message: String },
}

/// Drives one user turn against a session: reconstructs history, streams the
/// model, dispatches tool calls, persists every event, and emits an ordered
/// [`RunnerEvent`] stream.
pub struct Runner {
    store: Arc<SessionStore>,
    registry: Arc<ToolRegistry>,
    provider: Arc<dyn LlmProvider>,
    max_iterations: u32,
    workspace_root: std::path::PathBuf,
}

impl Runner {
    pub fn new(
        store: Arc<SessionStore>,
        registry: Arc<ToolRegistry>,
        provider: Arc<dyn LlmProvider>,
        max_iterations: u32,
        workspace_root: std::path::PathBuf,
    ) -> Self {
        Self { store, registry, provider, max_iterations, workspace_root }
    }

    /// The live Tool Registry, for REPL introspection commands (`/tools`,
    /// `/prompt`).
    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// The active provider's identifier, for `/providers`/`/current-model`.
    pub fn provider_id(&self) -> &str {
        self.provider.provider_id()
    }

    /// Spawn one turn as a background task and hand back the channel it
    /// streams [`RunnerEvent`]s on (spec §4.1: `Run(ctx, sessionRef,
    /// userMessage) → stream of (Event, error)`). Exactly one call should be
    /// in flight per session at a time; enforcing that is the caller's
    /// responsibility (the CLI serializes turns through its REPL loop).
    pub fn run(self: Arc<Self>, session_ref: SessionRef, user_message: String, cancel: CancellationToken) -> tokio::sync::mpsc::Receiver<RunnerEvent> {
        let (tx, rx) = tokio::sync::mpsc::channel(64);
        tokio::spawn(async move {
            self.run_turn(tx, session_ref, user_message, cancel).await;
        });
        rx
    }

    async fn run_turn(
        self: Arc<Self>,
        tx: tokio::sync::mpsc::Sender<RunnerEvent>,
        session_ref: SessionRef,
        user_message: String,
        cancel: CancellationToken,
    ) {
        let invocation_id = uuid::Uuid::new_v4().to_string();

        // ── Persist + emit the user event ──────────────────────────────
        let user_event = Event::user_text(invocation_id.as_str(), user_message.as_str());
        if let Err(e) = self.store.append_event(&session_ref, &user_event) {
            let _ = tx.send(RunnerEvent::Error { code: "store_error", message: e.to_string() }).await;
            return;
        }
        let _ = tx.send(RunnerEvent::User { text: user_message.clone() }).await;

        // ── Reconstruct history (spec §4.1.2a) ──────────────────────────
        let mut messages = match self.store.get(&session_ref) {
            Ok(Some(loaded)) => events_to_messages(&loaded.events),
            Ok(None) => {
                let _ = tx
                    .send(RunnerEvent::Error { code: "store_error", message: format!("no such session: {}", session_ref.session_id) })
                    .await;
                return;
            }
            Err(e) => {
                let _ = tx.send(RunnerEvent::Error { code: "store_error", message: e.to_string() }).await;
                return;
            }
        };

        let tool_defs = self.registry.declarations().await;
        let system_prompt = build_system_prompt(&tool_defs);
        messages.insert(0, codeagent_domain::tool::Message::system(system_prompt));

        let mut total_usage = Usage { prompt_tokens: 0, completion_tokens: 0, total_tokens: 0 };

        for iteration in 0..self.max_iterations {
            if cancel.is_cancelled() {
                self.emit_interrupted(&tx, &session_ref, &invocation_id, String::new()).await;
                return;
            }

            let req = ChatRequest {
                messages: messages.clone(),
                tools: tool_defs.clone(),
                temperature: Some(0.2),
                max_tokens: None,
                json_mode: false,
                model: None,
            };

            let stream_result = self.chat_stream_with_retry(&req, &cancel).await;
            let mut stream = match stream_result {
                Ok(s) => s,
                Err(e) => {
                    let _ = tx.send(RunnerEvent::Error { code: e.code(), message: e.to_string() }).await;
                    return;
                }
            };

            let mut text_buf = String::new();
            let mut tool_calls: Vec<ToolCall> = Vec::new();
            // Ordered by first appearance (spec.md:54 Invariant 1's total-order
            // guarantee) -- a `HashMap` here would let tool calls that never
            // receive a `ToolCallFinished` event land in the drained list in
            // arbitrary order.
            let mut tc_bufs: Vec<(String, String, String)> = Vec::new();
            let mut turn_usage: Option<Usage> = None;
            let mut was_cancelled = false;

            loop {
                let next = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => { was_cancelled = true; None }
                    event = stream.next() => event,
                };
                let Some(event_result) = next else { break };
                if was_cancelled {
                    break;
                }

                let event = match event_result {
                    Ok(e) => e,
                    Err(e) => {
                        let _ = tx.send(RunnerEvent::Error { code: e.code(), message: e.to_string() }).await;
                        return;
                    }
                };

                match event {
                    StreamEvent::Token { text } => {
                        let _ = tx.send(RunnerEvent::Partial { text: text.clone() }).await;
                        text_buf.push_str(&text);
                    }
                    StreamEvent::Thinking { text } => {
                        let _ = tx.send(RunnerEvent::Thinking { text }).await;
                    }
                    StreamEvent::ToolCallStarted { call_id, tool_name } => {
                        tc_bufs.push((call_id, tool_name, String::new()));
                    }
                    StreamEvent::ToolCallDelta { call_id, delta } => {
                        if let Some((_, _, args)) = tc_bufs.iter_mut().find(|(id, _, _)| *id == call_id) {
                            args.push_str(&delta);
                        }
                    }
                    StreamEvent::ToolCallFinished { call_id, tool_name, arguments } => {
                        tool_calls.push(ToolCall { call_id: call_id.clone(), tool_name, arguments });
                        tc_bufs.retain(|(id, _, _)| *id != call_id);
                    }
                    StreamEvent::Done { usage, .. } => turn_usage = usage,
                    StreamEvent::Error { message } => {
                        let _ = tx.send(RunnerEvent::Error { code: "provider_error", message }).await;
                        return;
                    }
                }
            }

            if was_cancelled {
                self.emit_interrupted(&tx, &session_ref, &invocation_id, text_buf).await;
                return;
            }

            for (call_id, tool_name, args_str) in tc_bufs {
                let arguments = if args_str.trim().is_empty() {
                    serde_json::Value::Object(Default::default())
                } else {
                    serde_json::from_str(&args_str).unwrap_or_else(|e| {
                        tracing::warn!(call_id = %call_id, tool = %tool_name, error = %e, "tool call arguments were not valid JSON");
                        serde_json::Value::Object(Default::default())
                    })
                };
                tool_calls.push(ToolCall { call_id, tool_name, arguments });
            }

            if let Some(u) = turn_usage {
                total_usage.prompt_tokens += u.prompt_tokens;
                total_usage.completion_tokens += u.completion_tokens;
                total_usage.total_tokens += u.total_tokens;
            }

            // ── Persist + emit the finalised model event (spec §4.1.2d) ──
            let model_event = build_assistant_event(&invocation_id, &text_buf, &tool_calls);
            if let Err(e) = self.store.append_event(&session_ref, &model_event) {
                let _ = tx.send(RunnerEvent::Error { code: "store_error", message: e.to_string() }).await;
                return;
            }
            let _ = tx.send(RunnerEvent::ModelFinal { text: text_buf.clone(), tool_calls: tool_calls.clone() }).await;
            messages.push(codeagent_domain::tool::Message {
                role: codeagent_domain::tool::Role::Assistant,
                content: event_to_message_content(&model_event),
            });

            // ── No tool calls: this is the final answer (spec §4.1.2e) ──
            if tool_calls.is_empty() {
                let _ = tx.send(RunnerEvent::Done { text: text_buf, usage: total_usage }).await;
                return;
            }

            // ── Tool dispatch, sequential in emission order (spec §4.2) ──
            for tc in &tool_calls {
                if cancel.is_cancelled() {
                    self.emit_interrupted(&tx, &session_ref, &invocation_id, String::new()).await;
                    return;
                }

                let _ = tx
                    .send(RunnerEvent::ToolCall { call_id: tc.call_id.clone(), tool_name: tc.tool_name.clone(), arguments: tc.arguments.clone() })
                    .await;

                let ctx = ToolContext { workspace_root: self.workspace_root.clone(), cancel: cancel.clone() };
                let (result, is_error) = match self.registry.invoke(&tc.tool_name, tc.arguments.clone(), &ctx).await {
                    Ok(value) => {
                        let is_error = value.get("success").and_then(|v| v.as_bool()).map(|ok| !ok).unwrap_or(false);
                        (value, is_error)
                    }
                    Err(DomainError::UnknownTool(name)) => {
                        (serde_json::json!({ "success": false, "error": format!("unknown tool: {name}") }), true)
                    }
                    Err(e) => (serde_json::json!({ "success": false, "error": e.to_string() }), true),
                };

                let mut tool_event = Event::new(invocation_id.as_str(), format!("tool:{}", tc.tool_name));
                tool_event.content.push(codeagent_domain::event::EventPart::ToolResult { call_id: tc.call_id.clone(), payload: result.clone() });
                if let Err(e) = self.store.append_event(&session_ref, &tool_event) {
                    let _ = tx.send(RunnerEvent::Error { code: "store_error", message: e.to_string() }).await;
                    return;
                }

                let _ = tx
                    .send(RunnerEvent::ToolResult { call_id: tc.call_id.clone(), tool_name: tc.tool_name.clone(), result: result.clone(), is_error })
                    .await;

                messages.push(codeagent_domain::tool::Message::tool_result(tc.call_id.clone(), payload_text(&result)));
            }

            if iteration + 1 == self.max_iterations {
                let _ = tx.send(RunnerEvent::IterationLimit).await;
                return;
            }
        }
    }

    async fn emit_interrupted(&self, tx: &tokio::sync::mpsc::Sender<RunnerEvent>, session_ref: &SessionRef, invocation_id: &str, partial_text: String) {
        let mut event = Event::new(invocation_id, "model");
        if !partial_text.is_empty() {
            event.content.push(codeagent_domain::event::EventPart::Text { text: partial_text.clone() });
        }
        event.interrupted = true;
        if let Err(e) = self.store.append_event(session_ref, &event) {
            tracing::warn!(error = %e, "failed to persist interrupted event");
        }
        let _ = tx.send(RunnerEvent::Interrupted { partial_text }).await;
    }

    /// Open a streaming chat call, retrying transient errors up to
    /// [`MAX_RETRIES`] times with jittered exponential backoff (spec
    /// §4.1.4).
    async fn chat_stream_with_retry(
        &self,
        req: &ChatRequest,
        cancel: &CancellationToken,
    ) -> Result<codeagent_domain::stream::BoxStream<'static, codeagent_domain::error::Result<StreamEvent>>, DomainError> {
        let mut attempt = 0;
        loop {
            match self.provider.chat_stream(req).await {
                Ok(stream) => return Ok(stream),
                Err(e) if e.is_retriable() && attempt < MAX_RETRIES => {
                    attempt += 1;
                    let jitter = rand::random::<u64>() % 100;
                    let delay = RETRY_BASE_DELAY * 2u32.pow(attempt - 1) + Duration::from_millis(jitter);
                    tracing::warn!(attempt, error = %e, "retrying transient provider error");
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancel.cancelled() => return Err(DomainError::Interrupted),
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn event_to_message_content(event: &Event) -> codeagent_domain::tool::MessageContent {
    use codeagent_domain::event::EventPart;
    use codeagent_domain::tool::ContentPart;

    let parts: Vec<ContentPart> = event
        .content
        .iter()
        .filter_map(|p| match p {
            EventPart::Text { text } => Some(ContentPart::Text { text: text.clone() }),
            EventPart::ToolCall { call_id, name, args } => Some(ContentPart::ToolUse { id: call_id.clone(), name: name.clone(), input: args.clone() }),
            _ => None,
        })
        .collect();
    codeagent_domain::tool::MessageContent::Parts(parts)
}

fn payload_text(payload: &serde_json::Value) -> String {
    match payload.as_str() {
        Some(s) => s.to_string(),
        None => payload.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeagent_domain::capability::LlmCapabilities;
    use codeagent_domain::error::Result as DomainResult;
    use codeagent_domain::stream::BoxStream;
    use codeagent_providers::{ChatResponse, EmbeddingsRequest, EmbeddingsResponse};
    use codeagent_tools::{ToolHandler, ToolRegistry};
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// Scripted provider: returns one canned stream of [`StreamEvent`]s per
    /// call, in order, looping the last one if called more times than
    /// scripted (so a test doesn't have to script every iteration).
    struct ScriptedProvider {
        capabilities: LlmCapabilities,
        scripts: Mutex<Vec<Vec<StreamEvent>>>,
    }

    impl ScriptedProvider {
        fn new(scripts: Vec<Vec<StreamEvent>>) -> Self {
            Self { capabilities: LlmCapabilities::default(), scripts: Mutex::new(scripts) }
        }
    }

    #[async_trait::async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn chat(&self, _req: &ChatRequest) -> DomainResult<ChatResponse> {
            unimplemented!("turn loop only uses chat_stream")
        }

        async fn chat_stream(&self, _req: &ChatRequest) -> DomainResult<BoxStream<'static, DomainResult<StreamEvent>>> {
            let mut scripts = self.scripts.lock().unwrap();
            let next = if scripts.len() > 1 { scripts.remove(0) } else { scripts[0].clone() };
            Ok(Box::pin(futures_util::stream::iter(next.into_iter().map(Ok))))
        }

        async fn embeddings(&self, _req: EmbeddingsRequest) -> DomainResult<EmbeddingsResponse> {
            unimplemented!()
        }

        fn capabilities(&self) -> &LlmCapabilities {
            &self.capabilities
        }

        fn provider_id(&self) -> &str {
            "scripted"
        }
    }

    struct EchoTool;

    #[async_trait::async_trait]
    impl ToolHandler for EchoTool {
        fn definition(&self) -> codeagent_domain::tool::ToolDefinition {
            codeagent_domain::tool::ToolDefinition {
                name: "echo".into(),
                description: "echoes its input".into(),
                parameters: serde_json::json!({"type": "object"}),
                category: codeagent_domain::tool::ToolCategory::Workspace,
                priority: 0,
                usage_hint: "echo back whatever you send it".into(),
            }
        }

        async fn invoke(&self, args: serde_json::Value, _ctx: &ToolContext) -> serde_json::Value {
            serde_json::json!({ "success": true, "echoed": args })
        }
    }

    fn test_runner(scripts: Vec<Vec<StreamEvent>>) -> (Arc<Runner>, Arc<SessionStore>, SessionRef) {
        let store = Arc::new(SessionStore::open_in_memory().unwrap());
        let session_ref = SessionRef::new("app", "user", "s1");
        store.create(&session_ref.app_name, &session_ref.user_id, &session_ref.session_id).unwrap();

        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool)).unwrap();

        let provider: Arc<dyn LlmProvider> = Arc::new(ScriptedProvider::new(scripts));
        let runner = Arc::new(Runner::new(store.clone(), Arc::new(registry), provider, 25, PathBuf::from("/tmp")));
        (runner, store, session_ref)
    }

    async fn drain(mut rx: tokio::sync::mpsc::Receiver<RunnerEvent>) -> Vec<RunnerEvent> {
        let mut events = Vec::new();
        while let Some(e) = rx.recv().await {
            events.push(e);
        }
        events
    }

    #[tokio::test]
    async fn plain_text_reply_completes_without_tool_calls() {
        let (runner, store, session_ref) = test_runner(vec![vec![
            StreamEvent::Token { text: "hello ".into() },
            StreamEvent::Token { text: "world".into() },
            StreamEvent::Done { usage: None, finish_reason: Some("stop".into()) },
        ]]);

        let rx = runner.clone().run(session_ref.clone(), "hi".into(), CancellationToken::new());
        let events = drain(rx).await;

        assert!(matches!(events.first(), Some(RunnerEvent::User { text }) if text == "hi"));
        assert!(events.iter().any(|e| matches!(e, RunnerEvent::Partial { text } if text == "hello ")));
        assert!(matches!(events.last(), Some(RunnerEvent::Done { text, .. }) if text == "hello world"));

        let loaded = store.get(&session_ref).unwrap().unwrap();
        assert_eq!(loaded.events.len(), 2); // user + final model event
    }

    #[tokio::test]
    async fn tool_call_is_dispatched_and_result_fed_back() {
        let (runner, store, session_ref) = test_runner(vec![
            vec![
                StreamEvent::ToolCallStarted { call_id: "c1".into(), tool_name: "echo".into() },
                StreamEvent::ToolCallFinished { call_id: "c1".into(), tool_name: "echo".into(), arguments: serde_json::json!({"x": 1}) },
                StreamEvent::Done { usage: None, finish_reason: Some("tool_calls".into()) },
            ],
            vec![
                StreamEvent::Token { text: "done".into() },
                StreamEvent::Done { usage: None, finish_reason: Some("stop".into()) },
            ],
        ]);

        let rx = runner.clone().run(session_ref.clone(), "use echo".into(), CancellationToken::new());
        let events = drain(rx).await;

        let tool_call = events.iter().find(|e| matches!(e, RunnerEvent::ToolCall { .. }));
        assert!(tool_call.is_some());
        let tool_result = events.iter().find_map(|e| match e {
            RunnerEvent::ToolResult { result, is_error, .. } => Some((result.clone(), *is_error)),
            _ => None,
        });
        assert_eq!(tool_result, Some((serde_json::json!({"success": true, "echoed": {"x": 1}}), false)));
        assert!(matches!(events.last(), Some(RunnerEvent::Done { text, .. }) if text == "done"));

        // user + model(tool_call) + tool_result + model(final)
        let loaded = store.get(&session_ref).unwrap().unwrap();
        assert_eq!(loaded.events.len(), 4);
    }

    #[tokio::test]
    async fn iteration_limit_emits_terminal_event() {
        let (runner, _store, session_ref) = test_runner(vec![vec![
            StreamEvent::ToolCallStarted { call_id: "c1".into(), tool_name: "echo".into() },
            StreamEvent::ToolCallFinished { call_id: "c1".into(), tool_name: "echo".into(), arguments: serde_json::json!({}) },
            StreamEvent::Done { usage: None, finish_reason: Some("tool_calls".into()) },
        ]]);

        let rx = runner.clone().run(session_ref.clone(), "loop forever".into(), CancellationToken::new());
        let events = drain(rx).await;

        assert!(matches!(events.last(), Some(RunnerEvent::IterationLimit)));
    }
}
