//! The Display Pipeline (spec §4.5): a single consumer that drains the
//! Runner's event channel and renders it to the terminal.
//!
//! Grounded on the teacher's `cli::chat::send_message`/`cli::run::run`
//! (`crates/gateway/src/cli/{chat,run}.rs`): both drain a `TurnEvent` receiver
//! and match on variant to decide what goes to stdout vs stderr. This
//! generalizes that match into a stateful pipeline that also owns a spinner
//! and the partial/final text dedup rule the spec adds on top.

use std::io::Write;
use std::time::Duration;

use codeagent_domain::config::OutputFormat;
use codeagent_runner::RunnerEvent;
use crossterm::tty::IsTty;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc::Receiver;

use crate::markdown::{strip_markdown, MarkdownRenderer};

/// Tool names whose result payload is rendered by a dedicated formatter
/// instead of the generic one-line tool-result summary (spec §4.5:
/// "`display_message`/`update_task_list` bypass the generic formatter").
const DISPLAY_MESSAGE_TOOL: &str = "display_message";
const UPDATE_TASK_LIST_TOOL: &str = "update_task_list";

/// Which spinner cadence/colour to use (spec §4.5: "thinking (slower
/// cadence, distinct colour)" vs "tool (normal cadence)"). Passed in at the
/// call site rather than inferred from the message text, since the message
/// itself carries the tool name and varies per call.
enum SpinnerMode {
    Thinking,
    Tool,
}

pub struct Display {
    format: OutputFormat,
    typewriter: bool,
    is_tty: bool,
    markdown: MarkdownRenderer,
    spinner: Option<ProgressBar>,
    /// Whether any `Partial` text has streamed this iteration — once true,
    /// the matching `ModelFinal`'s text is dropped (spec §4.5 dedup rule).
    partial_seen: bool,
}

impl Display {
    pub fn new(format: OutputFormat, typewriter: bool) -> Self {
        Self {
            format,
            typewriter,
            is_tty: std::io::stdout().is_tty(),
            markdown: MarkdownRenderer::new(),
            spinner: None,
            partial_seen: false,
        }
    }

    /// Drain the Runner's event channel to completion, rendering each
    /// event as it arrives, racing a Ctrl-C listener against it (spec §5):
    /// the first Ctrl-C cancels the in-flight turn via `cancel`, letting the
    /// Runner emit its own `Interrupted` terminal event; a second Ctrl-C
    /// before that happens hard-exits the process with code 130. Returns
    /// whether the turn ended cleanly (no error/iteration-limit/interrupt),
    /// for the REPL's prompt-status indicator.
    pub async fn run(&mut self, mut rx: Receiver<RunnerEvent>, cancel: tokio_util::sync::CancellationToken) -> bool {
        if self.format == OutputFormat::Rich {
            self.start_spinner(SpinnerMode::Thinking, "thinking");
        }
        let mut sigint_count = 0u32;
        let mut clean = true;
        loop {
            tokio::select! {
                biased;
                _ = tokio::signal::ctrl_c() => {
                    sigint_count += 1;
                    if sigint_count == 1 {
                        cancel.cancel();
                    } else {
                        std::process::exit(130);
                    }
                }
                event = rx.recv() => {
                    match event {
                        Some(ev) => {
                            if matches!(ev, RunnerEvent::Error { .. } | RunnerEvent::IterationLimit | RunnerEvent::Interrupted { .. }) {
                                clean = false;
                            }
                            self.handle(ev);
                        }
                        None => break,
                    }
                }
            }
        }
        self.stop_spinner();
        if self.format != OutputFormat::Json {
            println!();
        }
        clean
    }

    fn handle(&mut self, event: RunnerEvent) {
        if self.format == OutputFormat::Json {
            if let Ok(line) = serde_json::to_string(&event) {
                println!("{line}");
            }
            return;
        }

        match event {
            RunnerEvent::User { .. } => {}
            RunnerEvent::Partial { text } => {
                self.stop_spinner();
                self.partial_seen = true;
                self.write_stream(&text);
            }
            RunnerEvent::Thinking { .. } => {
                self.start_spinner(SpinnerMode::Thinking, "thinking");
            }
            RunnerEvent::ModelFinal { text, .. } => {
                if !self.partial_seen && !text.is_empty() {
                    self.print_block(&text);
                }
                self.partial_seen = false;
            }
            RunnerEvent::ToolCall { tool_name, arguments, .. } => {
                self.stop_spinner();
                match tool_name.as_str() {
                    DISPLAY_MESSAGE_TOOL | UPDATE_TASK_LIST_TOOL => self.render_markdown_payload(&arguments),
                    _ => self.dim_line(&format!("[tool: {tool_name}]")),
                }
                self.start_spinner(SpinnerMode::Tool, &format!("running {tool_name}"));
            }
            RunnerEvent::ToolResult { tool_name, result, is_error, .. } => {
                self.stop_spinner();
                if tool_name != DISPLAY_MESSAGE_TOOL && tool_name != UPDATE_TASK_LIST_TOOL {
                    self.dim_line(&tool_result_summary(&tool_name, &result, is_error));
                }
            }
            RunnerEvent::Done { usage, .. } => {
                self.stop_spinner();
                self.dim_line(&format!(
                    "-- {} prompt + {} completion tokens --",
                    usage.prompt_tokens, usage.completion_tokens
                ));
            }
            RunnerEvent::IterationLimit => {
                self.stop_spinner();
                eprintln!("\x1b[33m(iteration limit reached — turn stopped)\x1b[0m");
            }
            RunnerEvent::Interrupted { .. } => {
                self.stop_spinner();
                eprintln!("\x1b[33m(interrupted)\x1b[0m");
            }
            RunnerEvent::Error { message, .. } => {
                self.stop_spinner();
                eprintln!("\x1b[31merror: {message}\x1b[0m");
            }
        }
    }

    fn write_stream(&mut self, text: &str) {
        if self.typewriter && self.is_tty {
            for ch in text.chars() {
                print!("{ch}");
                std::io::stdout().flush().ok();
                std::thread::sleep(Duration::from_millis(8));
            }
        } else {
            print!("{text}");
            std::io::stdout().flush().ok();
        }
    }

    fn print_block(&mut self, text: &str) {
        let rendered = if self.is_tty && self.format == OutputFormat::Rich {
            self.markdown.render(text)
        } else {
            strip_markdown(text)
        };
        print!("{rendered}");
        std::io::stdout().flush().ok();
    }

    fn dim_line(&self, line: &str) {
        if self.is_tty {
            eprintln!("\x1b[2m{line}\x1b[0m");
        } else {
            eprintln!("{line}");
        }
    }

    /// `display_message`/`update_task_list` both carry a pre-formatted
    /// `markdown` payload the model already composed — render it as-is
    /// instead of running it through the generic tool-result summary.
    fn render_markdown_payload(&self, arguments: &serde_json::Value) {
        let markdown = arguments.get("markdown").and_then(|v| v.as_str()).unwrap_or("");
        let rendered = if self.is_tty && self.format == OutputFormat::Rich {
            self.markdown.render(markdown)
        } else {
            strip_markdown(markdown)
        };
        println!("\n{rendered}\n");
    }

    fn start_spinner(&mut self, mode: SpinnerMode, message: &str) {
        if !self.is_tty || self.spinner.is_some() {
            if let Some(sp) = &self.spinner {
                sp.set_message(message.to_string());
            }
            return;
        }
        let (template, tick_ms) = match mode {
            SpinnerMode::Thinking => ("{spinner:.yellow} {msg}", 160),
            SpinnerMode::Tool => ("{spinner:.cyan} {msg}", 80),
        };
        let pb = ProgressBar::new_spinner();
        pb.set_style(ProgressStyle::with_template(template).unwrap());
        pb.enable_steady_tick(Duration::from_millis(tick_ms));
        pb.set_message(message.to_string());
        self.spinner = Some(pb);
    }

    fn stop_spinner(&mut self) {
        if let Some(pb) = self.spinner.take() {
            pb.finish_and_clear();
        }
    }
}

fn tool_result_summary(tool_name: &str, result: &serde_json::Value, is_error: bool) -> String {
    let preview = match result.get("error").and_then(|v| v.as_str()) {
        Some(msg) => msg.to_string(),
        None => match result.as_str() {
            Some(s) => s.to_string(),
            None => result.to_string(),
        },
    };
    let truncated = truncate(&preview, 120);
    if is_error {
        format!("[tool: {tool_name}] failed: {truncated}")
    } else {
        format!("[tool: {tool_name}] -> {truncated}")
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max_chars).collect();
    out.push('\u{2026}');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_short_string_is_unchanged() {
        assert_eq!(truncate("hello", 10), "hello");
    }

    #[test]
    fn truncate_long_string_adds_ellipsis() {
        let out = truncate(&"a".repeat(200), 10);
        assert_eq!(out.chars().count(), 11);
        assert!(out.ends_with('\u{2026}'));
    }

    #[test]
    fn tool_result_summary_reports_error_payload() {
        let result = serde_json::json!({"success": false, "error": "file not found"});
        let summary = tool_result_summary("read_file", &result, true);
        assert!(summary.contains("failed"));
        assert!(summary.contains("file not found"));
    }

    #[test]
    fn tool_result_summary_reports_success_text() {
        let result = serde_json::json!("contents of the file");
        let summary = tool_result_summary("read_file", &result, false);
        assert!(summary.contains("contents of the file"));
    }
}
