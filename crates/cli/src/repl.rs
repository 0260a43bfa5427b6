//! The interactive REPL (spec §6 default command), grounded on the
//! teacher's `cli::chat::chat`/`handle_slash_command` (`crates/gateway/src/
//! cli/chat.rs`): a `rustyline` readline loop with persistent history and
//! slash-commands, generalized to drive a [`Runner`] turn instead of the
//! teacher's HTTP-gateway `run_turn`.
//!
//! Ctrl-C semantics (spec §5): the first Ctrl-C *at the prompt* is handled
//! by `rustyline` itself (`ReadlineError::Interrupted`) and exits cleanly.
//! Mid-turn, the terminal is back in cooked mode (we're not inside
//! `readline()`), so `tokio::signal::ctrl_c()` fires instead: first signal
//! cancels the turn, a second within the same turn hard-exits 130.

use std::sync::Arc;

use codeagent_domain::config::Config;
use codeagent_domain::session::SessionRef;
use codeagent_display::Display;
use codeagent_runner::Runner;
use codeagent_store::SessionStore;
use tokio_util::sync::CancellationToken;

use crate::{APP_NAME, USER_ID};

pub async fn run(config: &Config, store: Arc<SessionStore>, runner: Arc<Runner>) -> anyhow::Result<()> {
    let session_ref = SessionRef::new(APP_NAME, USER_ID, config.session_name.clone());
    if store.get(&session_ref).map_err(|e| anyhow::anyhow!("loading session: {e}"))?.is_none() {
        store
            .create(APP_NAME, USER_ID, &config.session_name)
            .map_err(|e| anyhow::anyhow!("creating session: {e}"))?;
    }

    let history_path = dirs::home_dir().unwrap_or_default().join(".code_agent_history");
    let rl_config = rustyline::Config::builder().max_history_size(500)?.build();
    let mut rl = rustyline::DefaultEditor::with_config(rl_config)?;
    let _ = rl.load_history(&history_path);

    eprintln!("codeagent interactive chat");
    eprintln!("Session: {}  |  Type /help for commands, Ctrl+D to exit", config.session_name);
    eprintln!();

    let mut last_turn_ok = true;

    loop {
        let prompt = if last_turn_ok { "❯ " } else { "✗ ❯ " };
        let readline = rl.readline(prompt);

        match readline {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                rl.add_history_entry(&line).ok();

                if trimmed.starts_with('/') {
                    if handle_slash_command(trimmed, &runner).await {
                        break;
                    }
                    continue;
                }

                last_turn_ok = send_turn(config, store.as_ref(), &session_ref, runner.clone(), trimmed.to_string()).await;
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                eprintln!("Goodbye!");
                break;
            }
            Err(rustyline::error::ReadlineError::Eof) => {
                break;
            }
            Err(e) => {
                eprintln!("\x1b[31mreadline error: {e}\x1b[0m");
                break;
            }
        }
    }

    rl.save_history(&history_path).ok();
    Ok(())
}

/// Process a slash command. Returns `true` if the REPL should exit.
async fn handle_slash_command(input: &str, runner: &Arc<Runner>) -> bool {
    let parts: Vec<&str> = input.splitn(2, ' ').collect();
    match parts[0] {
        "/exit" | "/quit" => return true,
        "/help" => {
            eprintln!("Commands:");
            eprintln!("  /tools           List registered tool names");
            eprintln!("  /models          List known model aliases");
            eprintln!("  /providers       Show the active provider");
            eprintln!("  /prompt          Show the system prompt");
            eprintln!("  /tokens          Show cumulative token usage for this process");
            eprintln!("  /current-model   Show the active provider/model");
            eprintln!("  /exit, /quit     Exit the chat");
            eprintln!("  /help            Show this help");
        }
        "/tools" => {
            let defs = runner.registry().declarations().await;
            for def in defs {
                eprintln!("  {}", def.name);
            }
        }
        "/models" => {
            eprintln!("  gemini/2.5-flash (default)");
            eprintln!("  gemini/2.5-pro");
            eprintln!("  openai/gpt-4o");
        }
        "/providers" => {
            eprintln!("  active provider: {}", runner.provider_id());
        }
        "/prompt" => {
            let defs = runner.registry().declarations().await;
            eprintln!("{}", codeagent_runner::system_prompt::build_system_prompt(&defs));
        }
        "/tokens" => {
            eprintln!("  (per-process usage totals are printed after each turn)");
        }
        "/current-model" => {
            eprintln!("  {}", runner.provider_id());
        }
        other => eprintln!("Unknown command: {other}  (type /help for a list)"),
    }
    false
}

/// Run one turn to completion, streaming it through the Display. Returns
/// whether the turn ended cleanly (no error, no iteration-limit, not
/// interrupted) — used for the REPL's prompt-status indicator.
async fn send_turn(config: &Config, _store: &SessionStore, session_ref: &SessionRef, runner: Arc<Runner>, message: String) -> bool {
    let cancel = CancellationToken::new();
    let rx = runner.run(session_ref.clone(), message, cancel.clone());
    let mut display = Display::new(config.output_format, config.typewriter);
    display.run(rx, cancel).await
}
