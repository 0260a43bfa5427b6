//! `codeagent` — the CLI binary (spec §6), the composition root that wires
//! the Session Store, Tool Registry, Provider Adapter, Runner, and Display
//! Pipeline together and owns the REPL / session-management subcommands.
//!
//! Trimmed from the teacher's `gateway/main.rs`: there is no axum server,
//! CORS layer, or background-task scheduler to start — a CLI agent has no
//! long-lived process beyond the one REPL it's driving.

mod cli;
mod compose;
mod repl;
mod session_cmds;

use clap::Parser;

/// `(app_name, user_id)` this process addresses every session under. A
/// single-user CLI has no multi-tenant identity to resolve, so both are
/// fixed constants rather than flags.
pub const APP_NAME: &str = "codeagent";
pub const USER_ID: &str = "local";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = cli::Cli::parse();
    let config = cli::resolve_config(&cli)?;

    match &cli.command {
        Some(cli::Command::NewSession { name }) => {
            let app = compose::build(&config).await?;
            session_cmds::new_session(&app.store, name)
        }
        Some(cli::Command::ListSessions) => {
            let app = compose::build(&config).await?;
            session_cmds::list_sessions(&app.store)
        }
        Some(cli::Command::DeleteSession { name }) => {
            let app = compose::build(&config).await?;
            session_cmds::delete_session(&app.store, name)
        }
        None => {
            let app = compose::build(&config).await?;
            repl::run(&config, app.store, app.runner).await
        }
    }
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,codeagent=debug")))
        .with_writer(std::io::stderr)
        .init();
}
