//! Command-line surface (spec §6): flags, the three session-management
//! subcommands, and the auto-detection chain that resolves them into a
//! [`Config`].
//!
//! Trimmed from the teacher's `gateway/cli/mod.rs` `Cli`/`Command` shape:
//! `Serve`/`Doctor`/`Systemd`/`Import`/`Config(...)` have no counterpart in a
//! CLI-only agent (there is no gateway process to serve or import into), so
//! only the session-management trio survives, replacing `Run`/`Version`
//! with the REPL default and `--output-format=json` respectively.

use codeagent_domain::config::{AuthConfig, Config, McpConfig, OutputFormat, ProviderConfig, ProviderKind};

#[derive(Debug, clap::Parser)]
#[command(name = "codeagent", version, about = "An interactive command-line coding agent")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Resume a named session, or auto-generate `session-YYYYMMDD-HHMMSS`.
    #[arg(long, global = true)]
    pub session: Option<String>,

    /// Session database path.
    #[arg(long, global = true)]
    pub db: Option<std::path::PathBuf>,

    /// Model, as `provider/model` (e.g. `gemini/2.5-flash`, `openai/gpt-4o`).
    #[arg(long, global = true, default_value = "gemini/2.5-flash")]
    pub model: String,

    /// Explicit backend override (`google`, `vertex`, `openai`).
    #[arg(long, global = true)]
    pub backend: Option<String>,

    /// Plaintext API key (prefer the provider's env var instead).
    #[arg(long, global = true)]
    pub api_key: Option<String>,

    /// Vertex AI project id.
    #[arg(long, global = true)]
    pub project: Option<String>,

    /// Vertex AI region.
    #[arg(long, global = true)]
    pub location: Option<String>,

    #[arg(long, global = true, value_enum, default_value = "rich")]
    pub output_format: OutputFormatArg,

    /// Stream model text one character at a time instead of per-chunk.
    #[arg(long, global = true)]
    pub typewriter: bool,

    /// Path to an MCP servers config file (spec §6 `--mcp-config`).
    #[arg(long, global = true)]
    pub mcp_config: Option<std::path::PathBuf>,

    #[arg(long, global = true)]
    pub enable_thinking: bool,

    #[arg(long, global = true)]
    pub thinking_budget: Option<u32>,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum OutputFormatArg {
    Rich,
    Plain,
    Json,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(value: OutputFormatArg) -> Self {
        match value {
            OutputFormatArg::Rich => OutputFormat::Rich,
            OutputFormatArg::Plain => OutputFormat::Plain,
            OutputFormatArg::Json => OutputFormat::Json,
        }
    }
}

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// Create a new, empty session and exit.
    NewSession { name: String },
    /// List every session in the store.
    ListSessions,
    /// Delete a session and all its events.
    DeleteSession { name: String },
}

/// Resolve `cli` into a fully-materialized [`Config`] (spec §6's
/// auto-detection order: explicit `--backend` > `GOOGLE_GENAI_USE_VERTEXAI`
/// > `GOOGLE_API_KEY` set > `GOOGLE_CLOUD_PROJECT` set > default gemini).
pub fn resolve_config(cli: &Cli) -> anyhow::Result<Config> {
    let (provider_prefix, model_id) = match cli.model.split_once('/') {
        Some((prefix, id)) => (Some(prefix), id),
        None => (None, cli.model.as_str()),
    };

    let kind = resolve_backend(cli.backend.as_deref().or(provider_prefix))?;

    let auth = match &cli.api_key {
        Some(key) => AuthConfig { env: None, key: Some(key.clone()) },
        None => AuthConfig::from_env(default_env_var(kind)),
    };

    let provider = ProviderConfig {
        id: "default".into(),
        kind,
        base_url: None,
        auth,
        default_model: model_id.to_string(),
        project: cli.project.clone().or_else(|| std::env::var("GOOGLE_CLOUD_PROJECT").ok()),
        location: cli.location.clone().or_else(|| std::env::var("GOOGLE_CLOUD_LOCATION").ok()),
    };

    let mcp = match &cli.mcp_config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .map_err(|e| anyhow::anyhow!("reading {}: {e}", path.display()))?;
            serde_json::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {}: {e}", path.display()))?
        }
        None => McpConfig::default(),
    };

    let session_name = cli
        .session
        .clone()
        .unwrap_or_else(|| format!("session-{}", chrono::Utc::now().format("%Y%m%d-%H%M%S")));

    let db_path = cli.db.clone().unwrap_or_else(default_db_path);

    Ok(Config {
        session_name,
        db_path,
        provider,
        mcp,
        output_format: cli.output_format.into(),
        typewriter: cli.typewriter,
        enable_thinking: cli.enable_thinking,
        thinking_budget: cli.thinking_budget,
        exec_timeout_secs: 300,
        max_iterations: 25,
    })
}

fn resolve_backend(explicit: Option<&str>) -> anyhow::Result<ProviderKind> {
    if let Some(name) = explicit {
        return parse_backend(name);
    }
    if std::env::var("GOOGLE_GENAI_USE_VERTEXAI").map(|v| v == "true").unwrap_or(false) {
        return Ok(ProviderKind::GoogleVertex);
    }
    if std::env::var("GOOGLE_API_KEY").is_ok() {
        return Ok(ProviderKind::Google);
    }
    if std::env::var("GOOGLE_CLOUD_PROJECT").is_ok() {
        return Ok(ProviderKind::GoogleVertex);
    }
    Ok(ProviderKind::Google)
}

fn parse_backend(name: &str) -> anyhow::Result<ProviderKind> {
    match name {
        "google" | "gemini" => Ok(ProviderKind::Google),
        "vertex" | "google-vertex" | "googlevertex" => Ok(ProviderKind::GoogleVertex),
        "openai" | "openai-compat" => Ok(ProviderKind::OpenaiCompat),
        other => anyhow::bail!("unknown backend '{other}' (expected google, vertex, or openai)"),
    }
}

fn default_env_var(kind: ProviderKind) -> &'static str {
    match kind {
        ProviderKind::Google | ProviderKind::GoogleVertex => "GOOGLE_API_KEY",
        ProviderKind::OpenaiCompat => "OPENAI_API_KEY",
    }
}

fn default_db_path() -> std::path::PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(".code_agent")
        .join("sessions.db")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_backend_accepts_known_aliases() {
        assert!(matches!(parse_backend("gemini").unwrap(), ProviderKind::Google));
        assert!(matches!(parse_backend("vertex").unwrap(), ProviderKind::GoogleVertex));
        assert!(matches!(parse_backend("openai").unwrap(), ProviderKind::OpenaiCompat));
    }

    #[test]
    fn parse_backend_rejects_unknown_name() {
        assert!(parse_backend("llama").is_err());
    }

    #[test]
    fn default_env_var_matches_backend() {
        assert_eq!(default_env_var(ProviderKind::Google), "GOOGLE_API_KEY");
        assert_eq!(default_env_var(ProviderKind::OpenaiCompat), "OPENAI_API_KEY");
    }
}
