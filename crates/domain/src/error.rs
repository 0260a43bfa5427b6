//! Shared error taxonomy.
//!
//! Every variant corresponds to one of the error codes named in the kernel's
//! error-handling design: argument-class tool errors, registry-level errors,
//! adapter/provider errors, and store errors. `code()` returns the stable
//! string surfaced on events and CLI output.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("path traversal rejected: {0}")]
    PathTraversal(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("execution failed: {0}")]
    Execution(String),

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("schema violation: {0}")]
    SchemaViolation(String),

    #[error("api key: {0}")]
    ApiKey(String),

    #[error("model not found: {0}")]
    ModelNotFound(String),

    #[error("provider {provider}: {message}")]
    Provider { provider: String, message: String },

    #[error("iteration limit reached")]
    IterationLimit,

    #[error("interrupted")]
    Interrupted,

    #[error("store: {0}")]
    Store(String),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("config: {0}")]
    Config(String),

    #[error("auth: {0}")]
    Auth(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Stable error code as named in the kernel's error taxonomy (spec §7).
    pub fn code(&self) -> &'static str {
        match self {
            Error::Io(_) => "io_error",
            Error::Json(_) => "json_error",
            Error::FileNotFound(_) => "file_not_found",
            Error::PathTraversal(_) => "path_traversal",
            Error::InvalidInput(_) => "invalid_input",
            Error::Execution(_) => "execution",
            Error::UnknownTool(_) => "unknown_tool",
            Error::SchemaViolation(_) => "schema_violation",
            Error::ApiKey(_) => "api_key",
            Error::ModelNotFound(_) => "model_not_found",
            Error::Provider { .. } => "provider_error",
            Error::IterationLimit => "iteration_limit",
            Error::Interrupted => "interrupted",
            Error::Store(_) => "store_error",
            Error::Http(_) => "http_error",
            Error::Timeout(_) => "timeout",
            Error::Config(_) => "config_error",
            Error::Auth(_) => "auth_error",
            Error::Other(_) => "other",
        }
    }

    /// Whether the adapter's backoff loop should retry this error: network
    /// hiccups and 5xx/429-class provider errors are transient, everything
    /// else (auth, bad model, malformed request) is terminal for the turn.
    pub fn is_retriable(&self) -> bool {
        match self {
            Error::Timeout(_) | Error::Http(_) => true,
            Error::Provider { message, .. } => {
                message.contains("429")
                    || message.contains("500")
                    || message.contains("502")
                    || message.contains("503")
                    || message.contains("504")
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_5xx_is_retriable() {
        let e = Error::Provider {
            provider: "google".into(),
            message: "HTTP 503 - overloaded".into(),
        };
        assert!(e.is_retriable());
    }

    #[test]
    fn provider_4xx_auth_is_not_retriable() {
        let e = Error::Provider {
            provider: "google".into(),
            message: "HTTP 401 - invalid key".into(),
        };
        assert!(!e.is_retriable());
    }

    #[test]
    fn codes_match_taxonomy() {
        assert_eq!(Error::UnknownTool("x".into()).code(), "unknown_tool");
        assert_eq!(Error::IterationLimit.code(), "iteration_limit");
        assert_eq!(Error::Interrupted.code(), "interrupted");
    }
}
