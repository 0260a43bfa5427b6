//! Provider construction.
//!
//! The runner always has exactly one resolved [`ProviderConfig`] (there is no
//! role routing or multi-provider fallback chain), so building the active
//! [`LlmProvider`] is a straight dispatch on `kind` rather than a registry of
//! many instances.

use crate::google::GoogleProvider;
use crate::openai_compat::OpenAiCompatProvider;
use crate::traits::LlmProvider;
use crate::vertex::VertexProvider;
use codeagent_domain::config::{ProviderConfig, ProviderKind};
use codeagent_domain::error::Result;
use std::sync::Arc;

/// Construct the configured [`LlmProvider`] adapter.
///
/// Auth is resolved eagerly: the adapter's env var (or plaintext key) is read
/// during construction, so a misconfigured credential fails fast at startup
/// rather than on the first chat request.
pub fn build_provider(cfg: &ProviderConfig) -> Result<Arc<dyn LlmProvider>> {
    let provider: Arc<dyn LlmProvider> = match cfg.kind {
        ProviderKind::Google => Arc::new(GoogleProvider::from_config(cfg).map_err(|e| mask_err(cfg, e))?),
        ProviderKind::GoogleVertex => Arc::new(VertexProvider::from_config(cfg).map_err(|e| mask_err(cfg, e))?),
        ProviderKind::OpenaiCompat => Arc::new(OpenAiCompatProvider::from_config(cfg).map_err(|e| mask_err(cfg, e))?),
    };

    tracing::info!(provider_id = %cfg.id, kind = ?cfg.kind, "initialized LLM provider");
    Ok(provider)
}

fn mask_err(cfg: &ProviderConfig, e: codeagent_domain::error::Error) -> codeagent_domain::error::Error {
    let masked = mask_secrets(&e.to_string());
    tracing::warn!(provider_id = %cfg.id, kind = ?cfg.kind, error = %masked, "failed to initialize LLM provider");
    codeagent_domain::error::Error::Config(masked)
}

/// Mask substrings that look like API keys or bearer tokens in an error
/// message before it reaches logs.
fn mask_secrets(msg: &str) -> String {
    let mut result = msg.to_string();
    for word in msg.split(|c: char| c.is_whitespace() || c == '\'' || c == '"' || c == ',') {
        let trimmed = word.trim();
        if trimmed.len() >= 20 && trimmed.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            let masked = if trimmed.len() > 8 {
                format!("{}...{}", &trimmed[..4], &trimmed[trimmed.len() - 4..])
            } else {
                "***masked***".to_string()
            };
            result = result.replace(trimmed, &masked);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_long_alphanumeric_tokens() {
        let msg = "request failed: key sk-abcdefghijklmnopqrstuvwxyz rejected";
        let masked = mask_secrets(msg);
        assert!(!masked.contains("sk-abcdefghijklmnopqrstuvwxyz"));
        assert!(masked.contains("sk-a"));
    }

    #[test]
    fn leaves_short_words_alone() {
        let msg = "environment variable GOOGLE_API_KEY not set";
        assert_eq!(mask_secrets(msg), msg);
    }

    #[test]
    fn build_provider_reports_missing_auth() {
        let cfg = ProviderConfig {
            id: "test".into(),
            kind: ProviderKind::Google,
            base_url: None,
            auth: Default::default(),
            default_model: "gemini-2.0-flash".into(),
            project: None,
            location: None,
        };
        let err = build_provider(&cfg).unwrap_err();
        assert!(err.to_string().contains("no API key configured"));
    }
}
