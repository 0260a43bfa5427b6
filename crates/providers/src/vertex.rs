//! Vertex AI adapter.
//!
//! Speaks the same `generateContent`/`streamGenerateContent` wire format as
//! [`crate::google`] but against the regional Vertex AI endpoint, addressed
//! by GCP project/location rather than an API key in the URL.
//!
//! Vertex normally authenticates via Application Default Credentials; minting
//! ADC tokens is out of scope here, so the bearer token is read from the
//! configured [`AuthConfig`] (`env` or `key`) the same way every other
//! provider resolves its credential — callers export a short-lived access
//! token (e.g. the output of `gcloud auth print-access-token`) into that
//! variable themselves.

use crate::google::{parse_gemini_response, parse_gemini_sse_data};
use crate::traits::{ChatRequest, ChatResponse, EmbeddingsRequest, EmbeddingsResponse, LlmProvider};
use crate::util::{from_reqwest, resolve_api_key};
use codeagent_domain::capability::LlmCapabilities;
use codeagent_domain::config::ProviderConfig;
use codeagent_domain::error::{Error, Result};
use codeagent_domain::stream::{BoxStream, StreamEvent};
use serde_json::Value;

pub struct VertexProvider {
    id: String,
    project: String,
    location: String,
    access_token: String,
    default_model: String,
    capabilities: LlmCapabilities,
    client: reqwest::Client,
}

impl VertexProvider {
    pub fn from_config(cfg: &ProviderConfig) -> Result<Self> {
        let project = cfg
            .project
            .clone()
            .ok_or_else(|| Error::Config("Vertex AI provider requires 'project'".into()))?;
        let location = cfg.location.clone().unwrap_or_else(|| "us-central1".into());
        let access_token = resolve_api_key(&cfg.auth)?;

        let capabilities = LlmCapabilities {
            supports_tools: codeagent_domain::capability::ToolSupport::Basic,
            supports_streaming: true,
            supports_json_mode: true,
            supports_vision: true,
            context_window_tokens: Some(1_000_000),
            max_output_tokens: Some(8_192),
        };

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            id: cfg.id.clone(),
            project,
            location,
            access_token,
            default_model: cfg.default_model.clone(),
            capabilities,
            client,
        })
    }

    fn base_url(&self) -> String {
        format!(
            "https://{}-aiplatform.googleapis.com/v1/projects/{}/locations/{}/publishers/google/models",
            self.location, self.project, self.location
        )
    }

    fn generate_url(&self, model: &str) -> String {
        format!("{}/{}:generateContent", self.base_url(), model)
    }

    fn stream_url(&self, model: &str) -> String {
        format!("{}/{}:streamGenerateContent?alt=sse", self.base_url(), model)
    }

    /// Vertex shares Gemini's request body shape; reuse the builder by
    /// delegating through a throwaway [`crate::google::GoogleProvider`]
    /// would require exposing construction internals, so the body is built
    /// inline here using the same field mapping.
    fn build_body(&self, req: &ChatRequest) -> Value {
        crate::google::build_gemini_body(req)
    }
}

#[async_trait::async_trait]
impl LlmProvider for VertexProvider {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse> {
        let model = req.model.clone().unwrap_or_else(|| self.default_model.clone());
        let url = self.generate_url(&model);
        let body = self.build_body(req);

        tracing::debug!(provider = %self.id, url = %url, "vertex chat request");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        let resp_text = resp.text().await.map_err(from_reqwest)?;

        if !status.is_success() {
            return Err(Error::Provider { provider: self.id.clone(), message: format!("HTTP {} - {}", status.as_u16(), resp_text) });
        }

        let resp_json: Value = serde_json::from_str(&resp_text)?;
        parse_gemini_response(&resp_json, &model, &self.id)
    }

    async fn chat_stream(&self, req: &ChatRequest) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        let model = req.model.clone().unwrap_or_else(|| self.default_model.clone());
        let url = self.stream_url(&model);
        let body = self.build_body(req);
        let provider_id = self.id.clone();

        tracing::debug!(provider = %self.id, url = %url, "vertex stream request");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        if !status.is_success() {
            let err_text = resp.text().await.map_err(from_reqwest)?;
            return Err(Error::Provider { provider: provider_id, message: format!("HTTP {} - {}", status.as_u16(), err_text) });
        }

        Ok(crate::sse::sse_response_stream(resp, move |data| parse_gemini_sse_data(data)))
    }

    async fn embeddings(&self, _req: EmbeddingsRequest) -> Result<EmbeddingsResponse> {
        Err(Error::Provider { provider: self.id.clone(), message: "embeddings are not supported on the Vertex AI adapter".into() })
    }

    fn capabilities(&self) -> &LlmCapabilities {
        &self.capabilities
    }

    fn provider_id(&self) -> &str {
        &self.id
    }
}
