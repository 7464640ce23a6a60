//! Chat-completions client for the AI text service.
//!
//! One request/response call against an OpenAI-compatible gateway. Every
//! failure mode — non-2xx status, malformed JSON, an empty choice list — is
//! a recoverable [`notewell_core::Error::Inference`]; nothing in here is
//! ever fatal to the session.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use notewell_core::{defaults, Error, Result};

/// Default gateway endpoint.
pub const DEFAULT_AI_BASE: &str = "https://ai.gateway.notewell.dev/v1";

/// Connection settings for the AI text service.
#[derive(Debug, Clone)]
pub struct TextServiceConfig {
    /// Base URL up to (not including) `/chat/completions`.
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl TextServiceConfig {
    /// Read settings from the environment.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `NOTEWELL_AI_BASE` | gateway default |
    /// | `NOTEWELL_AI_KEY` | required |
    /// | `NOTEWELL_AI_MODEL` | [`defaults::AI_MODEL`] |
    /// | `NOTEWELL_AI_TIMEOUT_SECS` | [`defaults::AI_TIMEOUT_SECS`] |
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("NOTEWELL_AI_KEY")
            .map_err(|_| Error::Config("NOTEWELL_AI_KEY is not set".into()))?;
        let base_url =
            std::env::var("NOTEWELL_AI_BASE").unwrap_or_else(|_| DEFAULT_AI_BASE.to_string());
        let model =
            std::env::var("NOTEWELL_AI_MODEL").unwrap_or_else(|_| defaults::AI_MODEL.to_string());
        let timeout_secs = std::env::var("NOTEWELL_AI_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults::AI_TIMEOUT_SECS);
        Ok(Self {
            base_url,
            api_key,
            model,
            timeout_secs,
        })
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
    frequency_penalty: f32,
    presence_penalty: f32,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

/// Client for the AI text service.
pub struct TextServiceClient {
    client: Client,
    config: TextServiceConfig,
}

impl TextServiceClient {
    pub fn new(config: TextServiceConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");
        info!(
            base_url = %config.base_url,
            model = %config.model,
            "Initializing AI text service client"
        );
        Self { client, config }
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self::new(TextServiceConfig::from_env()?))
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// One system+user chat completion, returning the assistant text.
    pub async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage { role: "system", content: system },
                ChatMessage { role: "user", content: user },
            ],
            temperature: defaults::AI_TEMPERATURE,
            max_tokens: defaults::AI_MAX_TOKENS,
            top_p: defaults::AI_TOP_P,
            frequency_penalty: defaults::AI_PENALTY,
            presence_penalty: defaults::AI_PENALTY,
        };
        debug!(
            model = %self.config.model,
            prompt_len = user.len(),
            "sending chat completion request"
        );

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Inference(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(status = %status, "AI text service error");
            return Err(Error::Inference(format!("{status}: {body}")));
        }

        let body: ChatResponse = resp
            .json()
            .await
            .map_err(|e| Error::Inference(format!("invalid response: {e}")))?;
        let content = body
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Error::Inference("response contained no choices".into()))?;
        debug!(response_len = content.len(), "chat completion received");
        Ok(content)
    }
}
