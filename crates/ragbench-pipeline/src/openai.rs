//! Blocking client for OpenAI-compatible chat completion endpoints.

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use ragbench_core::config::ExperimentConfig;
use ragbench_core::error::{Error, Result};
use ragbench_core::traits::Generator;
use ragbench_core::types::ChatMessage;

pub const BASE_URL_ENV: &str = "LLM_BASE_URL";
pub const API_KEY_ENV: &str = "LLM_API_KEY";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f64,
    max_tokens: usize,
    n: usize,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAiChatGenerator {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f64,
    max_tokens: usize,
}

impl OpenAiChatGenerator {
    /// `base_url` falls back to `LLM_BASE_URL`, the key always comes from
    /// `LLM_API_KEY`.
    pub fn new(model: impl Into<String>, base_url: Option<String>, timeout: Option<Duration>) -> Result<Self> {
        let base_url = base_url
            .or_else(|| std::env::var(BASE_URL_ENV).ok())
            .ok_or_else(|| Error::config(format!("no LLM endpoint configured; set llm_base_url or {BASE_URL_ENV}")))?;
        let mut builder = reqwest::blocking::Client::builder();
        if let Some(timeout) = timeout { builder = builder.timeout(timeout); }
        let client = builder.build().map_err(|e| Error::config(format!("failed to build http client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty()),
            model: model.into(),
            temperature: 0.7,
            max_tokens: 512,
        })
    }

    /// Answer generator settings from the experiment config.
    pub fn from_config(cfg: &ExperimentConfig) -> Result<Self> {
        Ok(Self::new(&cfg.generation_model, cfg.llm_base_url.clone(), cfg.llm_timeout_secs.map(Duration::from_secs))?
            .with_temperature(cfg.generation_temperature)
            .with_max_tokens(cfg.generation_max_tokens))
    }

    /// Hypothetical-page generator settings from the experiment config.
    pub fn hyde_from_config(cfg: &ExperimentConfig) -> Result<Self> {
        Ok(Self::new(&cfg.generation_model, cfg.llm_base_url.clone(), cfg.llm_timeout_secs.map(Duration::from_secs))?
            .with_temperature(cfg.hyde_temperature)
            .with_max_tokens(cfg.hyde_max_tokens))
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self { self.temperature = temperature; self }
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self { self.max_tokens = max_tokens; self }

    pub fn endpoint(&self) -> String { format!("{}/chat/completions", self.base_url) }
}

impl Generator for OpenAiChatGenerator {
    fn generate(&self, messages: &[ChatMessage]) -> anyhow::Result<String> {
        let body = ChatRequest { model: &self.model, messages, temperature: self.temperature, max_tokens: self.max_tokens, n: 1 };
        let mut request = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = &self.api_key { request = request.bearer_auth(key); }

        let response = request.send().with_context(|| format!("request to {} failed", self.endpoint()))?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().unwrap_or_default();
            return Err(anyhow!("chat completion returned {status}: {detail}"));
        }
        let parsed: ChatResponse = response.json().context("malformed chat completion response")?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("chat completion returned no choices"))?
            .message
            .content
            .unwrap_or_default();
        debug!(model = %self.model, chars = content.len(), "chat completion");
        Ok(content)
    }
}
