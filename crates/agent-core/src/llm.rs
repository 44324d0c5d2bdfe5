use anyhow::Context;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::agent::reasoning::{BoxFuture, LlmClient};

/// Minimal config for an Ollama-style `POST /api/generate` endpoint.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Full endpoint URL, e.g. `http://127.0.0.1:11434/api/generate`.
    pub endpoint: String,
    pub model: String,
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

/// Text-completion client; one HTTP client is reused across calls.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: Client,
    cfg: OllamaConfig,
}

impl OllamaClient {
    pub fn new(cfg: OllamaConfig) -> Self {
        Self {
            http: Client::new(),
            cfg,
        }
    }

    pub async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
        let request = OllamaRequest {
            model: &self.cfg.model,
            prompt,
            stream: false,
        };

        let res = self
            .http
            .post(&self.cfg.endpoint)
            .json(&request)
            .send()
            .await
            .context("ollama request failed")?
            .error_for_status()
            .context("ollama non-2xx response")?
            .json::<OllamaResponse>()
            .await
            .context("ollama response decode failed")?;

        Ok(res.response)
    }
}

impl LlmClient for OllamaClient {
    fn complete<'a>(&'a self, prompt: String) -> BoxFuture<'a, anyhow::Result<String>> {
        Box::pin(async move { self.generate(&prompt).await })
    }
}
