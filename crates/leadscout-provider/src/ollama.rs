//! Ollama local-inference classifier.
//!
//! https://github.com/ollama/ollama/blob/main/docs/api.md
//!
//! Uses `/api/generate` non-streaming. No API key required.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::{ensure_non_empty, full_prompt, neutral_fallback, normalize_reply, Classification, ClassifyError, IntentClassifier};

const PROVIDER: &str = "ollama";

#[derive(Debug, Clone)]
pub struct OllamaClassifier {
    client: reqwest::Client,
    base_url: String,
    model: String,
    prompt: String,
}

impl OllamaClassifier {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .unwrap_or_default(),
            base_url: base_url.into(),
            model: model.into(),
            prompt: prompt.into(),
        }
    }
}

#[async_trait]
impl IntentClassifier for OllamaClassifier {
    async fn classify(&self, text: &str) -> Result<Classification, ClassifyError> {
        ensure_non_empty(text)?;

        let payload = GenerateRequest {
            model: self.model.clone(),
            prompt: full_prompt(&self.prompt, text),
            stream: false,
        };

        let resp = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&payload)
            .send()
            .await?;

        let status = resp.status();
        if status != StatusCode::OK {
            let message = resp.text().await.unwrap_or_default();
            return Err(ClassifyError::Api {
                provider: PROVIDER,
                status: status.as_u16(),
                message,
            });
        }

        let body: GenerateResponse = resp.json().await.map_err(|e| ClassifyError::Malformed {
            provider: PROVIDER,
            message: e.to_string(),
        })?;

        // Ollama can report failures in-band with a 200.
        if let Some(error) = body.error {
            return Err(ClassifyError::Api {
                provider: PROVIDER,
                status: status.as_u16(),
                message: error,
            });
        }

        Ok(match body.response.as_deref() {
            Some(reply) if !reply.trim().is_empty() => normalize_reply(PROVIDER, reply),
            _ => neutral_fallback(PROVIDER, "response field missing or empty"),
        })
    }
}

// ============================================================
// Ollama API Types
// ============================================================

#[derive(Debug, Clone, Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    error: Option<String>,
}
