//! OpenAI chat-completions classifier.
//!
//! https://platform.openai.com/docs/api-reference/chat
//!
//! The model replies in free text (YES/NO per the prompt); the reply is
//! folded into the three-way intent by `normalize_reply`.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::{ensure_non_empty, neutral_fallback, normalize_reply, Classification, ClassifyError, IntentClassifier};

const PROVIDER: &str = "openai";

#[derive(Debug, Clone)]
pub struct OpenAiClassifier {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    prompt: String,
}

impl OpenAiClassifier {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(60))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
            prompt: prompt.into(),
        }
    }
}

#[async_trait]
impl IntentClassifier for OpenAiClassifier {
    async fn classify(&self, text: &str) -> Result<Classification, ClassifyError> {
        ensure_non_empty(text)?;

        let payload = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".into(),
                    content: self.prompt.clone(),
                },
                ChatMessage {
                    role: "user".into(),
                    content: text.to_string(),
                },
            ],
            temperature: 0.0,
            max_tokens: 8,
        };

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
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

        let body: ChatResponse = resp.json().await.map_err(|e| ClassifyError::Malformed {
            provider: PROVIDER,
            message: e.to_string(),
        })?;

        Ok(to_classification(body))
    }
}

fn to_classification(body: ChatResponse) -> Classification {
    match body
        .choices
        .first()
        .and_then(|c| c.message.as_ref())
        .and_then(|m| m.content.as_deref())
    {
        Some(content) => normalize_reply(PROVIDER, content),
        None => neutral_fallback(PROVIDER, "choices[0].message.content missing"),
    }
}

// ============================================================
// OpenAI API Types
// ============================================================

#[derive(Debug, Clone, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: Option<ChatChoiceMessage>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}
