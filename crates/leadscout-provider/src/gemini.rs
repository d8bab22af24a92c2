//! Google Gemini classifier.
//!
//! https://ai.google.dev/api/generate-content

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::{ensure_non_empty, full_prompt, neutral_fallback, normalize_reply, Classification, ClassifyError, IntentClassifier};

pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

const PROVIDER: &str = "gemini";

#[derive(Debug, Clone)]
pub struct GeminiClassifier {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    prompt: String,
}

impl GeminiClassifier {
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
impl IntentClassifier for GeminiClassifier {
    async fn classify(&self, text: &str) -> Result<Classification, ClassifyError> {
        ensure_non_empty(text)?;

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let payload = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: full_prompt(&self.prompt, text),
                }],
            }],
        };

        let resp = self
            .client
            .post(&url)
            .header("content-type", "application/json")
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

        let body: GeminiResponse = resp.json().await.map_err(|e| ClassifyError::Malformed {
            provider: PROVIDER,
            message: e.to_string(),
        })?;

        Ok(to_classification(body))
    }
}

fn to_classification(body: GeminiResponse) -> Classification {
    let reply: String = body
        .candidates
        .first()
        .map(|c| {
            c.content
                .parts
                .iter()
                .filter_map(|p| p.text.as_deref())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default();

    if reply.trim().is_empty() {
        neutral_fallback(PROVIDER, "candidates carried no text parts")
    } else {
        normalize_reply(PROVIDER, &reply)
    }
}

// ============================================================
// Gemini API Types
// ============================================================

#[derive(Debug, Clone, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Debug, Clone, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Clone, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Clone, Deserialize)]
struct GeminiCandidate {
    content: GeminiResponseContent,
}

#[derive(Debug, Clone, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Clone, Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use leadscout_schema::Intent;

    #[test]
    fn parses_no_reply() {
        let raw = serde_json::json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": "NO" }] },
                "finishReason": "STOP"
            }]
        });
        let body: GeminiResponse = serde_json::from_value(raw).unwrap();
        let c = to_classification(body);
        assert_eq!(c.intent, Intent::Negative);
    }

    #[test]
    fn joins_multiple_parts() {
        let raw = serde_json::json!({
            "candidates": [{
                "content": { "parts": [{ "text": "The answer is" }, { "text": "YES" }] }
            }]
        });
        let body: GeminiResponse = serde_json::from_value(raw).unwrap();
        let c = to_classification(body);
        assert_eq!(c.intent, Intent::Positive);
    }

    #[test]
    fn empty_candidates_is_neutral() {
        let body: GeminiResponse = serde_json::from_value(serde_json::json!({})).unwrap();
        let c = to_classification(body);
        assert_eq!(c.intent, Intent::Neutral);
        assert_eq!(c.confidence, 0.0);
    }
}
