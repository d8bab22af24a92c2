//! HuggingFace inference classifier for text-classification models.
//!
//! https://huggingface.co/docs/api-inference/tasks/text-classification
//!
//! Unlike the chat backends, these models return a ranked label/score list
//! (`[[{"label": "...", "score": 0.9}, ...]]`); the top-scored label wins and
//! its score becomes the confidence.

use async_trait::async_trait;
use leadscout_schema::Intent;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::{ensure_non_empty, neutral_fallback, Classification, ClassifyError, IntentClassifier};

const PROVIDER: &str = "huggingface";

#[derive(Debug, Clone)]
pub struct HuggingFaceClassifier {
    client: reqwest::Client,
    api_key: String,
    url: String,
}

impl HuggingFaceClassifier {
    pub fn new(api_key: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(60))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl IntentClassifier for HuggingFaceClassifier {
    async fn classify(&self, text: &str) -> Result<Classification, ClassifyError> {
        ensure_non_empty(text)?;

        let resp = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&InferenceRequest { inputs: text.to_string() })
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

        let body: InferenceResponse = resp.json().await.map_err(|e| ClassifyError::Malformed {
            provider: PROVIDER,
            message: e.to_string(),
        })?;

        Ok(to_classification(body))
    }
}

fn to_classification(body: InferenceResponse) -> Classification {
    // The API nests one label list per input; we send exactly one input.
    let top = match body
        .0
        .first()
        .and_then(|labels| labels.iter().max_by(|a, b| a.score.total_cmp(&b.score)))
    {
        Some(top) => top,
        None => return neutral_fallback(PROVIDER, "empty label list"),
    };

    let intent = intent_from_label(&top.label);
    Classification {
        intent,
        confidence: top.score.clamp(0.0, 1.0),
    }
}

fn intent_from_label(label: &str) -> Intent {
    let lower = label.to_lowercase();
    if lower.contains("positive") {
        Intent::Positive
    } else if lower.contains("negative") {
        Intent::Negative
    } else {
        Intent::Neutral
    }
}

// ============================================================
// Inference API Types
// ============================================================

#[derive(Debug, Clone, Serialize)]
struct InferenceRequest {
    inputs: String,
}

#[derive(Debug, Clone, Deserialize)]
struct InferenceResponse(Vec<Vec<ScoredLabel>>);

#[derive(Debug, Clone, Deserialize)]
struct ScoredLabel {
    label: String,
    score: f32,
}
