//! Classifier behavior against a mocked HTTP backend: normalization of each
//! response shape, and the error taxonomy for failing calls.

use leadscout_provider::{
    ClassifyError, HuggingFaceClassifier, IntentClassifier, OllamaClassifier, OpenAiClassifier,
    DEFAULT_CONFIDENCE, DEFAULT_PROMPT,
};
use leadscout_schema::Intent;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn openai(server: &MockServer) -> OpenAiClassifier {
    OpenAiClassifier::new("sk-test", server.uri(), "gpt-4o-mini", DEFAULT_PROMPT)
}

#[tokio::test]
async fn openai_yes_maps_to_positive() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(serde_json::json!({ "model": "gpt-4o-mini" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "YES" } }]
        })))
        .mount(&server)
        .await;

    let c = openai(&server).classify("Can we book a call?").await.unwrap();
    assert_eq!(c.intent, Intent::Positive);
    assert_eq!(c.confidence, DEFAULT_CONFIDENCE);
}

#[tokio::test]
async fn openai_non_success_status_is_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string(
            r#"{"error":{"message":"Rate limit reached"}}"#,
        ))
        .mount(&server)
        .await;

    let err = openai(&server).classify("hello").await.unwrap_err();
    match err {
        ClassifyError::Api { status, message, .. } => {
            assert_eq!(status, 429);
            assert!(message.contains("Rate limit reached"));
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn openai_undecodable_body_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&server)
        .await;

    let err = openai(&server).classify("hello").await.unwrap_err();
    assert!(matches!(err, ClassifyError::Malformed { .. }));
}

#[tokio::test]
async fn openai_missing_content_degrades_to_neutral() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": []
        })))
        .mount(&server)
        .await;

    let c = openai(&server).classify("hello").await.unwrap();
    assert_eq!(c.intent, Intent::Neutral);
    assert_eq!(c.confidence, 0.0);
}

#[tokio::test]
async fn empty_text_rejected_before_any_request() {
    // No mock mounted: a request would 404 and surface as an Api error.
    let server = MockServer::start().await;
    let err = openai(&server).classify("   ").await.unwrap_err();
    assert!(matches!(err, ClassifyError::EmptyText));
}

#[tokio::test]
async fn ollama_no_maps_to_negative() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(serde_json::json!({ "stream": false })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "model": "llama3",
            "response": "NO",
            "done": true
        })))
        .mount(&server)
        .await;

    let classifier = OllamaClassifier::new(server.uri(), "llama3", DEFAULT_PROMPT);
    let c = classifier.classify("not interested, thanks").await.unwrap();
    assert_eq!(c.intent, Intent::Negative);
}

#[tokio::test]
async fn ollama_in_band_error_payload_is_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "error": "model 'llama3' not found, try pulling it first"
        })))
        .mount(&server)
        .await;

    let classifier = OllamaClassifier::new(server.uri(), "llama3", DEFAULT_PROMPT);
    let err = classifier.classify("hello").await.unwrap_err();
    match err {
        ClassifyError::Api { message, .. } => assert!(message.contains("not found")),
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn huggingface_ranked_list_takes_top_score() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/acme/sentiment"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([[
            { "label": "negative", "score": 0.9 },
            { "label": "positive", "score": 0.1 }
        ]])))
        .mount(&server)
        .await;

    let classifier =
        HuggingFaceClassifier::new("hf_test", format!("{}/models/acme/sentiment", server.uri()));
    let c = classifier.classify("please stop emailing me").await.unwrap();
    assert_eq!(c.intent, Intent::Negative);
    assert!((c.confidence - 0.9).abs() < 1e-6);
}

#[tokio::test]
async fn huggingface_loading_status_is_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/acme/sentiment"))
        .respond_with(ResponseTemplate::new(503).set_body_string(
            r#"{"error":"Model acme/sentiment is currently loading"}"#,
        ))
        .mount(&server)
        .await;

    let classifier =
        HuggingFaceClassifier::new("hf_test", format!("{}/models/acme/sentiment", server.uri()));
    let err = classifier.classify("hello").await.unwrap_err();
    match err {
        ClassifyError::Api { status, .. } => assert_eq!(status, 503),
        other => panic!("expected Api error, got {other:?}"),
    }
}
