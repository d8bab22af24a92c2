//! Scrape lifecycle commands. Start/resume/stop acknowledge with 202 before
//! the pass does any work; progress arrives on the event stream.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use leadscout_schema::ScrapeMode;
use leadscout_scout::{CommandError, StatusReport};
use serde::Deserialize;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StartRequest {
    pub mode: ScrapeMode,
    /// Clear the skip-list and revisit every handle. Stored conversations
    /// are kept and merged into.
    #[serde(default)]
    pub rescan: bool,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/start", post(start_scrape))
        .route("/resume", post(resume_scrape))
        .route("/stop", post(stop_scrape))
        .route("/status", get(scrape_status))
}

fn command_response(
    result: Result<(), CommandError>,
    accepted: &'static str,
) -> (StatusCode, Json<serde_json::Value>) {
    match result {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({ "status": accepted })),
        ),
        Err(err) => {
            let status = match err {
                CommandError::NotStartable(_)
                | CommandError::NotResumable(_)
                | CommandError::NotRunning => StatusCode::CONFLICT,
                CommandError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (status, Json(serde_json::json!({ "error": err.to_string() })))
        }
    }
}

async fn start_scrape(
    State(state): State<AppState>,
    Json(req): Json<StartRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    command_response(state.scout.start(req.mode, req.rescan).await, "started")
}

async fn resume_scrape(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    command_response(state.scout.resume().await, "resumed")
}

async fn stop_scrape(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    command_response(state.scout.stop().await, "stopping")
}

async fn scrape_status(
    State(state): State<AppState>,
) -> Result<Json<StatusReport>, StatusCode> {
    state
        .scout
        .status()
        .await
        .map(Json)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}
