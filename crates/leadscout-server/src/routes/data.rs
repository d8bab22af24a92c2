//! Read access to the harvested records, plus a destructive reset.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get};
use axum::{Json, Router};
use leadscout_schema::{Conversation, Lead};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/leads", get(list_leads))
        .route("/conversations", get(list_conversations))
        .route("/conversations/{counterparty_id}", get(get_conversation))
        .route("/", delete(clear_all))
}

async fn list_leads(State(state): State<AppState>) -> Result<Json<Vec<Lead>>, StatusCode> {
    state
        .store
        .list_leads()
        .await
        .map(Json)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

async fn list_conversations(
    State(state): State<AppState>,
) -> Result<Json<Vec<Conversation>>, StatusCode> {
    state
        .store
        .list_conversations()
        .await
        .map(Json)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

async fn get_conversation(
    State(state): State<AppState>,
    Path(counterparty_id): Path<String>,
) -> Result<Json<Conversation>, StatusCode> {
    match state.store.get_conversation(&counterparty_id).await {
        Ok(Some(convo)) => Ok(Json(convo)),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

async fn clear_all(State(state): State<AppState>) -> Result<Json<serde_json::Value>, StatusCode> {
    state
        .store
        .clear_all()
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(serde_json::json!({ "status": "cleared" })))
}
