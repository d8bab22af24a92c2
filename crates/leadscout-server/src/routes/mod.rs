pub mod data;
pub mod events;
pub mod scrape;

use axum::Router;

use crate::state::AppState;

pub fn api_router() -> Router<AppState> {
    Router::new()
        .nest("/scrape", scrape::router())
        .nest("/data", data::router())
        .nest("/events", events::router())
}
