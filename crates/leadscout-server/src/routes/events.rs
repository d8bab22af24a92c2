//! SSE feed of scrape progress. Subscribes to every topic and drains the
//! receivers on a short poll interval.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use axum::Router;
use futures_util::Stream;
use leadscout_bus::Topic;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/stream", get(event_stream))
}

async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut receivers = Vec::new();
    for topic in Topic::all() {
        receivers.push(state.bus.subscribe(topic).await);
    }

    let stream = async_stream::stream! {
        let mut interval = tokio::time::interval(Duration::from_millis(100));
        loop {
            interval.tick().await;
            for rx in receivers.iter_mut() {
                while let Ok(msg) = rx.try_recv() {
                    if let Ok(json) = serde_json::to_string(&msg) {
                        yield Ok(Event::default().data(json));
                    }
                }
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}
