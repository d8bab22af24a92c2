use std::sync::Arc;

use leadscout_bus::EventBus;
use leadscout_scout::Scout;
use leadscout_store::Store;

/// Shared application state accessible from all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub scout: Scout,
    pub store: Arc<Store>,
    /// Reference to the event bus for SSE streaming.
    pub bus: Arc<EventBus>,
}
