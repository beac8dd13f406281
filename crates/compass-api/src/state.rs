//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::broadcast;

use compass_chat::SessionEvent;
use compass_core::config::CompassConfig;
use compass_map::{SharedAssistant, TravelAssistant};

/// Capacity of the SSE event channel.
const EVENT_CAPACITY: usize = 256;

/// Shared application state.
///
/// Handlers lock the assistant only for synchronous steps, so state reads
/// answer while a chat reply is outstanding. A new session is built from
/// the factory given to [`AppState::new`].
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<CompassConfig>,
    pub assistant: SharedAssistant,
    /// Broadcast sender for SSE events.
    pub event_tx: broadcast::Sender<SessionEvent>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new<F>(config: CompassConfig, factory: F) -> Self
    where
        F: Fn() -> TravelAssistant + Send + Sync + 'static,
    {
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            config: Arc::new(config),
            assistant: SharedAssistant::new(Arc::new(factory), event_tx.clone()),
            event_tx,
            start_time: Instant::now(),
        }
    }
}
