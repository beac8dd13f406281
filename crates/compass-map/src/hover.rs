//! Debounced hover previews.
//!
//! Every hover takes a ticket from a shared generation counter; a click or a
//! newer hover bumps the generation. A preview is applied only if its
//! ticket is still current after both the debounce wait and the lookup.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use compass_core::types::Coordinate;
use compass_geo::GeocodingAdapter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HoverTicket(u64);

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum HoverOutcome {
    Preview { coordinate: Coordinate, label: String },
    /// A newer hover or a click arrived first; nothing to show.
    Superseded,
    /// The lookup failed. Previews are best-effort, so nothing is shown.
    Unavailable,
}

/// Cancellable timer for hover lookups. Clones share one generation.
#[derive(Debug, Clone)]
pub struct HoverDebouncer {
    generation: Arc<AtomicU64>,
    delay: Duration,
}

impl HoverDebouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            generation: Arc::new(AtomicU64::new(0)),
            delay,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Start a new hover, superseding any pending one.
    pub fn ticket(&self) -> HoverTicket {
        HoverTicket(self.generation.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Supersede any pending hover without starting a new one.
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    pub fn is_current(&self, ticket: HoverTicket) -> bool {
        self.generation.load(Ordering::SeqCst) == ticket.0
    }

    /// Wait out the debounce. Returns whether the ticket survived it.
    pub async fn settle(&self, ticket: HoverTicket) -> bool {
        tokio::time::sleep(self.delay).await;
        self.is_current(ticket)
    }

    /// Debounce, then reverse-geocode `coordinate` for a preview label.
    pub async fn preview(
        &self,
        geocoder: &GeocodingAdapter,
        coordinate: Coordinate,
    ) -> HoverOutcome {
        let ticket = self.ticket();
        if !self.settle(ticket).await {
            return HoverOutcome::Superseded;
        }

        let lookup = geocoder.reverse_geocode(coordinate).await;
        if !self.is_current(ticket) {
            debug!(coordinate = %coordinate, "Discarding superseded hover lookup");
            return HoverOutcome::Superseded;
        }
        match lookup {
            Ok(place) => HoverOutcome::Preview {
                coordinate,
                label: place.display_name,
            },
            Err(_) => HoverOutcome::Unavailable,
        }
    }
}
