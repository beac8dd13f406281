//! The assistant as shared by concurrent requests.
//!
//! The lock is held only for the synchronous steps of a gesture. Lookups,
//! route computations, chat replies and exports are awaited with the
//! assistant unlocked, so state reads and mode changes stay responsive
//! while a reply is outstanding. Results that arrive after the session
//! was replaced are dropped.

use std::sync::Arc;

use tokio::sync::{broadcast, Mutex, MutexGuard};
use tracing::{debug, info};
use uuid::Uuid;

use compass_chat::{ChatError, ChatReply, SessionEvent, UiAction};
use compass_core::types::{ChatMessage, Coordinate};
use compass_geo::GeocodingAdapter;
use compass_storage::ExportedDocument;

use crate::assistant::{
    endpoint_names, ChatTurn, ClickOutcome, ClickStep, DispatchOutcome, RouteChat, RouteStep,
    SearchOutcome, SearchStep, TravelAssistant,
};
use crate::error::MapError;
use crate::hover::{HoverDebouncer, HoverOutcome};

/// Builds a fresh assistant for a new session.
pub type AssistantFactory = Arc<dyn Fn() -> TravelAssistant + Send + Sync>;

#[derive(Clone)]
pub struct SharedAssistant {
    inner: Arc<Mutex<TravelAssistant>>,
    factory: AssistantFactory,
    hover: HoverDebouncer,
    geocoder: GeocodingAdapter,
    events: broadcast::Sender<SessionEvent>,
}

impl SharedAssistant {
    pub fn new(factory: AssistantFactory, events: broadcast::Sender<SessionEvent>) -> Self {
        let assistant = factory().with_events(events.clone());
        let hover = assistant.hover_debouncer();
        let geocoder = assistant.geocoder();
        Self {
            inner: Arc::new(Mutex::new(assistant)),
            factory,
            hover,
            geocoder,
            events,
        }
    }

    /// Lock for a synchronous step. Never hold the guard across an await.
    pub async fn lock(&self) -> MutexGuard<'_, TravelAssistant> {
        self.inner.lock().await
    }

    /// Lock only if `session_id` is still the live session.
    async fn lock_session(
        &self,
        session_id: Uuid,
    ) -> Result<MutexGuard<'_, TravelAssistant>, MapError> {
        let guard = self.inner.lock().await;
        if guard.session_id() != session_id {
            debug!(session_id = %session_id, "Dropping result for a replaced session");
            return Err(MapError::Superseded);
        }
        Ok(guard)
    }

    pub async fn session_id(&self) -> Uuid {
        self.lock().await.session_id()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Replace the assistant with a fresh one under a new session id.
    ///
    /// Pending hovers are superseded and replies still in flight for the
    /// previous session are discarded when they arrive.
    pub async fn start_session(&self) -> Uuid {
        self.hover.invalidate();
        let fresh = (self.factory)()
            .with_events(self.events.clone())
            .with_hover(self.hover.clone());
        let session_id = fresh.session_id();

        let previous = {
            let mut guard = self.lock().await;
            std::mem::replace(&mut *guard, fresh).session_id()
        };
        info!(previous = %previous, session_id = %session_id, "Session started");
        let _ = self.events.send(SessionEvent::SessionStarted { session_id });
        session_id
    }

    // =========================================================================
    // Gestures
    // =========================================================================

    /// Debounced hover preview. Never takes the lock.
    pub async fn hover(&self, coordinate: Coordinate) -> HoverOutcome {
        self.hover.preview(&self.geocoder, coordinate).await
    }

    /// Handle a map click. Pending hovers are superseded before waiting for
    /// the lock.
    pub async fn click(&self, coordinate: Coordinate) -> Result<ClickOutcome, MapError> {
        self.hover.invalidate();
        let (step, session_id) = {
            let mut assistant = self.lock().await;
            (assistant.pointer(coordinate)?, assistant.session_id())
        };

        match step {
            ClickStep::Done(outcome) => Ok(outcome),
            ClickStep::Explore(coordinate) => {
                let lookup = self.geocoder.reverse_geocode(coordinate).await;
                let explore = self
                    .lock_session(session_id)
                    .await?
                    .begin_explore(coordinate, lookup)?;
                let reply = explore.turn().request_reply().await;
                self.lock_session(session_id)
                    .await?
                    .finish_explore(explore, reply)
            }
            ClickStep::Route(job) => {
                let result = job.calculate().await;
                let step = self
                    .lock_session(session_id)
                    .await?
                    .apply_route(job, result)?;
                let route = match step {
                    RouteStep::Describe(route) => route,
                    RouteStep::Done(outcome) => return Ok(outcome),
                };

                let (start, end) = endpoint_names(&self.geocoder, &route.request).await;
                let chat = self
                    .lock_session(session_id)
                    .await?
                    .begin_route_chat(route, &start, &end)?;
                let pending = match chat {
                    RouteChat::Ask(pending) => pending,
                    RouteChat::Done(outcome) => return Ok(outcome),
                };
                let reply = pending.turn().request_reply().await;
                self.lock_session(session_id)
                    .await?
                    .finish_route_chat(pending, reply)
            }
        }
    }

    pub async fn search(&self, query: &str) -> Result<SearchOutcome, MapError> {
        let session_id = self.session_id().await;
        let result = self.geocoder.forward_geocode(query).await;
        let step = self
            .lock_session(session_id)
            .await?
            .apply_search(query, result)?;
        let pending = match step {
            SearchStep::Ask(pending) => pending,
            SearchStep::Done(outcome) => return Ok(outcome),
        };
        let reply = pending.turn().request_reply().await;
        self.lock_session(session_id)
            .await?
            .finish_search(pending, reply)
    }

    // =========================================================================
    // Chat panel
    // =========================================================================

    pub async fn send_chat(
        &self,
        message: &str,
        context_hint: Option<&str>,
    ) -> Result<ChatMessage, MapError> {
        let (turn, session_id) = {
            let mut assistant = self.lock().await;
            (
                assistant.begin_chat(message, context_hint)?,
                assistant.session_id(),
            )
        };
        let reply = turn.request_reply().await;
        self.finish_chat(session_id, turn, reply).await
    }

    pub async fn suggestion_clicked(&self, text: &str) -> Result<ChatMessage, MapError> {
        self.send_chat(text, None).await
    }

    pub async fn dispatch(&self, action: UiAction) -> Result<DispatchOutcome, MapError> {
        match action {
            UiAction::SuggestionClicked { text } => {
                let message = self.suggestion_clicked(&text).await?;
                Ok(DispatchOutcome::Reply { message })
            }
            UiAction::EnlargeImage { url, caption } => {
                Ok(self.lock().await.enlarge_image(url, caption))
            }
            UiAction::OpenVideo { url } => Ok(DispatchOutcome::OpenVideo { url }),
        }
    }

    /// Export a snapshot of the conversation.
    pub async fn export(&self) -> Result<ExportedDocument, MapError> {
        let (job, session_id) = {
            let assistant = self.lock().await;
            (assistant.export_job(), assistant.session_id())
        };
        match job.run().await {
            Ok(document) => Ok(document),
            Err(e) => {
                if let Ok(assistant) = self.lock_session(session_id).await {
                    assistant.export_failed(&e);
                }
                Err(e.into())
            }
        }
    }

    async fn finish_chat(
        &self,
        session_id: Uuid,
        turn: ChatTurn,
        reply: Result<ChatReply, ChatError>,
    ) -> Result<ChatMessage, MapError> {
        self.lock_session(session_id)
            .await?
            .finish_chat(turn, reply)
    }
}

impl std::fmt::Debug for SharedAssistant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedAssistant")
            .field("hover", &self.hover)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
