//! The map-chat bridge.
//!
//! `TravelAssistant` is built once per session and owns everything the
//! map and the chat panel share: interaction mode, overlay, place memory
//! (through the chat session), the active route, and the image modal.
//! Every gesture that produces a chat prompt goes through one path here.
//!
//! Gestures run in steps. A synchronous step updates the map and hands
//! back the work to await (a lookup, a route computation, a chat reply),
//! and a second synchronous step applies the result. The `async` methods
//! on `TravelAssistant` run those steps for a single owner;
//! [`SharedAssistant`](crate::SharedAssistant) awaits them unlocked.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use compass_chat::{
    ChatBackend, ChatError, ChatReply, ChatSession, ConversationRenderer, DisplayUnit,
    ImageModal, ModalInput, PendingTurn, SessionEvent, UiAction,
};
use compass_core::config::CompassConfig;
use compass_core::types::{
    ChatMessage, Coordinate, InteractionMode, Place, RouteRequest, RouteResult, TravelProfile,
};
use compass_geo::{
    GeoError, Geocoder, GeocodingAdapter, RouteCalculator, RoutePlanner, RoutingService,
};
use compass_storage::{DocumentExporter, ExportError, ExportedDocument, HistoryRepository};

use crate::controller::{MapInteractionController, PointerOutcome};
use crate::error::MapError;
use crate::hover::HoverDebouncer;
use crate::overlay::{MapOverlay, MapView, Marker, MarkerKind, RouteLine, SEARCH_ZOOM};
use crate::prompt::PromptTemplates;

/// Result of a map click.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ClickOutcome {
    /// Normal-mode click. `resolved` is false when the reverse lookup
    /// failed and the coordinate-only prompt was used.
    Explored {
        coordinate: Coordinate,
        label: String,
        resolved: bool,
        reply: ChatMessage,
    },
    RouteStartSet {
        start: Coordinate,
    },
    RoutePlanned {
        route: RouteLine,
        reply: Option<ChatMessage>,
    },
    /// No route could be planned. The endpoint markers stay.
    RouteFailed {
        notice: String,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SearchOutcome {
    /// `place` is the best match. Every candidate has a marker.
    Found {
        place: Place,
        candidates: Vec<Place>,
        reply: ChatMessage,
    },
    NotFound {
        notice: String,
    },
    Failed {
        notice: String,
    },
}

/// Result of a rendered UI affordance.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchOutcome {
    Reply { message: ChatMessage },
    ModalOpened { url: String, caption: String },
    OpenVideo { url: String },
}

/// Detail card for one marker of the last search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaceDetail {
    pub rank: usize,
    pub name: String,
    pub address: String,
    pub coordinate: Coordinate,
    pub query: Option<String>,
}

impl PlaceDetail {
    fn new(rank: usize, place: &Place) -> Self {
        let name = place
            .display_name
            .split(',')
            .map(str::trim)
            .find(|part| !part.is_empty())
            .unwrap_or(place.display_name.as_str())
            .to_string();
        Self {
            rank,
            name,
            address: place.display_name.clone(),
            coordinate: place.coordinate,
            query: place.source_query.clone(),
        }
    }
}

/// Snapshot of the map side for the UI.
#[derive(Debug, Clone, Serialize)]
pub struct MapState {
    pub session_id: Uuid,
    pub mode: InteractionMode,
    pub profile: TravelProfile,
    pub route_start: Option<Coordinate>,
    pub overlay: MapOverlay,
    pub context_window: String,
    pub recent_places: Vec<String>,
    pub lookup_count: usize,
    pub awaiting_reply: bool,
    pub modal: ImageModal,
}

// =============================================================================
// Steps
// =============================================================================

/// A started chat turn. The reply is requested without the assistant.
pub struct ChatTurn {
    pending: PendingTurn,
    backend: Arc<dyn ChatBackend>,
}

impl ChatTurn {
    pub fn placeholder_id(&self) -> Uuid {
        self.pending.placeholder_id
    }

    pub async fn request_reply(&self) -> Result<ChatReply, ChatError> {
        self.backend.send(&self.pending.request).await
    }
}

impl std::fmt::Debug for ChatTurn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatTurn")
            .field("pending", &self.pending)
            .finish()
    }
}

/// What a click needs next.
#[derive(Debug)]
pub enum ClickStep {
    /// Reverse-geocode the coordinate, then [`TravelAssistant::begin_explore`].
    Explore(Coordinate),
    /// Compute the route, then [`TravelAssistant::apply_route`].
    Route(RouteJob),
    Done(ClickOutcome),
}

/// A selected route waiting to be computed.
pub struct RouteJob {
    request: RouteRequest,
    generation: u64,
    calculator: RouteCalculator,
}

impl RouteJob {
    pub fn request(&self) -> RouteRequest {
        self.request
    }

    pub async fn calculate(&self) -> Result<RouteResult, GeoError> {
        self.calculator.calculate(&self.request).await
    }
}

impl std::fmt::Debug for RouteJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteJob")
            .field("request", &self.request)
            .field("generation", &self.generation)
            .finish()
    }
}

/// A computed route, before its chat prompt.
#[derive(Debug)]
pub enum RouteStep {
    /// Name the endpoints, then [`TravelAssistant::begin_route_chat`].
    Describe(RouteLine),
    Done(ClickOutcome),
}

#[derive(Debug)]
pub enum RouteChat {
    Ask(RouteTurn),
    Done(ClickOutcome),
}

#[derive(Debug)]
pub struct RouteTurn {
    route: RouteLine,
    turn: ChatTurn,
}

impl RouteTurn {
    pub fn turn(&self) -> &ChatTurn {
        &self.turn
    }
}

#[derive(Debug)]
pub struct ExploreTurn {
    coordinate: Coordinate,
    label: String,
    resolved: bool,
    turn: ChatTurn,
}

impl ExploreTurn {
    pub fn turn(&self) -> &ChatTurn {
        &self.turn
    }
}

#[derive(Debug)]
pub enum SearchStep {
    Ask(SearchTurn),
    Done(SearchOutcome),
}

#[derive(Debug)]
pub struct SearchTurn {
    place: Place,
    candidates: Vec<Place>,
    turn: ChatTurn,
}

impl SearchTurn {
    pub fn turn(&self) -> &ChatTurn {
        &self.turn
    }
}

/// Conversation snapshot handed to the exporter.
pub struct ExportJob {
    messages: Vec<ChatMessage>,
    exporter: Arc<dyn DocumentExporter>,
}

impl ExportJob {
    pub async fn run(&self) -> Result<ExportedDocument, ExportError> {
        self.exporter.export(&self.messages).await
    }
}

/// Best-effort names for both ends of a route.
pub async fn endpoint_names(
    geocoder: &GeocodingAdapter,
    request: &RouteRequest,
) -> (String, String) {
    let name = |place: Result<Place, GeoError>, coordinate: Coordinate| match place {
        Ok(place) => place.display_name,
        Err(_) => coordinate.to_string(),
    };
    let start = name(geocoder.reverse_geocode(request.start).await, request.start);
    let end = name(geocoder.reverse_geocode(request.end).await, request.end);
    (start, end)
}

// =============================================================================
// TravelAssistant
// =============================================================================

pub struct TravelAssistant {
    controller: MapInteractionController,
    overlay: MapOverlay,
    geocoder: GeocodingAdapter,
    planner: RoutePlanner,
    chat: ChatSession,
    renderer: ConversationRenderer,
    exporter: Arc<dyn DocumentExporter>,
    prompts: PromptTemplates,
    hover: HoverDebouncer,
    modal: ImageModal,
    search_results: Vec<Place>,
    route_generation: u64,
    route_chat_prompt: bool,
}

impl TravelAssistant {
    pub fn new(
        config: &CompassConfig,
        geocoder: Arc<dyn Geocoder>,
        router: Arc<dyn RoutingService>,
        backend: Arc<dyn ChatBackend>,
        exporter: Arc<dyn DocumentExporter>,
    ) -> Self {
        let chat = ChatSession::new(backend).with_config(config);
        info!(session_id = %chat.session_id(), "Travel assistant started");
        Self {
            controller: MapInteractionController::new(),
            overlay: MapOverlay::new(MapView::from_config(&config.map)),
            geocoder: GeocodingAdapter::new(geocoder, config.geocoding.max_results),
            planner: RoutePlanner::new(router)
                .with_cruise_speed(config.routing.cruise_speed_kmh)
                .with_segments(config.routing.great_circle_segments),
            chat,
            renderer: ConversationRenderer::new(config.render.max_gallery_images),
            exporter,
            prompts: PromptTemplates::from(&config.prompts),
            hover: HoverDebouncer::new(Duration::from_millis(config.map.hover_debounce_ms)),
            modal: ImageModal::new(),
            search_results: Vec::new(),
            route_generation: 0,
            route_chat_prompt: config.map.route_chat_prompt,
        }
    }

    pub fn with_store(mut self, store: HistoryRepository) -> Self {
        self.chat = self.chat.with_store(store);
        self
    }

    pub fn with_events(mut self, events: broadcast::Sender<SessionEvent>) -> Self {
        self.chat = self.chat.with_events(events);
        self
    }

    /// Share a hover debouncer with a previous session.
    pub fn with_hover(mut self, hover: HoverDebouncer) -> Self {
        self.hover = hover;
        self
    }

    pub fn session_id(&self) -> Uuid {
        self.chat.session_id()
    }

    pub fn mode(&self) -> InteractionMode {
        self.controller.mode()
    }

    pub fn overlay(&self) -> &MapOverlay {
        &self.overlay
    }

    pub fn chat(&self) -> &ChatSession {
        &self.chat
    }

    pub fn history(&self) -> &[ChatMessage] {
        self.chat.history()
    }

    pub fn modal(&self) -> &ImageModal {
        &self.modal
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.chat.subscribe()
    }

    /// Shared handle for hover lookups that run outside the assistant.
    pub fn hover_debouncer(&self) -> HoverDebouncer {
        self.hover.clone()
    }

    pub fn geocoder(&self) -> GeocodingAdapter {
        self.geocoder.clone()
    }

    // =========================================================================
    // Map gestures
    // =========================================================================

    /// Handle a click on the map in the current mode.
    pub async fn click(&mut self, coordinate: Coordinate) -> Result<ClickOutcome, MapError> {
        match self.pointer(coordinate)? {
            ClickStep::Done(outcome) => Ok(outcome),
            ClickStep::Explore(coordinate) => {
                let lookup = self.geocoder.reverse_geocode(coordinate).await;
                let explore = self.begin_explore(coordinate, lookup)?;
                let reply = explore.turn().request_reply().await;
                self.finish_explore(explore, reply)
            }
            ClickStep::Route(job) => {
                let result = job.calculate().await;
                let route = match self.apply_route(job, result)? {
                    RouteStep::Describe(route) => route,
                    RouteStep::Done(outcome) => return Ok(outcome),
                };
                let (start, end) = endpoint_names(&self.geocoder, &route.request).await;
                let pending = match self.begin_route_chat(route, &start, &end)? {
                    RouteChat::Ask(pending) => pending,
                    RouteChat::Done(outcome) => return Ok(outcome),
                };
                let reply = pending.turn().request_reply().await;
                self.finish_route_chat(pending, reply)
            }
        }
    }

    /// Advance the interaction mode for a click and say what to await.
    ///
    /// A normal-mode click is refused while a reply is outstanding, before
    /// any lookup is made.
    pub fn pointer(&mut self, coordinate: Coordinate) -> Result<ClickStep, MapError> {
        self.hover.invalidate();
        match self.controller.handle_pointer(coordinate)? {
            PointerOutcome::Explore(coordinate) => {
                if self.chat.is_awaiting_reply() {
                    return Err(ChatError::TurnInProgress.into());
                }
                Ok(ClickStep::Explore(coordinate))
            }
            PointerOutcome::RouteStartSet(start) => {
                self.overlay.add_marker(Marker::new(
                    start,
                    format!("Start: {}", start),
                    MarkerKind::RouteStart,
                ));
                Ok(ClickStep::Done(ClickOutcome::RouteStartSet { start }))
            }
            PointerOutcome::RouteReady(request) => {
                self.overlay.add_marker(Marker::new(
                    request.end,
                    format!("End: {}", request.end),
                    MarkerKind::RouteEnd,
                ));
                self.planner.clear();
                self.route_generation += 1;
                Ok(ClickStep::Route(RouteJob {
                    request,
                    generation: self.route_generation,
                    calculator: self.planner.calculator(),
                }))
            }
        }
    }

    /// Mark the clicked spot and start its chat turn.
    ///
    /// The context window is read before the place is remembered, so a
    /// place never appears as its own context.
    pub fn begin_explore(
        &mut self,
        coordinate: Coordinate,
        lookup: Result<Place, GeoError>,
    ) -> Result<ExploreTurn, MapError> {
        let (prompt, label, place) = match lookup {
            Ok(place) => {
                let context = self.chat.memory().context_window();
                let prompt = self.prompts.place_prompt(&place.display_name, &context);
                (prompt, place.display_name.clone(), Some(place))
            }
            Err(e) => {
                debug!(coordinate = %coordinate, error = %e, "Using coordinate-only prompt");
                (
                    self.prompts.coordinate_prompt(coordinate),
                    coordinate.describe(),
                    None,
                )
            }
        };

        let turn = self.begin_chat(&prompt, Some(label.as_str()))?;
        let resolved = place.is_some();
        if let Some(place) = place {
            self.chat.memory_mut().remember(place);
        }
        self.overlay
            .replace_marker(Marker::new(coordinate, label.clone(), MarkerKind::Click));
        Ok(ExploreTurn {
            coordinate,
            label,
            resolved,
            turn,
        })
    }

    pub fn finish_explore(
        &mut self,
        explore: ExploreTurn,
        reply: Result<ChatReply, ChatError>,
    ) -> Result<ClickOutcome, MapError> {
        let reply = self.finish_chat(explore.turn, reply)?;
        Ok(ClickOutcome::Explored {
            coordinate: explore.coordinate,
            label: explore.label,
            resolved: explore.resolved,
            reply,
        })
    }

    /// Draw a computed route, or announce why there is none.
    ///
    /// Fails with [`MapError::Superseded`] when the route selection was
    /// dropped while the route was being computed.
    pub fn apply_route(
        &mut self,
        job: RouteJob,
        result: Result<RouteResult, GeoError>,
    ) -> Result<RouteStep, MapError> {
        if job.generation != self.route_generation {
            debug!(profile = %job.request.profile, "Discarding superseded route");
            return Err(MapError::Superseded);
        }
        let request = job.request;
        let result = match result {
            Ok(result) => result,
            Err(e) => {
                warn!(profile = %request.profile, error = %e, "Route planning failed");
                let notice = self.prompts.route_failed(request.profile);
                self.chat.notice(notice.clone());
                return Ok(RouteStep::Done(ClickOutcome::RouteFailed { notice }));
            }
        };

        self.planner.activate(request, result.clone());
        let route = RouteLine::new(request, result);
        self.overlay.set_route(route.clone());

        if self.route_chat_prompt {
            Ok(RouteStep::Describe(route))
        } else {
            Ok(RouteStep::Done(ClickOutcome::RoutePlanned { route, reply: None }))
        }
    }

    /// Ask the chat about a drawn route. While another reply is
    /// outstanding the route stays drawn without a prompt.
    pub fn begin_route_chat(
        &mut self,
        route: RouteLine,
        start: &str,
        end: &str,
    ) -> Result<RouteChat, MapError> {
        let prompt = self.prompts.route_prompt(start, end, route.request.profile);
        let hint = format!("{} to {}", start, end);
        match self.begin_chat(&prompt, Some(hint.as_str())) {
            Ok(turn) => Ok(RouteChat::Ask(RouteTurn { route, turn })),
            Err(MapError::Chat(ChatError::TurnInProgress)) => {
                debug!("Reply outstanding, route drawn without a prompt");
                Ok(RouteChat::Done(ClickOutcome::RoutePlanned { route, reply: None }))
            }
            Err(e) => Err(e),
        }
    }

    pub fn finish_route_chat(
        &mut self,
        pending: RouteTurn,
        reply: Result<ChatReply, ChatError>,
    ) -> Result<ClickOutcome, MapError> {
        let reply = self.finish_chat(pending.turn, reply)?;
        Ok(ClickOutcome::RoutePlanned {
            route: pending.route,
            reply: Some(reply),
        })
    }

    /// Enter route mode, dropping any partial selection and the drawn route.
    pub fn enable_route_mode(&mut self, profile: TravelProfile) -> Result<(), MapError> {
        self.controller.enable_route_mode(profile)?;
        self.overlay.clear_route();
        self.planner.clear();
        self.route_generation += 1;
        info!(profile = %profile, "Route mode enabled");
        Ok(())
    }

    /// Leave route mode. Returns false when it was not active.
    pub fn cancel_route_mode(&mut self) -> bool {
        let cancelled = self.controller.cancel_route_mode();
        if cancelled {
            self.overlay.clear_route();
            self.route_generation += 1;
        }
        cancelled
    }

    /// Mark every match for `query`, center on the best one and ask the
    /// chat about it.
    ///
    /// No match is a notice, not an error: nothing is drawn and no prompt
    /// is sent.
    pub async fn search(&mut self, query: &str) -> Result<SearchOutcome, MapError> {
        let result = self.geocoder.forward_geocode(query).await;
        let pending = match self.apply_search(query, result)? {
            SearchStep::Ask(pending) => pending,
            SearchStep::Done(outcome) => return Ok(outcome),
        };
        let reply = pending.turn().request_reply().await;
        self.finish_search(pending, reply)
    }

    pub fn apply_search(
        &mut self,
        query: &str,
        result: Result<Vec<Place>, GeoError>,
    ) -> Result<SearchStep, MapError> {
        let candidates = match result {
            Ok(candidates) => candidates,
            Err(GeoError::EmptyQuery) => return Err(GeoError::EmptyQuery.into()),
            Err(e) => {
                warn!(query = %query, error = %e, "Search failed");
                let notice = self.prompts.search_failed();
                self.chat.notice(notice.clone());
                return Ok(SearchStep::Done(SearchOutcome::Failed { notice }));
            }
        };

        let place = match candidates.first() {
            Some(place) => place.clone(),
            None => {
                let notice = self.prompts.not_found(query.trim());
                self.chat.notice(notice.clone());
                return Ok(SearchStep::Done(SearchOutcome::NotFound { notice }));
            }
        };

        let prompt = self.prompts.search_prompt(&place.display_name);
        let turn = self.begin_chat(&prompt, Some(place.display_name.as_str()))?;

        self.clear_map();
        for candidate in &candidates {
            self.overlay.add_marker(Marker::new(
                candidate.coordinate,
                candidate.display_name.clone(),
                MarkerKind::Search,
            ));
        }
        self.overlay.set_view(place.coordinate, SEARCH_ZOOM);
        self.search_results = candidates.clone();
        self.chat.memory_mut().remember(place.clone());
        debug!(query = %query, candidates = candidates.len(), "Search results marked");

        Ok(SearchStep::Ask(SearchTurn {
            place,
            candidates,
            turn,
        }))
    }

    pub fn finish_search(
        &mut self,
        pending: SearchTurn,
        reply: Result<ChatReply, ChatError>,
    ) -> Result<SearchOutcome, MapError> {
        let reply = self.finish_chat(pending.turn, reply)?;
        Ok(SearchOutcome::Found {
            place: pending.place,
            candidates: pending.candidates,
            reply,
        })
    }

    /// Detail for the search marker at `rank`, best match first.
    pub fn place_detail(&self, rank: usize) -> Option<PlaceDetail> {
        self.search_results
            .get(rank)
            .map(|place| PlaceDetail::new(rank, place))
    }

    /// Remove every marker and the route, and leave route mode.
    pub fn clear_map(&mut self) {
        self.overlay.clear();
        self.planner.clear();
        self.controller.cancel_route_mode();
        self.search_results.clear();
        self.route_generation += 1;
        debug!("Map decorations cleared");
    }

    // =========================================================================
    // Chat panel
    // =========================================================================

    /// Append the user message and the placeholder.
    pub fn begin_chat(
        &mut self,
        message: &str,
        context_hint: Option<&str>,
    ) -> Result<ChatTurn, MapError> {
        let pending = self.chat.begin_turn(message, context_hint)?;
        Ok(ChatTurn {
            pending,
            backend: self.chat.backend(),
        })
    }

    /// Replace the placeholder with the reply or a fallback.
    pub fn finish_chat(
        &mut self,
        turn: ChatTurn,
        reply: Result<ChatReply, ChatError>,
    ) -> Result<ChatMessage, MapError> {
        Ok(self.chat.resolve_turn(turn.pending, reply)?)
    }

    pub async fn send_chat(
        &mut self,
        message: &str,
        context_hint: Option<&str>,
    ) -> Result<ChatMessage, MapError> {
        let turn = self.begin_chat(message, context_hint)?;
        let reply = turn.request_reply().await;
        self.finish_chat(turn, reply)
    }

    pub async fn suggestion_clicked(&mut self, text: &str) -> Result<ChatMessage, MapError> {
        self.send_chat(text, None).await
    }

    /// Route a rendered affordance to its handler.
    pub async fn dispatch(&mut self, action: UiAction) -> Result<DispatchOutcome, MapError> {
        match action {
            UiAction::SuggestionClicked { text } => {
                let message = self.suggestion_clicked(&text).await?;
                Ok(DispatchOutcome::Reply { message })
            }
            UiAction::EnlargeImage { url, caption } => Ok(self.enlarge_image(url, caption)),
            UiAction::OpenVideo { url } => Ok(DispatchOutcome::OpenVideo { url }),
        }
    }

    pub fn enlarge_image(&mut self, url: String, caption: String) -> DispatchOutcome {
        self.modal.open(&url, &caption);
        DispatchOutcome::ModalOpened { url, caption }
    }

    /// Feed an input to the image modal. Returns whether it closed.
    pub fn modal_input(&mut self, input: &ModalInput) -> bool {
        self.modal.handle(input)
    }

    /// Empty the conversation and the place memory.
    pub fn clear_chat(&mut self) {
        self.chat.clear();
    }

    pub fn render(&self, message: &ChatMessage) -> DisplayUnit {
        self.renderer.render(message)
    }

    pub fn rendered_history(&self) -> Vec<DisplayUnit> {
        self.renderer.render_all(self.chat.history())
    }

    /// Export the conversation. A failure is announced as a notice and
    /// may be retried.
    pub async fn export(&self) -> Result<ExportedDocument, MapError> {
        match self.export_job().run().await {
            Ok(document) => Ok(document),
            Err(e) => {
                self.export_failed(&e);
                Err(e.into())
            }
        }
    }

    pub fn export_job(&self) -> ExportJob {
        ExportJob {
            messages: self.chat.history().to_vec(),
            exporter: self.exporter.clone(),
        }
    }

    pub fn export_failed(&self, error: &ExportError) {
        warn!(error = %error, "Export failed");
        self.chat.notice(self.prompts.export_failed());
    }

    pub fn state(&self) -> MapState {
        MapState {
            session_id: self.session_id(),
            mode: self.controller.mode(),
            profile: self.controller.profile(),
            route_start: self.controller.route_start(),
            overlay: self.overlay.clone(),
            context_window: self.chat.memory().context_window(),
            recent_places: self
                .chat
                .memory()
                .history()
                .iter()
                .map(|p| p.display_name.clone())
                .collect(),
            lookup_count: self.chat.lookup_count(),
            awaiting_reply: self.chat.is_awaiting_reply(),
            modal: self.modal.clone(),
        }
    }
}

impl std::fmt::Debug for TravelAssistant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TravelAssistant")
            .field("mode", &self.controller.mode())
            .field("chat", &self.chat)
            .field("planner", &self.planner)
            .field("route_generation", &self.route_generation)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
