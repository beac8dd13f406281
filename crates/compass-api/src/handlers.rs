//! Route handler functions for all API endpoints.
//!
//! Each handler extracts its parameters via axum extractors, drives the
//! `SharedAssistant`, and returns JSON (or a binary document for export).
//! No handler holds the assistant lock across a lookup or a reply.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use uuid::Uuid;

use compass_chat::{DisplayUnit, ImageModal, ModalInput, ModalTarget, SessionEvent, UiAction};
use compass_core::types::{ChatMessage, Coordinate, TravelProfile};
use compass_map::{
    ClickOutcome, DispatchOutcome, HoverOutcome, MapState, PlaceDetail, SearchOutcome,
};

use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Request types
// =============================================================================

/// A map position as sent by the browser.
#[derive(Debug, Deserialize)]
pub struct PointerBody {
    pub lat: f64,
    pub lng: f64,
}

impl PointerBody {
    fn coordinate(&self) -> Result<Coordinate, ApiError> {
        Ok(Coordinate::new(self.lat, self.lng)?)
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RouteModeBody {
    pub profile: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatBody {
    pub message: String,
    #[serde(default)]
    pub context_hint: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SuggestionBody {
    pub text: String,
}

/// Input to the image modal: a click on one of its parts, or a key.
#[derive(Debug, Deserialize)]
pub struct ModalBody {
    pub target: Option<ModalTarget>,
    pub key: Option<String>,
}

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub session_id: Uuid,
    pub messages: usize,
}

/// A chat turn's reply with its rendered form.
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub message: ChatMessage,
    pub display: DisplayUnit,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub session_id: Uuid,
    pub messages: Vec<DisplayUnit>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub session_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClearResponse {
    pub cleared: bool,
}

#[derive(Debug, Serialize)]
pub struct CancelRouteResponse {
    pub cancelled: bool,
    pub state: MapState,
}

#[derive(Debug, Serialize)]
pub struct ModalResponse {
    pub closed: bool,
    pub modal: ImageModal,
}

// =============================================================================
// Handler functions
// =============================================================================

/// GET /health - health check.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let assistant = state.assistant.lock().await;
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        session_id: assistant.session_id(),
        messages: assistant.history().len(),
    })
}

/// POST /map/click - a click on the map in the current mode.
pub async fn map_click(
    State(state): State<AppState>,
    Json(body): Json<PointerBody>,
) -> Result<Json<ClickOutcome>, ApiError> {
    let coordinate = body.coordinate()?;
    let outcome = state.assistant.click(coordinate).await?;
    Ok(Json(outcome))
}

/// POST /map/hover - debounced preview label for a hovered position.
///
/// Never waits for the assistant lock. A newer hover or any click answers
/// this one with `superseded`.
pub async fn map_hover(
    State(state): State<AppState>,
    Json(body): Json<PointerBody>,
) -> Result<Json<HoverOutcome>, ApiError> {
    let coordinate = body.coordinate()?;
    let outcome = state.assistant.hover(coordinate).await;
    Ok(Json(outcome))
}

/// GET /map/search?q= - mark every match, center on the best one and ask
/// about it.
pub async fn map_search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchOutcome>, ApiError> {
    let query = params
        .q
        .ok_or_else(|| ApiError::BadRequest("Missing required parameter 'q'".to_string()))?;
    let outcome = state.assistant.search(&query).await?;
    Ok(Json(outcome))
}

/// GET /map/search/{rank} - detail card for one marker of the last search.
pub async fn place_detail(
    State(state): State<AppState>,
    Path(rank): Path<usize>,
) -> Result<Json<PlaceDetail>, ApiError> {
    let detail = state.assistant.lock().await.place_detail(rank);
    detail
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("No search result at rank {}", rank)))
}

/// POST /map/route-mode - enter route mode with a travel profile.
pub async fn enable_route_mode(
    State(state): State<AppState>,
    Json(body): Json<RouteModeBody>,
) -> Result<Json<MapState>, ApiError> {
    let profile: TravelProfile = body
        .profile
        .as_deref()
        .unwrap_or(&state.config.routing.default_profile)
        .parse()?;
    let mut assistant = state.assistant.lock().await;
    assistant.enable_route_mode(profile)?;
    Ok(Json(assistant.state()))
}

/// DELETE /map/route-mode - leave route mode.
pub async fn cancel_route_mode(State(state): State<AppState>) -> Json<CancelRouteResponse> {
    let mut assistant = state.assistant.lock().await;
    let cancelled = assistant.cancel_route_mode();
    Json(CancelRouteResponse {
        cancelled,
        state: assistant.state(),
    })
}

/// DELETE /map/decorations - remove all markers and the route.
pub async fn clear_map(State(state): State<AppState>) -> Json<MapState> {
    let mut assistant = state.assistant.lock().await;
    assistant.clear_map();
    Json(assistant.state())
}

/// GET /map/state - mode, overlay, and place context.
pub async fn map_state(State(state): State<AppState>) -> Json<MapState> {
    let snapshot = state.assistant.lock().await.state();
    Json(snapshot)
}

/// POST /chat - send a typed prompt.
pub async fn chat_send(
    State(state): State<AppState>,
    Json(body): Json<ChatBody>,
) -> Result<Json<ChatResponse>, ApiError> {
    let message = state
        .assistant
        .send_chat(&body.message, body.context_hint.as_deref())
        .await?;
    let display = state.assistant.lock().await.render(&message);
    Ok(Json(ChatResponse { message, display }))
}

/// POST /chat/suggestion - a suggestion button was clicked.
pub async fn chat_suggestion(
    State(state): State<AppState>,
    Json(body): Json<SuggestionBody>,
) -> Result<Json<ChatResponse>, ApiError> {
    let message = state.assistant.suggestion_clicked(&body.text).await?;
    let display = state.assistant.lock().await.render(&message);
    Ok(Json(ChatResponse { message, display }))
}

/// POST /chat/action - any rendered affordance (suggestion, image, video).
pub async fn chat_action(
    State(state): State<AppState>,
    Json(action): Json<UiAction>,
) -> Result<Json<DispatchOutcome>, ApiError> {
    let outcome = state.assistant.dispatch(action).await?;
    Ok(Json(outcome))
}

/// POST /chat/modal - click or key press on the image modal.
pub async fn chat_modal(
    State(state): State<AppState>,
    Json(body): Json<ModalBody>,
) -> Result<Json<ModalResponse>, ApiError> {
    let input = match (body.target, body.key) {
        (Some(target), _) => ModalInput::Click(target),
        (None, Some(key)) => ModalInput::Key(key),
        (None, None) => {
            return Err(ApiError::BadRequest(
                "Either 'target' or 'key' is required".to_string(),
            ))
        }
    };
    let mut assistant = state.assistant.lock().await;
    let closed = assistant.modal_input(&input);
    Ok(Json(ModalResponse {
        closed,
        modal: assistant.modal().clone(),
    }))
}

/// GET /chat/history - the conversation as display units.
pub async fn chat_history(State(state): State<AppState>) -> Json<HistoryResponse> {
    let assistant = state.assistant.lock().await;
    Json(HistoryResponse {
        session_id: assistant.session_id(),
        messages: assistant.rendered_history(),
    })
}

/// POST /session - start a new session, as on a page load.
///
/// The previous conversation stays in the history store under its own id.
pub async fn start_session(State(state): State<AppState>) -> Json<SessionResponse> {
    let session_id = state.assistant.start_session().await;
    Json(SessionResponse { session_id })
}

/// POST /chat/clear - empty the conversation and the place memory.
pub async fn chat_clear(State(state): State<AppState>) -> Json<ClearResponse> {
    state.assistant.lock().await.clear_chat();
    Json(ClearResponse { cleared: true })
}

/// POST /chat/export - download the conversation as a document.
pub async fn chat_export(State(state): State<AppState>) -> Result<Response, ApiError> {
    let document = state.assistant.export().await?;
    let disposition = format!(
        "attachment; filename=\"{}\"",
        document.filename.replace('"', "")
    );
    Ok((
        [
            (header::CONTENT_TYPE, document.content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        document.bytes,
    )
        .into_response())
}

/// GET /stream - SSE stream of session events.
pub async fn stream(
    State(state): State<AppState>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>> + Send> {
    let rx = state.event_tx.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(event) => Some(Ok(to_sse(&event))),
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

fn to_sse(event: &SessionEvent) -> Event {
    let name = match event {
        SessionEvent::MessageAppended { .. } => "message_appended",
        SessionEvent::PlaceholderShown { .. } => "placeholder_shown",
        SessionEvent::PlaceholderResolved { .. } => "placeholder_resolved",
        SessionEvent::HistoryCleared => "history_cleared",
        SessionEvent::Notice { .. } => "notice",
        SessionEvent::SessionStarted { .. } => "session_started",
    };
    let data = serde_json::to_string(event).unwrap_or_default();
    Event::default().event(name).data(data)
}
