//! Router setup with all API routes and middleware.
//!
//! Configures the axum Router with CORS, tracing, compression,
//! and all endpoint handlers.

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use compass_core::config::CompassConfig;
use compass_core::error::CompassError;

use crate::handlers;
use crate::state::AppState;

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    // Allow the page served on the configured port and a dev server on port+1.
    let port = state.config.general.port;
    let origins: Vec<HeaderValue> = [port, port.saturating_add(1)]
        .iter()
        .flat_map(|p| {
            [
                format!("http://127.0.0.1:{}", p),
                format!("http://localhost:{}", p),
            ]
        })
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    let map_routes = Router::new()
        .route("/map/click", post(handlers::map_click))
        .route("/map/hover", post(handlers::map_hover))
        .route("/map/search", get(handlers::map_search))
        .route("/map/search/{rank}", get(handlers::place_detail))
        .route(
            "/map/route-mode",
            post(handlers::enable_route_mode).delete(handlers::cancel_route_mode),
        )
        .route("/map/decorations", delete(handlers::clear_map))
        .route("/map/state", get(handlers::map_state));

    let chat_routes = Router::new()
        .route("/chat", post(handlers::chat_send))
        .route("/chat/suggestion", post(handlers::chat_suggestion))
        .route("/chat/action", post(handlers::chat_action))
        .route("/chat/modal", post(handlers::chat_modal))
        .route("/chat/history", get(handlers::chat_history))
        .route("/chat/clear", post(handlers::chat_clear))
        .route("/chat/export", post(handlers::chat_export));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/session", post(handlers::start_session))
        .route("/stream", get(handlers::stream))
        .merge(map_routes)
        .merge(chat_routes)
        .layer(DefaultBodyLimit::max(64 * 1024))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server on the configured port.
///
/// Binds to 127.0.0.1 (localhost only).
pub async fn start_server(config: &CompassConfig, state: AppState) -> Result<(), CompassError> {
    let addr = format!("127.0.0.1:{}", config.general.port);
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| CompassError::Api(format!("Failed to bind {}: {}", addr, e)))?;

    tracing::info!(addr = %addr, "API server listening");

    axum::serve(listener, router)
        .await
        .map_err(|e| CompassError::Api(format!("Server error: {}", e)))?;

    Ok(())
}
