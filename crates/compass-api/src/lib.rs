//! Compass API crate - axum HTTP server, route handlers, SSE streaming.
//!
//! Exposes the travel assistant to the browser: map gestures, route mode,
//! chat turns, rendered history, export, and a live stream of session
//! events.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
