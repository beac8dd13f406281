//! Error types for geocoding and routing.

use compass_core::error::CompassError;

/// Failures raised by the geocoding adapter and the route planner.
///
/// An empty forward-search result is not an error; only unreachable
/// services, malformed responses, or a missing address are.
#[derive(Debug, thiserror::Error)]
pub enum GeoError {
    #[error("lookup failure: {0}")]
    LookupFailure(String),
    #[error("search query cannot be empty")]
    EmptyQuery,
    #[error("routing failure: {0}")]
    RoutingFailure(String),
}

impl GeoError {
    pub fn is_lookup_failure(&self) -> bool {
        matches!(self, GeoError::LookupFailure(_))
    }

    pub fn is_routing_failure(&self) -> bool {
        matches!(self, GeoError::RoutingFailure(_))
    }
}

impl From<GeoError> for CompassError {
    fn from(err: GeoError) -> Self {
        match err {
            GeoError::RoutingFailure(msg) => CompassError::Routing(msg),
            other => CompassError::Geocoding(other.to_string()),
        }
    }
}
