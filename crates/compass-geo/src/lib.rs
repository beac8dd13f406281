//! Geographic collaborators of the map-chat bridge.
//!
//! Provides the failure-tolerant geocoding adapter (reverse and forward
//! lookups over a pluggable `Geocoder`), the bounded place-context memory
//! injected into chat prompts, and the route planner with its road and
//! great-circle strategies.

pub mod error;
pub mod geocoding;
pub mod memory;
pub mod nominatim;
pub mod osrm;
pub mod routing;

pub use error::GeoError;
pub use geocoding::{
    resolve_display_name, AddressDetails, ForwardCandidate, Geocoder, GeocodingAdapter,
    MockGeocoder, ReverseLookup,
};
pub use memory::PlaceContextMemory;
pub use nominatim::NominatimGeocoder;
pub use osrm::OsrmRouter;
pub use routing::{
    great_circle_points, haversine_meters, ActiveRoute, MockRouter, RouteCalculator, RouteOutcome,
    RoutePlanner, RoutingService,
};
