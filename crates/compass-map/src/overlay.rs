//! Markers, route line, and viewport drawn over the map tiles.

use serde::Serialize;
use tracing::{debug, warn};

use compass_core::config::MapConfig;
use compass_core::types::{Coordinate, RouteGeometry, RouteRequest, RouteResult};

/// Zoom level used when centering on a search result.
pub const SEARCH_ZOOM: u8 = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerKind {
    Click,
    Search,
    RouteStart,
    RouteEnd,
}

impl MarkerKind {
    pub fn is_route(&self) -> bool {
        matches!(self, MarkerKind::RouteStart | MarkerKind::RouteEnd)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub coordinate: Coordinate,
    pub label: String,
    pub kind: MarkerKind,
}

impl Marker {
    pub fn new(coordinate: Coordinate, label: impl Into<String>, kind: MarkerKind) -> Self {
        Self {
            coordinate,
            label: label.into(),
            kind,
        }
    }
}

/// The drawn route and its summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteLine {
    pub request: RouteRequest,
    pub distance_meters: f64,
    pub duration_seconds: f64,
    pub instructions: Vec<String>,
    pub geometry: RouteGeometry,
}

impl RouteLine {
    pub fn new(request: RouteRequest, result: RouteResult) -> Self {
        Self {
            request,
            distance_meters: result.distance_meters,
            duration_seconds: result.duration_seconds,
            instructions: result.instructions,
            geometry: result.geometry,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MapView {
    pub center: Coordinate,
    pub zoom: u8,
}

impl MapView {
    /// Initial viewport from configuration. An out-of-range center falls
    /// back to the built-in default.
    pub fn from_config(config: &MapConfig) -> Self {
        let [lat, lng] = config.default_center;
        let center = Coordinate::new(lat, lng).unwrap_or_else(|e| {
            warn!(error = %e, "Invalid default map center, using built-in default");
            let [lat, lng] = MapConfig::default().default_center;
            Coordinate {
                latitude: lat,
                longitude: lng,
            }
        });
        Self {
            center,
            zoom: config.default_zoom,
        }
    }
}

/// Everything drawn on top of the map.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapOverlay {
    markers: Vec<Marker>,
    route: Option<RouteLine>,
    view: MapView,
}

impl MapOverlay {
    pub fn new(view: MapView) -> Self {
        Self {
            markers: Vec::new(),
            route: None,
            view,
        }
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn markers_of(&self, kind: MarkerKind) -> Vec<&Marker> {
        self.markers.iter().filter(|m| m.kind == kind).collect()
    }

    pub fn route(&self) -> Option<&RouteLine> {
        self.route.as_ref()
    }

    pub fn view(&self) -> MapView {
        self.view
    }

    pub fn add_marker(&mut self, marker: Marker) {
        debug!(kind = ?marker.kind, label = %marker.label, "Marker placed");
        self.markers.push(marker);
    }

    /// Place `marker`, removing earlier markers of the same kind.
    pub fn replace_marker(&mut self, marker: Marker) {
        self.markers.retain(|m| m.kind != marker.kind);
        self.add_marker(marker);
    }

    /// Remove the route line and its endpoint markers.
    pub fn clear_route(&mut self) {
        self.route = None;
        self.markers.retain(|m| !m.kind.is_route());
    }

    pub fn set_route(&mut self, line: RouteLine) {
        self.route = Some(line);
    }

    pub fn set_view(&mut self, center: Coordinate, zoom: u8) {
        self.view = MapView { center, zoom };
    }

    /// Remove every marker and the route line. The viewport is kept.
    pub fn clear(&mut self) {
        self.markers.clear();
        self.route = None;
    }
}
