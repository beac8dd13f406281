//! Route planning.
//!
//! Road profiles are delegated to a `RoutingService`; flights are computed
//! locally as a great-circle line with a cruise-speed duration estimate.
//! At most one route is active at a time.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use compass_core::types::{Coordinate, RouteGeometry, RouteRequest, RouteResult, TravelProfile};

use crate::error::GeoError;

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_008.8;

/// Default flight cruise speed.
pub const DEFAULT_CRUISE_SPEED_KMH: f64 = 800.0;

/// Default number of segments in a drawn great-circle line.
pub const DEFAULT_GREAT_CIRCLE_SEGMENTS: usize = 32;

/// What a road router answered.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    Found(RouteResult),
    /// The service answered but no road connects the endpoints.
    NoRoute,
}

/// A road routing backend.
#[async_trait]
pub trait RoutingService: Send + Sync {
    async fn route(&self, request: &RouteRequest) -> Result<RouteOutcome, GeoError>;
}

/// The route currently drawn on the map.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveRoute {
    pub request: RouteRequest,
    pub result: RouteResult,
}

/// Great-circle distance between two coordinates.
pub fn haversine_meters(a: Coordinate, b: Coordinate) -> f64 {
    let (lat1, lat2) = (a.latitude.to_radians(), b.latitude.to_radians());
    let d_lat = lat2 - lat1;
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_METERS * h.sqrt().min(1.0).asin()
}

/// Points along the great circle from `a` to `b`, endpoints included.
///
/// Returns `segments + 1` points. Coincident endpoints yield the two
/// endpoints only.
pub fn great_circle_points(a: Coordinate, b: Coordinate, segments: usize) -> Vec<Coordinate> {
    let segments = segments.max(1);
    let angle = haversine_meters(a, b) / EARTH_RADIUS_METERS;
    if angle.abs() < 1e-12 {
        return vec![a, b];
    }

    let to_vec = |c: Coordinate| {
        let (lat, lon) = (c.latitude.to_radians(), c.longitude.to_radians());
        [lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin()]
    };
    let (va, vb) = (to_vec(a), to_vec(b));
    let sin_angle = angle.sin();

    let mut points = Vec::with_capacity(segments + 1);
    points.push(a);
    for i in 1..segments {
        let t = i as f64 / segments as f64;
        let wa = ((1.0 - t) * angle).sin() / sin_angle;
        let wb = (t * angle).sin() / sin_angle;
        let x = wa * va[0] + wb * vb[0];
        let y = wa * va[1] + wb * vb[1];
        let z = wa * va[2] + wb * vb[2];
        let latitude = z.atan2((x * x + y * y).sqrt()).to_degrees();
        let longitude = y.atan2(x).to_degrees();
        points.push(Coordinate {
            latitude,
            longitude,
        });
    }
    points.push(b);
    points
}

/// Computes routes. Holds no drawn state, so clones can run while the
/// map is being changed elsewhere.
#[derive(Clone)]
pub struct RouteCalculator {
    service: Arc<dyn RoutingService>,
    cruise_speed_kmh: f64,
    segments: usize,
}

impl RouteCalculator {
    pub fn new(service: Arc<dyn RoutingService>) -> Self {
        Self {
            service,
            cruise_speed_kmh: DEFAULT_CRUISE_SPEED_KMH,
            segments: DEFAULT_GREAT_CIRCLE_SEGMENTS,
        }
    }

    /// Road profiles go to the routing service, flights are computed here.
    pub async fn calculate(&self, request: &RouteRequest) -> Result<RouteResult, GeoError> {
        let profile = request.profile;
        let result = if profile.is_flight() {
            self.flight(request.start, request.end)
        } else {
            match self.service.route(request).await {
                Ok(RouteOutcome::Found(result)) => result,
                Ok(RouteOutcome::NoRoute) => {
                    warn!(profile = %profile, "No road route between endpoints");
                    return Err(GeoError::RoutingFailure(format!(
                        "no {} route from {} to {}",
                        profile, request.start, request.end
                    )));
                }
                Err(e) => {
                    warn!(profile = %profile, error = %e, "Routing service failed");
                    return Err(e);
                }
            }
        };

        info!(
            profile = %profile,
            distance_m = result.distance_meters,
            duration_s = result.duration_seconds,
            "Route planned"
        );
        Ok(result)
    }

    fn flight(&self, start: Coordinate, end: Coordinate) -> RouteResult {
        let distance_meters = haversine_meters(start, end);
        let speed_mps = self.cruise_speed_kmh * 1000.0 / 3600.0;
        RouteResult {
            distance_meters,
            duration_seconds: distance_meters / speed_mps,
            instructions: Vec::new(),
            geometry: RouteGeometry::GreatCircle {
                points: great_circle_points(start, end, self.segments),
            },
        }
    }
}

impl std::fmt::Debug for RouteCalculator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteCalculator")
            .field("cruise_speed_kmh", &self.cruise_speed_kmh)
            .field("segments", &self.segments)
            .finish()
    }
}

/// Holds the active route and computes new ones.
#[derive(Debug)]
pub struct RoutePlanner {
    calculator: RouteCalculator,
    active: Option<ActiveRoute>,
}

impl RoutePlanner {
    pub fn new(service: Arc<dyn RoutingService>) -> Self {
        Self {
            calculator: RouteCalculator::new(service),
            active: None,
        }
    }

    pub fn with_cruise_speed(mut self, kmh: f64) -> Self {
        if kmh.is_finite() && kmh > 0.0 {
            self.calculator.cruise_speed_kmh = kmh;
        }
        self
    }

    pub fn with_segments(mut self, segments: usize) -> Self {
        self.calculator.segments = segments.max(1);
        self
    }

    /// A detached calculator with this planner's settings.
    pub fn calculator(&self) -> RouteCalculator {
        self.calculator.clone()
    }

    /// Compute a route between two points.
    ///
    /// Any previously active route is discarded first, so a failure leaves
    /// no route drawn.
    pub async fn plan_route(
        &mut self,
        start: Coordinate,
        end: Coordinate,
        profile: TravelProfile,
    ) -> Result<RouteResult, GeoError> {
        self.clear();
        let request = RouteRequest {
            start,
            end,
            profile,
        };
        let result = self.calculator.calculate(&request).await?;
        self.activate(request, result.clone());
        Ok(result)
    }

    /// Make a route computed by a detached calculator the drawn one.
    pub fn activate(&mut self, request: RouteRequest, result: RouteResult) {
        self.active = Some(ActiveRoute { request, result });
    }

    pub fn active(&self) -> Option<&ActiveRoute> {
        self.active.as_ref()
    }

    /// Remove the drawn route.
    pub fn clear(&mut self) {
        if self.active.take().is_some() {
            debug!("Discarded previous route");
        }
    }
}

// =============================================================================
// MockRouter
// =============================================================================

/// Deterministic road router for tests and offline runs.
///
/// Answers every request with a straight-line estimate unless told to
/// report no route or to fail.
#[derive(Default)]
pub struct MockRouter {
    no_route: AtomicBool,
    unreachable: AtomicBool,
    calls: AtomicUsize,
    requests: Mutex<Vec<RouteRequest>>,
}

impl MockRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_no_route(&self, no_route: bool) {
        self.no_route.store(no_route, Ordering::SeqCst);
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<RouteRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl RoutingService for MockRouter {
    async fn route(&self, request: &RouteRequest) -> Result<RouteOutcome, GeoError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(*request);
        }
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(GeoError::RoutingFailure(
                "routing service unreachable".to_string(),
            ));
        }
        if self.no_route.load(Ordering::SeqCst) {
            return Ok(RouteOutcome::NoRoute);
        }

        let distance_meters = haversine_meters(request.start, request.end) * 1.3;
        Ok(RouteOutcome::Found(RouteResult {
            distance_meters,
            duration_seconds: distance_meters / 13.9,
            instructions: vec![
                "Head out from the start".to_string(),
                "Arrive at destination".to_string(),
            ],
            geometry: RouteGeometry::Road,
        }))
    }
}
