//! OSRM road routing client.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use compass_core::config::RoutingConfig;
use compass_core::types::{RouteGeometry, RouteRequest, RouteResult, TravelProfile};

use crate::error::GeoError;
use crate::routing::{RouteOutcome, RoutingService};

#[derive(Debug, Deserialize)]
struct OsrmResponse {
    code: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    distance: f64,
    duration: f64,
    #[serde(default)]
    legs: Vec<OsrmLeg>,
}

#[derive(Debug, Deserialize)]
struct OsrmLeg {
    #[serde(default)]
    steps: Vec<OsrmStep>,
}

#[derive(Debug, Deserialize)]
struct OsrmStep {
    #[serde(default)]
    name: String,
    maneuver: OsrmManeuver,
}

#[derive(Debug, Deserialize)]
struct OsrmManeuver {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    modifier: Option<String>,
}

/// OSRM routing profile for a road travel profile.
pub fn osrm_profile(profile: TravelProfile) -> &'static str {
    match profile {
        TravelProfile::Foot => "foot",
        TravelProfile::Car | TravelProfile::Motorcycle | TravelProfile::Plane => "driving",
    }
}

/// Build the `route/v1` URL for a request. OSRM takes `lon,lat` pairs.
pub fn route_url(base_url: &str, request: &RouteRequest) -> String {
    format!(
        "{}/route/v1/{}/{},{};{},{}?overview=false&steps=true",
        base_url.trim_end_matches('/'),
        osrm_profile(request.profile),
        request.start.longitude,
        request.start.latitude,
        request.end.longitude,
        request.end.latitude,
    )
}

/// Turn one maneuver into a readable instruction.
fn phrase_step(step: &OsrmStep) -> String {
    let road = step.name.trim();
    let modifier = step.maneuver.modifier.as_deref().unwrap_or("");
    let base = match step.maneuver.kind.as_str() {
        "depart" => "Head out".to_string(),
        "arrive" => return "Arrive at destination".to_string(),
        "turn" | "end of road" | "fork" | "off ramp" | "on ramp" => match modifier {
            "" => "Turn".to_string(),
            "straight" => "Go straight".to_string(),
            m => format!("Turn {}", m),
        },
        "continue" | "new name" => "Continue".to_string(),
        "merge" => "Merge".to_string(),
        "roundabout" | "rotary" => "Enter the roundabout".to_string(),
        other => {
            let mut chars = other.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => "Continue".to_string(),
            }
        }
    };

    if road.is_empty() {
        base
    } else {
        format!("{} onto {}", base, road)
    }
}

/// Parse an OSRM `route` response body.
pub fn parse_route(body: &str) -> Result<RouteOutcome, GeoError> {
    let response: OsrmResponse = serde_json::from_str(body)
        .map_err(|e| GeoError::RoutingFailure(format!("malformed routing response: {}", e)))?;

    match response.code.as_str() {
        "Ok" => {}
        "NoRoute" | "NoSegment" => return Ok(RouteOutcome::NoRoute),
        code => {
            return Err(GeoError::RoutingFailure(format!(
                "{}: {}",
                code,
                response.message.unwrap_or_default()
            )))
        }
    }

    let Some(route) = response.routes.into_iter().next() else {
        return Ok(RouteOutcome::NoRoute);
    };

    let instructions = route
        .legs
        .iter()
        .flat_map(|leg| leg.steps.iter())
        .map(phrase_step)
        .collect();

    Ok(RouteOutcome::Found(RouteResult {
        distance_meters: route.distance,
        duration_seconds: route.duration,
        instructions,
        geometry: RouteGeometry::Road,
    }))
}

/// Road router backed by an OSRM HTTP server.
pub struct OsrmRouter {
    client: reqwest::Client,
    base_url: String,
}

impl OsrmRouter {
    pub fn new(config: &RoutingConfig) -> Result<Self, GeoError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GeoError::RoutingFailure(format!("http client: {}", e)))?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }
}

#[async_trait]
impl RoutingService for OsrmRouter {
    async fn route(&self, request: &RouteRequest) -> Result<RouteOutcome, GeoError> {
        let url = route_url(&self.base_url, request);
        debug!(url = %url, "Requesting route");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| GeoError::RoutingFailure(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GeoError::RoutingFailure(e.to_string()))?;

        // OSRM reports NoRoute with a 400 status and a JSON body.
        if !status.is_success() && !body.trim_start().starts_with('{') {
            return Err(GeoError::RoutingFailure(format!(
                "routing service returned {}",
                status
            )));
        }
        parse_route(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compass_core::types::Coordinate;

    fn request(profile: TravelProfile) -> RouteRequest {
        RouteRequest {
            start: Coordinate::new(16.0544, 108.2022).unwrap(),
            end: Coordinate::new(15.8801, 108.338).unwrap(),
            profile,
        }
    }

    #[test]
    fn test_profile_mapping() {
        assert_eq!(osrm_profile(TravelProfile::Car), "driving");
        assert_eq!(osrm_profile(TravelProfile::Motorcycle), "driving");
        assert_eq!(osrm_profile(TravelProfile::Foot), "foot");
    }

    #[test]
    fn test_route_url_lon_lat_order() {
        let url = route_url("https://router.example/", &request(TravelProfile::Foot));
        assert_eq!(
            url,
            "https://router.example/route/v1/foot/108.2022,16.0544;108.338,15.8801?overview=false&steps=true"
        );
    }

    #[test]
    fn test_parse_ok_route() {
        let body = r#"{
            "code": "Ok",
            "routes": [{
                "distance": 29876.4,
                "duration": 2410.2,
                "legs": [{
                    "steps": [
                        {"name": "Bạch Đằng", "maneuver": {"type": "depart", "modifier": "left"}},
                        {"name": "Võ Nguyên Giáp", "maneuver": {"type": "turn", "modifier": "right"}},
                        {"name": "", "maneuver": {"type": "roundabout"}},
                        {"name": "", "maneuver": {"type": "arrive"}}
                    ]
                }]
            }]
        }"#;

        let RouteOutcome::Found(result) = parse_route(body).unwrap() else {
            panic!("expected a route");
        };
        assert_eq!(result.distance_meters, 29876.4);
        assert_eq!(result.duration_seconds, 2410.2);
        assert_eq!(result.geometry, RouteGeometry::Road);
        assert_eq!(
            result.instructions,
            vec![
                "Head out onto Bạch Đằng",
                "Turn right onto Võ Nguyên Giáp",
                "Enter the roundabout",
                "Arrive at destination",
            ]
        );
    }

    #[test]
    fn test_parse_no_route() {
        let body = r#"{"code": "NoRoute", "message": "Impossible route between points"}"#;
        assert_eq!(parse_route(body).unwrap(), RouteOutcome::NoRoute);

        let body = r#"{"code": "Ok", "routes": []}"#;
        assert_eq!(parse_route(body).unwrap(), RouteOutcome::NoRoute);
    }

    #[test]
    fn test_parse_error_code() {
        let body = r#"{"code": "InvalidQuery", "message": "bad coordinates"}"#;
        let err = parse_route(body).unwrap_err();
        assert!(err.is_routing_failure());
        assert!(err.to_string().contains("bad coordinates"));
    }

    #[test]
    fn test_parse_malformed() {
        assert!(parse_route("<html>").unwrap_err().is_routing_failure());
    }

    #[test]
    fn test_unknown_maneuver_capitalized() {
        let step = OsrmStep {
            name: String::new(),
            maneuver: OsrmManeuver {
                kind: "notification".to_string(),
                modifier: None,
            },
        };
        assert_eq!(phrase_step(&step), "Notification");
    }

    #[test]
    fn test_new_router() {
        let router = OsrmRouter::new(&RoutingConfig::default()).unwrap();
        assert_eq!(router.base_url, "https://router.project-osrm.org");
    }
}
