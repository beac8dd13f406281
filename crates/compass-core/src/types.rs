use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CompassError, Result};

// =============================================================================
// Geography
// =============================================================================

/// A WGS84 position. Latitude in [-90, 90], longitude in [-180, 180].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    /// Create a coordinate, rejecting out-of-range or non-finite values.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);
        if valid {
            Ok(Self {
                latitude,
                longitude,
            })
        } else {
            Err(CompassError::InvalidCoordinate {
                latitude,
                longitude,
            })
        }
    }

    /// Coordinate-only place description used when reverse lookup fails.
    pub fn describe(&self) -> String {
        format!("area near {}", self)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}, {:.4}", self.latitude, self.longitude)
    }
}

/// A named location produced by the geocoding adapter. Never mutated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub display_name: String,
    pub coordinate: Coordinate,
    /// Free-text query that produced this place, for forward lookups.
    pub source_query: Option<String>,
}

impl Place {
    pub fn new(display_name: impl Into<String>, coordinate: Coordinate) -> Self {
        Self {
            display_name: display_name.into(),
            coordinate,
            source_query: None,
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.source_query = Some(query.into());
        self
    }
}

// =============================================================================
// Routing
// =============================================================================

/// Travel profile selected for a route.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TravelProfile {
    #[default]
    Car,
    Foot,
    Motorcycle,
    /// Flight: drawn as a direct great-circle line, no road router.
    Plane,
}

impl TravelProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            TravelProfile::Car => "car",
            TravelProfile::Foot => "foot",
            TravelProfile::Motorcycle => "motorcycle",
            TravelProfile::Plane => "plane",
        }
    }

    pub fn is_flight(&self) -> bool {
        matches!(self, TravelProfile::Plane)
    }
}

impl fmt::Display for TravelProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TravelProfile {
    type Err = CompassError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "car" | "driving" => Ok(TravelProfile::Car),
            "foot" | "walking" => Ok(TravelProfile::Foot),
            "motorcycle" | "motorbike" => Ok(TravelProfile::Motorcycle),
            "plane" | "flight" => Ok(TravelProfile::Plane),
            other => Err(CompassError::Config(format!(
                "unknown travel profile: {}",
                other
            ))),
        }
    }
}

/// Transient request built during route mode.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RouteRequest {
    pub start: Coordinate,
    pub end: Coordinate,
    pub profile: TravelProfile,
}

/// How the route line is drawn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RouteGeometry {
    /// Road route drawn by the map's routing layer.
    Road,
    /// Direct connecting line between endpoints.
    GreatCircle { points: Vec<Coordinate> },
}

/// Resolved route summary. Replaced wholesale on every new request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RouteResult {
    pub distance_meters: f64,
    pub duration_seconds: f64,
    pub instructions: Vec<String>,
    pub geometry: RouteGeometry,
}

// =============================================================================
// Conversation
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = CompassError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "user" => Ok(Role::User),
            "assistant" | "bot" => Ok(Role::Assistant),
            other => Err(CompassError::Serialization(format!("unknown role: {}", other))),
        }
    }
}

/// Delivery state of a conversation entry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    #[default]
    Delivered,
    /// Transient placeholder shown while a reply is outstanding.
    Pending,
    /// Locally generated reply after a transport failure.
    Fallback,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaImage {
    pub url: String,
    #[serde(default)]
    pub caption: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaVideo {
    pub url: String,
    #[serde(default)]
    pub title: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    #[serde(default)]
    pub images: Vec<MediaImage>,
    #[serde(default)]
    pub videos: Vec<MediaVideo>,
}

impl Media {
    pub fn is_empty(&self) -> bool {
        self.images.is_empty() && self.videos.is_empty()
    }
}

/// One entry of the conversation history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub role: Role,
    pub text: String,
    #[serde(default)]
    pub media: Media,
    #[serde(default)]
    pub suggestions: Vec<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub status: MessageStatus,
}

impl ChatMessage {
    fn build(role: Role, text: impl Into<String>, status: MessageStatus) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            text: text.into(),
            media: Media::default(),
            suggestions: Vec::new(),
            timestamp: Utc::now(),
            status,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::build(Role::User, text, MessageStatus::Delivered)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::build(Role::Assistant, text, MessageStatus::Delivered)
    }

    pub fn pending(text: impl Into<String>) -> Self {
        Self::build(Role::Assistant, text, MessageStatus::Pending)
    }

    pub fn fallback(text: impl Into<String>) -> Self {
        Self::build(Role::Assistant, text, MessageStatus::Fallback)
    }

    pub fn with_media(mut self, media: Media) -> Self {
        self.media = media;
        self
    }

    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }

    pub fn is_pending(&self) -> bool {
        self.status == MessageStatus::Pending
    }
}

// =============================================================================
// Map interaction
// =============================================================================

/// Map interaction mode. Exactly one value per assistant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionMode {
    #[default]
    Normal,
    RouteAwaitingStart,
    RouteAwaitingEnd,
}

impl InteractionMode {
    /// Returns whether a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: &InteractionMode) -> bool {
        matches!(
            (self, target),
            (InteractionMode::Normal, InteractionMode::RouteAwaitingStart)
                | (InteractionMode::RouteAwaitingStart, InteractionMode::RouteAwaitingEnd)
                | (InteractionMode::RouteAwaitingEnd, InteractionMode::Normal)
                // Re-enable restarts the selection
                | (InteractionMode::RouteAwaitingStart, InteractionMode::RouteAwaitingStart)
                | (InteractionMode::RouteAwaitingEnd, InteractionMode::RouteAwaitingStart)
                // Cancel
                | (InteractionMode::RouteAwaitingStart, InteractionMode::Normal)
        )
    }

    pub fn is_route_mode(&self) -> bool {
        !matches!(self, InteractionMode::Normal)
    }
}

impl fmt::Display for InteractionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InteractionMode::Normal => write!(f, "Normal"),
            InteractionMode::RouteAwaitingStart => write!(f, "RouteAwaitingStart"),
            InteractionMode::RouteAwaitingEnd => write!(f, "RouteAwaitingEnd"),
        }
    }
}
