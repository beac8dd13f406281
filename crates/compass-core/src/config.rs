use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{CompassError, Result};

/// Top-level configuration for the Compass assistant.
///
/// Loaded from `~/.compass/config.toml` by default. Each section corresponds
/// to one collaborator of the map-chat bridge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompassConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub geocoding: GeocodingConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub map: MapConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub prompts: PromptConfig,
}

impl CompassConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: CompassConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| CompassError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory for the SQLite history database.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// HTTP port of the browser-facing API.
    pub port: u16,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.compass/data".to_string(),
            log_level: "info".to_string(),
            port: 3030,
        }
    }
}

/// Geocoding service (Nominatim-compatible) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocodingConfig {
    pub base_url: String,
    /// Nominatim's usage policy requires an identifying User-Agent.
    pub user_agent: String,
    /// Accept-Language header sent with every lookup.
    pub language: String,
    pub timeout_secs: u64,
    /// Maximum number of forward-search candidates requested.
    pub max_results: usize,
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            base_url: "https://nominatim.openstreetmap.org".to_string(),
            user_agent: "compass-travel-assistant/0.1".to_string(),
            language: "vi,en".to_string(),
            timeout_secs: 10,
            max_results: 5,
        }
    }
}

/// Routing service (OSRM-compatible) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    /// Profile used when route mode is enabled without one.
    pub default_profile: String,
    /// Cruise speed used to estimate flight duration.
    pub cruise_speed_kmh: f64,
    /// Number of segments used to draw a great-circle line.
    pub great_circle_segments: usize,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            base_url: "https://router.project-osrm.org".to_string(),
            timeout_secs: 15,
            default_profile: "car".to_string(),
            cruise_speed_kmh: 800.0,
            great_circle_segments: 32,
        }
    }
}

/// Chat backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Full URL of the chat endpoint.
    pub endpoint: String,
    pub timeout_secs: u64,
    /// Maximum prompt length in characters.
    pub max_message_length: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:10000/chat".to_string(),
            timeout_secs: 60,
            max_message_length: 2000,
        }
    }
}

/// Map interaction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Pointer stillness required before a hover preview lookup.
    pub hover_debounce_ms: u64,
    /// Number of distinct recent places injected into prompts.
    pub context_places: usize,
    /// Initial map center as [latitude, longitude].
    pub default_center: [f64; 2],
    pub default_zoom: u8,
    /// Ask the chat about the route after a route is planned.
    pub route_chat_prompt: bool,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            hover_debounce_ms: 600,
            context_places: 3,
            default_center: [16.0471, 108.2068],
            default_zoom: 6,
            route_chat_prompt: true,
        }
    }
}

/// Conversation rendering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub max_gallery_images: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            max_gallery_images: 6,
        }
    }
}

/// Document export settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Export renderer endpoint. Empty selects the local transcript exporter.
    pub endpoint: String,
    pub default_filename: String,
    pub timeout_secs: u64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            default_filename: "travel_chat.pdf".to_string(),
            timeout_secs: 60,
        }
    }
}

/// Prompt and message templates.
///
/// Placeholders: `{place}`, `{context}`, `{coordinate}`, `{query}`,
/// `{start}`, `{end}`, `{profile}`, `{text}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    /// Prompt for a clicked, resolved place.
    pub place: String,
    /// Clause appended to `place` when the context window is non-empty.
    pub context_clause: String,
    /// Prompt for a clicked coordinate whose lookup failed.
    pub coordinate: String,
    /// Prompt for a place found through the search box.
    pub search: String,
    /// Prompt issued after a road route is planned.
    pub route: String,
    /// Prompt issued after a flight line is drawn.
    pub flight: String,
    /// Placeholder text while a reply is outstanding.
    pub pending: String,
    /// Reply used when the chat backend cannot be reached.
    pub fallback: String,
    /// Suggestion attached to the fallback reply.
    pub fallback_suggestion: String,
    /// Reply used when the backend answers with empty text.
    pub empty_reply: String,
    /// Notice shown when a search finds nothing.
    pub not_found: String,
    /// Notice shown when the geocoding service cannot be reached.
    pub search_failed: String,
    /// Notice shown when no route could be planned.
    pub route_failed: String,
    /// Notice shown when the export renderer fails.
    pub export_failed: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            place: "Introduce the history, culture, cuisine and a suggested itinerary for {place}."
                .to_string(),
            context_clause: " Take into account the places we discussed recently: {context}."
                .to_string(),
            coordinate: "What is special about the area near {coordinate}? Introduce its history, culture, cuisine and a suggested itinerary."
                .to_string(),
            search: "Introduce {place} in detail, including its history, culture and cuisine."
                .to_string(),
            route: "Give directions from {start} to {end} by {profile} and suggest beautiful stops along the way."
                .to_string(),
            flight: "I want to fly from {start} to {end}. Advise me on flight procedures and food at the airport."
                .to_string(),
            pending: "Searching for travel information...".to_string(),
            fallback: "I'm still gathering details about \"{text}\". Would you like me to show it on the map?"
                .to_string(),
            fallback_suggestion: "Show {text} on the map".to_string(),
            empty_reply: "Thanks for asking about {text}. It is an interesting travel topic."
                .to_string(),
            not_found: "Could not find \"{query}\" on the map.".to_string(),
            search_failed: "Map search is unavailable right now. Please try again.".to_string(),
            route_failed: "Could not find a {profile} route between the selected points."
                .to_string(),
            export_failed: "Export is unavailable right now. Please try again later.".to_string(),
        }
    }
}

/// Substitute `{key}` placeholders in a template.
pub fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (key, value) in values {
        out = out.replace(&format!("{{{}}}", key), value);
    }
    out
}
