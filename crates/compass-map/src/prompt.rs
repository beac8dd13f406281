//! Prompt composition for map gestures.
//!
//! Every gesture that reaches the chat goes through one of these templates,
//! so wording lives in configuration rather than at the call sites.

use compass_core::config::{fill_template, PromptConfig};
use compass_core::types::{Coordinate, TravelProfile};

#[derive(Debug, Clone, Default)]
pub struct PromptTemplates {
    config: PromptConfig,
}

impl From<&PromptConfig> for PromptTemplates {
    fn from(config: &PromptConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

impl PromptTemplates {
    /// Prompt for a resolved place. The context clause is left out when
    /// `context` is empty.
    pub fn place_prompt(&self, place: &str, context: &str) -> String {
        let mut prompt = fill_template(&self.config.place, &[("place", place)]);
        if !context.trim().is_empty() {
            prompt.push_str(&fill_template(
                &self.config.context_clause,
                &[("context", context)],
            ));
        }
        prompt
    }

    /// Prompt for a coordinate whose reverse lookup failed.
    pub fn coordinate_prompt(&self, coordinate: Coordinate) -> String {
        fill_template(
            &self.config.coordinate,
            &[("coordinate", &coordinate.to_string())],
        )
    }

    pub fn search_prompt(&self, place: &str) -> String {
        fill_template(&self.config.search, &[("place", place)])
    }

    /// Prompt issued after a route is planned. Flights use their own
    /// template.
    pub fn route_prompt(&self, start: &str, end: &str, profile: TravelProfile) -> String {
        let template = if profile.is_flight() {
            &self.config.flight
        } else {
            &self.config.route
        };
        fill_template(
            template,
            &[
                ("start", start),
                ("end", end),
                ("profile", profile.as_str()),
            ],
        )
    }

    pub fn not_found(&self, query: &str) -> String {
        fill_template(&self.config.not_found, &[("query", query)])
    }

    pub fn search_failed(&self) -> String {
        self.config.search_failed.clone()
    }

    pub fn route_failed(&self, profile: TravelProfile) -> String {
        fill_template(&self.config.route_failed, &[("profile", profile.as_str())])
    }

    pub fn export_failed(&self) -> String {
        self.config.export_failed.clone()
    }
}
