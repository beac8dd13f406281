//! Nominatim geocoding client.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use compass_core::config::GeocodingConfig;
use compass_core::types::Coordinate;

use crate::error::GeoError;
use crate::geocoding::{AddressDetails, ForwardCandidate, Geocoder, ReverseLookup};

#[derive(Debug, Deserialize)]
struct NominatimReverse {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    address: Option<AddressDetails>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NominatimSearchHit {
    display_name: String,
    lat: String,
    lon: String,
}

/// Parse a `/reverse?format=json` body.
pub fn parse_reverse(body: &str) -> Result<ReverseLookup, GeoError> {
    let parsed: NominatimReverse = serde_json::from_str(body)
        .map_err(|e| GeoError::LookupFailure(format!("malformed reverse response: {}", e)))?;

    if let Some(error) = parsed.error {
        return Err(GeoError::LookupFailure(error));
    }

    Ok(ReverseLookup {
        display_name: parsed.display_name.unwrap_or_default(),
        address: parsed.address.unwrap_or_default(),
    })
}

/// Parse a `/search?format=json` body. Hits with unparseable or
/// out-of-range coordinates are skipped.
pub fn parse_search(body: &str) -> Result<Vec<ForwardCandidate>, GeoError> {
    let hits: Vec<NominatimSearchHit> = serde_json::from_str(body)
        .map_err(|e| GeoError::LookupFailure(format!("malformed search response: {}", e)))?;

    Ok(hits
        .into_iter()
        .filter_map(|hit| {
            let lat = hit.lat.trim().parse::<f64>().ok()?;
            let lon = hit.lon.trim().parse::<f64>().ok()?;
            let coordinate = Coordinate::new(lat, lon).ok()?;
            Some(ForwardCandidate {
                display_name: hit.display_name,
                coordinate,
            })
        })
        .collect())
}

/// Geocoder backed by a Nominatim-compatible HTTP service.
pub struct NominatimGeocoder {
    client: reqwest::Client,
    base_url: String,
    language: String,
}

impl NominatimGeocoder {
    pub fn new(config: &GeocodingConfig) -> Result<Self, GeoError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| GeoError::LookupFailure(format!("http client: {}", e)))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            language: config.language.clone(),
        })
    }

    async fn fetch(&self, path: &str, query: &[(&str, String)]) -> Result<String, GeoError> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT_LANGUAGE, &self.language)
            .query(query)
            .send()
            .await
            .map_err(|e| GeoError::LookupFailure(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeoError::LookupFailure(format!(
                "geocoding service returned {}",
                status
            )));
        }

        response
            .text()
            .await
            .map_err(|e| GeoError::LookupFailure(e.to_string()))
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn reverse(&self, coordinate: Coordinate) -> Result<ReverseLookup, GeoError> {
        debug!(coordinate = %coordinate, "Nominatim reverse");
        let body = self
            .fetch(
                "reverse",
                &[
                    ("format", "json".to_string()),
                    ("lat", coordinate.latitude.to_string()),
                    ("lon", coordinate.longitude.to_string()),
                    ("addressdetails", "1".to_string()),
                ],
            )
            .await?;
        parse_reverse(&body)
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ForwardCandidate>, GeoError> {
        debug!(query = %query, limit, "Nominatim search");
        let body = self
            .fetch(
                "search",
                &[
                    ("format", "json".to_string()),
                    ("q", query.to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;
        parse_search(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocoding::resolve_display_name;

    #[test]
    fn test_parse_reverse_with_address() {
        let body = r#"{
            "place_id": 123,
            "lat": "16.0544",
            "lon": "108.2022",
            "display_name": "Hải Châu, Đà Nẵng, Việt Nam",
            "address": {
                "suburb": "Hải Châu",
                "city": "Đà Nẵng",
                "country": "Việt Nam",
                "country_code": "vn"
            }
        }"#;
        let lookup = parse_reverse(body).unwrap();
        assert_eq!(lookup.address.city.as_deref(), Some("Đà Nẵng"));
        assert_eq!(resolve_display_name(&lookup).as_deref(), Some("Đà Nẵng"));
    }

    #[test]
    fn test_parse_reverse_error_field() {
        let body = r#"{"error": "Unable to geocode"}"#;
        let err = parse_reverse(body).unwrap_err();
        assert!(err.is_lookup_failure());
        assert!(err.to_string().contains("Unable to geocode"));
    }

    #[test]
    fn test_parse_reverse_without_address() {
        let body = r#"{"display_name": "Biển Đông"}"#;
        let lookup = parse_reverse(body).unwrap();
        assert_eq!(lookup.address, AddressDetails::default());
        assert_eq!(resolve_display_name(&lookup).as_deref(), Some("Biển Đông"));
    }

    #[test]
    fn test_parse_reverse_malformed() {
        assert!(parse_reverse("not json").unwrap_err().is_lookup_failure());
    }

    #[test]
    fn test_parse_search() {
        let body = r#"[
            {"display_name": "Hội An, Quảng Nam, Việt Nam", "lat": "15.8801", "lon": "108.338"},
            {"display_name": "Broken", "lat": "abc", "lon": "108"},
            {"display_name": "Hội An Tây", "lat": "15.87", "lon": "108.30"}
        ]"#;
        let candidates = parse_search(body).unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].display_name, "Hội An, Quảng Nam, Việt Nam");
        assert_eq!(candidates[0].coordinate.latitude, 15.8801);
    }

    #[test]
    fn test_parse_search_empty() {
        assert!(parse_search("[]").unwrap().is_empty());
    }

    #[test]
    fn test_new_trims_base_url() {
        let config = GeocodingConfig {
            base_url: "http://localhost:8080/".to_string(),
            ..GeocodingConfig::default()
        };
        let geocoder = NominatimGeocoder::new(&config).unwrap();
        assert_eq!(geocoder.base_url, "http://localhost:8080");
        assert_eq!(geocoder.language, "vi,en");
    }
}
