//! Geocoding adapter.
//!
//! Wraps forward (text -> coordinate) and reverse (coordinate -> place name)
//! lookups behind a uniform interface. The adapter owns the resolution
//! policy; `Geocoder` implementations only fetch raw service data.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use compass_core::types::{Coordinate, Place};

use crate::error::GeoError;

/// Settlement fields of a structured reverse-lookup address.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AddressDetails {
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub town: Option<String>,
    #[serde(default)]
    pub village: Option<String>,
    #[serde(default)]
    pub county: Option<String>,
}

/// Raw reverse-lookup answer from a geocoding service.
#[derive(Debug, Clone, PartialEq)]
pub struct ReverseLookup {
    /// Full formatted address. Always present.
    pub display_name: String,
    pub address: AddressDetails,
}

/// One ranked forward-search candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardCandidate {
    pub display_name: String,
    pub coordinate: Coordinate,
}

/// A geocoding backend.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Resolve a coordinate to a structured address.
    async fn reverse(&self, coordinate: Coordinate) -> Result<ReverseLookup, GeoError>;

    /// Search for places matching `query`, best match first.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ForwardCandidate>, GeoError>;
}

/// Pick the name used in chat prompts for a reverse lookup.
///
/// Prefers settlement-level names in the order city, town, village,
/// county, and falls back to the full formatted address.
pub fn resolve_display_name(lookup: &ReverseLookup) -> Option<String> {
    let address = &lookup.address;
    [
        &address.city,
        &address.town,
        &address.village,
        &address.county,
    ]
    .into_iter()
    .flatten()
    .map(|name| name.trim())
    .find(|name| !name.is_empty())
    .or_else(|| Some(lookup.display_name.trim()).filter(|name| !name.is_empty()))
    .map(str::to_string)
}

/// Failure-tolerant facade over a `Geocoder`.
#[derive(Clone)]
pub struct GeocodingAdapter {
    geocoder: Arc<dyn Geocoder>,
    max_results: usize,
}

impl GeocodingAdapter {
    pub fn new(geocoder: Arc<dyn Geocoder>, max_results: usize) -> Self {
        Self {
            geocoder,
            max_results: max_results.max(1),
        }
    }

    /// Resolve a coordinate to a place.
    ///
    /// Fails with `LookupFailure` when the service is unreachable or yields
    /// no usable address. Callers fall back to `Coordinate::describe`.
    pub async fn reverse_geocode(&self, coordinate: Coordinate) -> Result<Place, GeoError> {
        let lookup = self.geocoder.reverse(coordinate).await.map_err(|e| {
            warn!(coordinate = %coordinate, error = %e, "Reverse geocode failed");
            e
        })?;

        let name = resolve_display_name(&lookup).ok_or_else(|| {
            GeoError::LookupFailure(format!("no address for {}", coordinate))
        })?;

        debug!(coordinate = %coordinate, name = %name, "Reverse geocode resolved");
        Ok(Place::new(name, coordinate))
    }

    /// Search for places matching free text.
    ///
    /// An empty result is a valid outcome, distinct from failure.
    pub async fn forward_geocode(&self, query: &str) -> Result<Vec<Place>, GeoError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(GeoError::EmptyQuery);
        }

        let candidates = self.geocoder.search(query, self.max_results).await?;
        debug!(query = %query, count = candidates.len(), "Forward geocode finished");

        Ok(candidates
            .into_iter()
            .take(self.max_results)
            .map(|c| Place::new(c.display_name, c.coordinate).with_query(query))
            .collect())
    }
}

impl std::fmt::Debug for GeocodingAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeocodingAdapter")
            .field("max_results", &self.max_results)
            .finish()
    }
}

// =============================================================================
// MockGeocoder
// =============================================================================

/// Deterministic in-memory geocoder for tests and offline runs.
///
/// Reverse lookups match registered coordinates (within 1e-6 degrees) and
/// otherwise use the default answer, if any.
#[derive(Default)]
pub struct MockGeocoder {
    reverse_answers: Vec<(Coordinate, ReverseLookup)>,
    default_reverse: Option<ReverseLookup>,
    search_answers: Vec<(String, Vec<ForwardCandidate>)>,
    unreachable: AtomicBool,
    delay: Option<Duration>,
    reverse_calls: AtomicUsize,
    search_calls: AtomicUsize,
}

impl MockGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer reverse lookups near `coordinate` with a settlement name.
    pub fn with_place(mut self, coordinate: Coordinate, name: &str) -> Self {
        self.reverse_answers.push((
            coordinate,
            ReverseLookup {
                display_name: format!("{}, Việt Nam", name),
                address: AddressDetails {
                    city: Some(name.to_string()),
                    ..AddressDetails::default()
                },
            },
        ));
        self
    }

    pub fn with_reverse(mut self, coordinate: Coordinate, lookup: ReverseLookup) -> Self {
        self.reverse_answers.push((coordinate, lookup));
        self
    }

    pub fn with_default_reverse(mut self, lookup: ReverseLookup) -> Self {
        self.default_reverse = Some(lookup);
        self
    }

    pub fn with_search(mut self, query: &str, candidates: Vec<ForwardCandidate>) -> Self {
        self.search_answers.push((query.to_lowercase(), candidates));
        self
    }

    /// Delay every answer, to exercise superseded in-flight lookups.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Simulate an unreachable service.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub fn reverse_calls(&self) -> usize {
        self.reverse_calls.load(Ordering::SeqCst)
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl Geocoder for MockGeocoder {
    async fn reverse(&self, coordinate: Coordinate) -> Result<ReverseLookup, GeoError> {
        self.reverse_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(GeoError::LookupFailure("geocoding service unreachable".to_string()));
        }

        self.reverse_answers
            .iter()
            .find(|(c, _)| {
                (c.latitude - coordinate.latitude).abs() < 1e-6
                    && (c.longitude - coordinate.longitude).abs() < 1e-6
            })
            .map(|(_, lookup)| lookup.clone())
            .or_else(|| self.default_reverse.clone())
            .ok_or_else(|| GeoError::LookupFailure(format!("no address for {}", coordinate)))
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ForwardCandidate>, GeoError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(GeoError::LookupFailure("geocoding service unreachable".to_string()));
        }

        let key = query.to_lowercase();
        Ok(self
            .search_answers
            .iter()
            .find(|(q, _)| *q == key)
            .map(|(_, c)| c.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(lat: f64, lng: f64) -> Coordinate {
        Coordinate::new(lat, lng).unwrap()
    }

    fn lookup(display: &str, address: AddressDetails) -> ReverseLookup {
        ReverseLookup {
            display_name: display.to_string(),
            address,
        }
    }

    // ---- Resolution policy ----

    #[test]
    fn test_resolve_prefers_city() {
        let l = lookup(
            "Phường 1, Quận 1, Thành phố Hồ Chí Minh, Việt Nam",
            AddressDetails {
                city: Some("Thành phố Hồ Chí Minh".to_string()),
                town: Some("ignored".to_string()),
                village: None,
                county: Some("Quận 1".to_string()),
            },
        );
        assert_eq!(
            resolve_display_name(&l).as_deref(),
            Some("Thành phố Hồ Chí Minh")
        );
    }

    #[test]
    fn test_resolve_priority_order() {
        let town = lookup(
            "full",
            AddressDetails {
                town: Some("Hội An".to_string()),
                village: Some("Cẩm Thanh".to_string()),
                ..AddressDetails::default()
            },
        );
        assert_eq!(resolve_display_name(&town).as_deref(), Some("Hội An"));

        let village = lookup(
            "full",
            AddressDetails {
                village: Some("Cẩm Thanh".to_string()),
                county: Some("Quảng Nam".to_string()),
                ..AddressDetails::default()
            },
        );
        assert_eq!(resolve_display_name(&village).as_deref(), Some("Cẩm Thanh"));

        let county = lookup(
            "full",
            AddressDetails {
                county: Some("Quảng Nam".to_string()),
                ..AddressDetails::default()
            },
        );
        assert_eq!(resolve_display_name(&county).as_deref(), Some("Quảng Nam"));
    }

    #[test]
    fn test_resolve_falls_back_to_display_name() {
        let l = lookup("Biển Đông", AddressDetails::default());
        assert_eq!(resolve_display_name(&l).as_deref(), Some("Biển Đông"));
    }

    #[test]
    fn test_resolve_skips_blank_settlements() {
        let l = lookup(
            "Full address",
            AddressDetails {
                city: Some("   ".to_string()),
                town: Some("Sa Pa".to_string()),
                ..AddressDetails::default()
            },
        );
        assert_eq!(resolve_display_name(&l).as_deref(), Some("Sa Pa"));
    }

    #[test]
    fn test_resolve_nothing_usable() {
        let l = lookup("  ", AddressDetails::default());
        assert!(resolve_display_name(&l).is_none());
    }

    // ---- Reverse geocode ----

    #[tokio::test]
    async fn test_reverse_geocode_success() {
        let c = coord(21.0285, 105.8542);
        let mock = Arc::new(MockGeocoder::new().with_place(c, "Hà Nội"));
        let adapter = GeocodingAdapter::new(mock, 5);

        let place = adapter.reverse_geocode(c).await.unwrap();
        assert_eq!(place.display_name, "Hà Nội");
        assert_eq!(place.coordinate, c);
        assert!(place.source_query.is_none());
    }

    #[tokio::test]
    async fn test_reverse_geocode_idempotent() {
        let c = coord(16.4637, 107.5909);
        let mock = Arc::new(MockGeocoder::new().with_place(c, "Huế"));
        let adapter = GeocodingAdapter::new(mock, 5);

        let first = adapter.reverse_geocode(c).await.unwrap();
        let second = adapter.reverse_geocode(c).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_reverse_geocode_unreachable() {
        let mock = Arc::new(MockGeocoder::new().with_place(coord(1.0, 1.0), "X"));
        mock.set_unreachable(true);
        let adapter = GeocodingAdapter::new(mock, 5);

        let err = adapter.reverse_geocode(coord(1.0, 1.0)).await.unwrap_err();
        assert!(err.is_lookup_failure());
    }

    #[tokio::test]
    async fn test_reverse_geocode_no_address() {
        let adapter = GeocodingAdapter::new(Arc::new(MockGeocoder::new()), 5);
        let err = adapter.reverse_geocode(coord(0.0, 0.0)).await.unwrap_err();
        assert!(err.is_lookup_failure());
    }

    #[tokio::test]
    async fn test_reverse_geocode_blank_display_name_is_failure() {
        let mock = MockGeocoder::new().with_default_reverse(ReverseLookup {
            display_name: String::new(),
            address: AddressDetails::default(),
        });
        let adapter = GeocodingAdapter::new(Arc::new(mock), 5);
        assert!(adapter.reverse_geocode(coord(0.0, 0.0)).await.is_err());
    }

    // ---- Forward geocode ----

    #[tokio::test]
    async fn test_forward_geocode_ranked_with_query() {
        let mock = MockGeocoder::new().with_search(
            "Hoi An",
            vec![
                ForwardCandidate {
                    display_name: "Hội An, Quảng Nam, Việt Nam".to_string(),
                    coordinate: coord(15.8801, 108.338),
                },
                ForwardCandidate {
                    display_name: "Hội An Tây".to_string(),
                    coordinate: coord(15.87, 108.30),
                },
            ],
        );
        let adapter = GeocodingAdapter::new(Arc::new(mock), 5);

        let places = adapter.forward_geocode("  Hoi An ").await.unwrap();
        assert_eq!(places.len(), 2);
        assert_eq!(places[0].display_name, "Hội An, Quảng Nam, Việt Nam");
        assert_eq!(places[0].source_query.as_deref(), Some("Hoi An"));
    }

    #[tokio::test]
    async fn test_forward_geocode_empty_is_not_error() {
        let adapter = GeocodingAdapter::new(Arc::new(MockGeocoder::new()), 5);
        let places = adapter.forward_geocode("Hoi An").await.unwrap();
        assert!(places.is_empty());
    }

    #[tokio::test]
    async fn test_forward_geocode_blank_query_rejected() {
        let mock = Arc::new(MockGeocoder::new());
        let adapter = GeocodingAdapter::new(mock.clone(), 5);
        let err = adapter.forward_geocode("   ").await.unwrap_err();
        assert!(matches!(err, GeoError::EmptyQuery));
        assert_eq!(mock.search_calls(), 0);
    }

    #[tokio::test]
    async fn test_forward_geocode_respects_max_results() {
        let candidates = (0..10)
            .map(|i: i32| ForwardCandidate {
                display_name: format!("Place {}", i),
                coordinate: coord(10.0, 100.0 + f64::from(i)),
            })
            .collect();
        let mock = MockGeocoder::new().with_search("many", candidates);
        let adapter = GeocodingAdapter::new(Arc::new(mock), 3);
        let places = adapter.forward_geocode("many").await.unwrap();
        assert_eq!(places.len(), 3);
        assert_eq!(places[2].display_name, "Place 2");
    }

    #[tokio::test]
    async fn test_forward_geocode_unreachable() {
        let mock = Arc::new(MockGeocoder::new());
        mock.set_unreachable(true);
        let adapter = GeocodingAdapter::new(mock, 5);
        let err = adapter.forward_geocode("Đà Lạt").await.unwrap_err();
        assert!(err.is_lookup_failure());
    }
}
