//! Geocoding provider adapters
//!
//! Every external geocoder is wrapped behind [`GeocodingProvider`] so the
//! resolver and the autocomplete aggregator can drive an ordered chain of
//! them without knowing any wire format.

pub mod geocode_xyz;
pub mod google;
pub mod nominatim;
pub mod open_meteo;
pub mod rate_limit;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::GeocodingConfig;
use crate::models::{ResolvedLocation, Suggestion};

pub use geocode_xyz::GeocodeXyzProvider;
pub use google::GoogleMapsProvider;
pub use nominatim::NominatimProvider;
pub use open_meteo::OpenMeteoGeocoder;
pub use rate_limit::MinIntervalLimiter;

/// Outcome of a single provider call
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderResult<T> {
    Found(T),
    /// The provider answered but had nothing for the query
    NotFound,
    /// Transport failure, timeout, bad status or unparseable body
    Unavailable(String),
}

impl<T> ProviderResult<T> {
    #[must_use]
    pub fn is_found(&self) -> bool {
        matches!(self, ProviderResult::Found(_))
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> ProviderResult<U> {
        match self {
            ProviderResult::Found(value) => ProviderResult::Found(f(value)),
            ProviderResult::NotFound => ProviderResult::NotFound,
            ProviderResult::Unavailable(reason) => ProviderResult::Unavailable(reason),
        }
    }
}

impl<T> From<Option<T>> for ProviderResult<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(ProviderResult::NotFound, ProviderResult::Found)
    }
}

impl<T> From<Result<Option<T>, String>> for ProviderResult<T> {
    fn from(value: Result<Option<T>, String>) -> Self {
        match value {
            Ok(found) => found.into(),
            Err(reason) => ProviderResult::Unavailable(reason),
        }
    }
}

/// A geocoding backend; capabilities it lacks answer `NotFound`
#[async_trait]
pub trait GeocodingProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn geocode(&self, query: &str) -> ProviderResult<ResolvedLocation>;

    /// Providers without reverse lookups are skipped by the reverse sweep
    fn supports_reverse(&self) -> bool {
        true
    }

    async fn reverse(&self, _latitude: f64, _longitude: f64) -> ProviderResult<ResolvedLocation> {
        ProviderResult::NotFound
    }

    async fn suggest(&self, _query: &str, _limit: usize) -> ProviderResult<Vec<Suggestion>> {
        ProviderResult::NotFound
    }
}

/// Providers in lookup order: Google (with a key), Open-Meteo, Nominatim, GeoCode.xyz
#[must_use]
pub fn lookup_providers(config: &GeocodingConfig, client: &Client) -> Vec<Box<dyn GeocodingProvider>> {
    let timeout = config.lookup_timeout();
    let mut providers: Vec<Box<dyn GeocodingProvider>> = Vec::with_capacity(4);

    if let Some(key) = &config.google_api_key {
        providers.push(Box::new(GoogleMapsProvider::new(
            client.clone(),
            &config.google_url,
            key,
            timeout,
        )));
    }
    providers.push(Box::new(OpenMeteoGeocoder::new(
        client.clone(),
        &config.open_meteo_url,
        timeout,
    )));
    providers.push(Box::new(NominatimProvider::new(
        client.clone(),
        &config.nominatim_url,
        timeout,
        Duration::from_millis(config.nominatim_min_interval_ms),
    )));
    providers.push(Box::new(GeocodeXyzProvider::new(
        client.clone(),
        &config.geocode_xyz_url,
        timeout,
    )));

    providers
}

/// Providers in suggestion order: Open-Meteo, Nominatim, Google (with a key)
#[must_use]
pub fn suggestion_providers(
    config: &GeocodingConfig,
    client: &Client,
) -> Vec<Box<dyn GeocodingProvider>> {
    let timeout = config.autocomplete_timeout();
    let mut providers: Vec<Box<dyn GeocodingProvider>> = vec![
        Box::new(OpenMeteoGeocoder::new(
            client.clone(),
            &config.open_meteo_url,
            timeout,
        )),
        Box::new(NominatimProvider::new(
            client.clone(),
            &config.nominatim_url,
            timeout,
            Duration::from_millis(config.nominatim_min_interval_ms),
        )),
    ];

    if let Some(key) = &config.google_api_key {
        providers.push(Box::new(GoogleMapsProvider::new(
            client.clone(),
            &config.google_url,
            key,
            timeout,
        )));
    }

    providers
}

/// GET `url` and decode a JSON body; any failure becomes a reason string
pub(crate) async fn fetch_json<T: DeserializeOwned>(
    client: &Client,
    provider: &str,
    url: &str,
    timeout: Duration,
) -> Result<T, String> {
    let response = client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                format!("{provider} timed out after {}s", timeout.as_secs_f64())
            } else {
                // URLs may carry an API key
                format!("{provider} request failed: {}", e.without_url())
            }
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(format!("{provider} returned HTTP {status}"));
    }

    let body = response
        .json::<T>()
        .await
        .map_err(|e| format!("{provider} returned an unreadable body: {}", e.without_url()))?;

    debug!("{} answered in time", provider);
    Ok(body)
}

/// Trim a base URL so paths can be appended with a single slash
pub(crate) fn base_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeocodingConfig;

    #[test]
    fn test_lookup_order_without_google_key() {
        let config = GeocodingConfig::default();
        let providers = lookup_providers(&config, &Client::new());
        let names: Vec<_> = providers.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["Open-Meteo", "Nominatim", "GeoCode.xyz"]);
    }

    #[test]
    fn test_google_leads_lookup_and_trails_suggestions_with_key() {
        let config = GeocodingConfig {
            google_api_key: Some("key".to_string()),
            ..GeocodingConfig::default()
        };
        let client = Client::new();

        let lookup: Vec<_> = lookup_providers(&config, &client)
            .iter()
            .map(|p| p.name())
            .collect();
        assert_eq!(lookup, vec!["Google Maps", "Open-Meteo", "Nominatim", "GeoCode.xyz"]);

        let suggest: Vec<_> = suggestion_providers(&config, &client)
            .iter()
            .map(|p| p.name())
            .collect();
        assert_eq!(suggest, vec!["Open-Meteo", "Nominatim", "Google Maps"]);
    }

    #[test]
    fn test_provider_result_conversions() {
        let found: ProviderResult<u8> = Some(1).into();
        assert_eq!(found, ProviderResult::Found(1));

        let empty: ProviderResult<u8> = None.into();
        assert_eq!(empty, ProviderResult::NotFound);

        let failed: ProviderResult<u8> = Err("boom".to_string()).into();
        assert_eq!(failed, ProviderResult::Unavailable("boom".to_string()));
        assert_eq!(found.map(|v| v * 2), ProviderResult::Found(2));
    }

    #[tokio::test]
    async fn test_transport_failure_reason_omits_api_key() {
        // nothing listens on port 1
        let url = "http://127.0.0.1:1/geocode/json?address=Pune&key=secret-key";
        let reason = fetch_json::<serde_json::Value>(&Client::new(), "Google Maps", url, Duration::from_secs(5))
            .await
            .unwrap_err();

        assert!(reason.starts_with("Google Maps"), "{reason}");
        assert!(!reason.contains("secret-key"), "{reason}");
    }

    #[tokio::test]
    async fn test_unreadable_body_reason_omits_api_key() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
            .mount(&server)
            .await;

        let url = format!("{}/geocode/json?address=Pune&key=secret-key", server.uri());
        let reason = fetch_json::<serde_json::Value>(&Client::new(), "Google Maps", &url, Duration::from_secs(5))
            .await
            .unwrap_err();

        assert!(reason.contains("unreadable body"), "{reason}");
        assert!(!reason.contains("secret-key"), "{reason}");
    }
}
