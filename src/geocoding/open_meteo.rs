//! Open-Meteo geocoding search (forward lookups and suggestions, no reverse)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{GeocodingProvider, ProviderResult, fetch_json};
use crate::models::{ResolvedLocation, Suggestion};

/// Geocoding response from Open-Meteo
#[derive(Debug, Deserialize)]
pub struct GeocodingResponse {
    pub results: Option<Vec<GeocodingResult>>,
}

#[derive(Debug, Deserialize)]
pub struct GeocodingResult {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: Option<f64>,
    pub country: Option<String>,
    pub admin1: Option<String>,
}

impl GeocodingResult {
    /// "name, admin1, country" with absent parts skipped
    fn display_name(&self) -> String {
        [Some(&self.name), self.admin1.as_ref(), self.country.as_ref()]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join(", ")
    }
}

pub struct OpenMeteoGeocoder {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl OpenMeteoGeocoder {
    #[must_use]
    pub fn new(client: Client, base_url: &str, timeout: Duration) -> Self {
        Self {
            client,
            base_url: super::base_url(base_url),
            timeout,
        }
    }

    async fn search(&self, query: &str, count: usize) -> Result<Vec<GeocodingResult>, String> {
        let url = format!(
            "{}/search?name={}&count={}&language=en&format=json",
            self.base_url,
            urlencoding::encode(query),
            count
        );
        debug!("Open-Meteo search for '{}'", query);

        let response: GeocodingResponse =
            fetch_json(&self.client, self.name(), &url, self.timeout).await?;
        Ok(response.results.unwrap_or_default())
    }
}

#[async_trait]
impl GeocodingProvider for OpenMeteoGeocoder {
    fn name(&self) -> &'static str {
        "Open-Meteo"
    }

    fn supports_reverse(&self) -> bool {
        false
    }

    async fn geocode(&self, query: &str) -> ProviderResult<ResolvedLocation> {
        self.search(query, 10)
            .await
            .map(|results| {
                results.into_iter().next().map(|r| {
                    ResolvedLocation::new(r.latitude, r.longitude, r.name)
                        .with_country(r.country)
                        .with_elevation(r.elevation)
                })
            })
            .into()
    }

    async fn suggest(&self, query: &str, limit: usize) -> ProviderResult<Vec<Suggestion>> {
        match self.search(query, limit).await {
            Ok(results) if results.is_empty() => ProviderResult::NotFound,
            Ok(results) => ProviderResult::Found(
                results
                    .into_iter()
                    .take(limit)
                    .map(|r| Suggestion {
                        display_name: r.display_name(),
                        name: r.name,
                        country: r.country,
                        latitude: r.latitude,
                        longitude: r.longitude,
                        source: self.name().to_string(),
                    })
                    .collect(),
            ),
            Err(reason) => ProviderResult::Unavailable(reason),
        }
    }
}
