//! Google Maps Geocoding and Places adapter (only built when a key is configured)

use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{GeocodingProvider, ProviderResult, fetch_json};
use crate::models::{ResolvedLocation, Suggestion};

#[derive(Debug, Deserialize)]
pub struct GeocodeResponse {
    pub status: String,
    #[serde(default)]
    pub results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
pub struct GeocodeResult {
    #[serde(default)]
    pub formatted_address: String,
    pub geometry: Geometry,
    #[serde(default)]
    pub address_components: Vec<AddressComponent>,
}

#[derive(Debug, Deserialize)]
pub struct Geometry {
    pub location: LatLng,
}

#[derive(Debug, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Deserialize)]
pub struct AddressComponent {
    pub long_name: String,
    #[serde(default)]
    pub types: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct AutocompleteResponse {
    pub status: String,
    #[serde(default)]
    pub predictions: Vec<Prediction>,
}

#[derive(Debug, Deserialize)]
pub struct Prediction {
    pub description: String,
    pub place_id: String,
}

#[derive(Debug, Deserialize)]
pub struct PlaceDetailsResponse {
    pub status: String,
    pub result: Option<PlaceDetails>,
}

#[derive(Debug, Deserialize)]
pub struct PlaceDetails {
    pub name: Option<String>,
    pub geometry: Geometry,
}

impl GeocodeResult {
    fn country(&self) -> Option<String> {
        self.address_components
            .iter()
            .find(|c| c.types.iter().any(|t| t == "country"))
            .map(|c| c.long_name.clone())
    }

    fn into_location(self, fallback_name: &str) -> ResolvedLocation {
        let country = self.country();
        let name = if self.formatted_address.is_empty() {
            fallback_name.to_string()
        } else {
            self.formatted_address
        };
        ResolvedLocation::new(self.geometry.location.lat, self.geometry.location.lng, name)
            .with_country(country)
    }
}

/// Map a Google status string onto the provider outcome
fn classify_status(status: &str) -> Result<bool, String> {
    match status {
        "OK" => Ok(true),
        "ZERO_RESULTS" => Ok(false),
        other => Err(format!("Google Maps answered with status {other}")),
    }
}

pub struct GoogleMapsProvider {
    client: Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl GoogleMapsProvider {
    #[must_use]
    pub fn new(client: Client, base_url: &str, api_key: &str, timeout: Duration) -> Self {
        Self {
            client,
            base_url: super::base_url(base_url),
            api_key: api_key.to_string(),
            timeout,
        }
    }

    async fn geocode_url(&self, url: &str, fallback_name: &str) -> ProviderResult<GeocodeResult> {
        let response: GeocodeResponse =
            match fetch_json(&self.client, self.name(), url, self.timeout).await {
                Ok(response) => response,
                Err(reason) => return ProviderResult::Unavailable(reason),
            };

        match classify_status(&response.status) {
            Ok(true) => response.results.into_iter().next().into(),
            Ok(false) => {
                debug!("Google Maps has no result for '{}'", fallback_name);
                ProviderResult::NotFound
            }
            Err(reason) => ProviderResult::Unavailable(reason),
        }
    }

    async fn place_details(&self, prediction: Prediction) -> Option<Suggestion> {
        let url = format!(
            "{}/place/details/json?place_id={}&key={}&fields=geometry,formatted_address,name",
            self.base_url,
            urlencoding::encode(&prediction.place_id),
            urlencoding::encode(&self.api_key)
        );

        let details: PlaceDetailsResponse =
            match fetch_json(&self.client, self.name(), &url, self.timeout).await {
                Ok(details) => details,
                Err(reason) => {
                    debug!("Skipping prediction '{}': {}", prediction.description, reason);
                    return None;
                }
            };
        if details.status != "OK" {
            return None;
        }

        let result = details.result?;
        let name = result.name.unwrap_or_else(|| {
            prediction
                .description
                .split(',')
                .next()
                .unwrap_or_default()
                .trim()
                .to_string()
        });
        Some(Suggestion {
            display_name: prediction.description,
            name,
            country: None,
            latitude: result.geometry.location.lat,
            longitude: result.geometry.location.lng,
            source: self.name().to_string(),
        })
    }
}

#[async_trait]
impl GeocodingProvider for GoogleMapsProvider {
    fn name(&self) -> &'static str {
        "Google Maps"
    }

    async fn geocode(&self, query: &str) -> ProviderResult<ResolvedLocation> {
        let url = format!(
            "{}/geocode/json?address={}&key={}",
            self.base_url,
            urlencoding::encode(query),
            urlencoding::encode(&self.api_key)
        );
        debug!("Google Maps geocode for '{}'", query);

        self.geocode_url(&url, query)
            .await
            .map(|result| result.into_location(query))
    }

    async fn reverse(&self, latitude: f64, longitude: f64) -> ProviderResult<ResolvedLocation> {
        let url = format!(
            "{}/geocode/json?latlng={},{}&key={}",
            self.base_url,
            latitude,
            longitude,
            urlencoding::encode(&self.api_key)
        );
        let label = format!("{latitude:.4}, {longitude:.4}");

        self.geocode_url(&url, &label).await.map(|result| {
            // keep the caller's coordinates, take only the naming
            let named = result.into_location(&label);
            ResolvedLocation::new(latitude, longitude, named.resolved_name)
                .with_country(named.country)
        })
    }

    async fn suggest(&self, query: &str, limit: usize) -> ProviderResult<Vec<Suggestion>> {
        let url = format!(
            "{}/place/autocomplete/json?input={}&key={}&types=geocode&language=en",
            self.base_url,
            urlencoding::encode(query),
            urlencoding::encode(&self.api_key)
        );

        let response: AutocompleteResponse =
            match fetch_json(&self.client, self.name(), &url, self.timeout).await {
                Ok(response) => response,
                Err(reason) => return ProviderResult::Unavailable(reason),
            };
        match classify_status(&response.status) {
            Ok(true) => {}
            Ok(false) => return ProviderResult::NotFound,
            Err(reason) => return ProviderResult::Unavailable(reason),
        }

        // join_all keeps prediction order
        let details = join_all(
            response
                .predictions
                .into_iter()
                .take(limit)
                .map(|prediction| self.place_details(prediction)),
        )
        .await;

        let suggestions: Vec<Suggestion> = details.into_iter().flatten().collect();
        if suggestions.is_empty() {
            ProviderResult::NotFound
        } else {
            ProviderResult::Found(suggestions)
        }
    }
}
