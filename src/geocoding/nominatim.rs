//! Nominatim (OpenStreetMap) search and reverse lookups
//!
//! Nominatim's usage policy allows one request per second, so every call
//! goes through the instance's [`MinIntervalLimiter`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{GeocodingProvider, MinIntervalLimiter, ProviderResult, fetch_json};
use crate::models::{ResolvedLocation, Suggestion};

#[derive(Debug, Default, Deserialize)]
pub struct NominatimPlace {
    pub lat: Option<String>,
    pub lon: Option<String>,
    #[serde(default)]
    pub display_name: String,
    pub address: Option<NominatimAddress>,
    pub extratags: Option<NominatimExtraTags>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NominatimAddress {
    pub city: Option<String>,
    pub town: Option<String>,
    pub village: Option<String>,
    pub suburb: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub country_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NominatimExtraTags {
    pub elevation: Option<String>,
}

/// Reverse lookups answer `{"error": "..."}` when nothing is there
#[derive(Debug, Deserialize)]
pub struct ReverseResponse {
    pub error: Option<String>,
    #[serde(flatten)]
    pub place: NominatimPlace,
}

impl NominatimAddress {
    fn locality(&self) -> Option<&str> {
        self.city
            .as_deref()
            .or(self.town.as_deref())
            .or(self.village.as_deref())
            .or(self.suburb.as_deref())
            .filter(|s| !s.is_empty())
    }

    fn country_name(&self) -> Option<String> {
        self.country
            .clone()
            .or_else(|| self.country_code.as_ref().map(|c| c.to_uppercase()))
    }
}

impl NominatimPlace {
    fn coordinates(&self) -> Option<(f64, f64)> {
        let latitude = self.lat.as_deref()?.trim().parse().ok()?;
        let longitude = self.lon.as_deref()?.trim().parse().ok()?;
        Some((latitude, longitude))
    }

    /// First segment of the display name, or the query when that is empty
    fn short_name(&self, fallback: &str) -> String {
        self.display_name
            .split(',')
            .next()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(fallback)
            .to_string()
    }

    /// "city, state, country" for reverse lookups
    fn readable_name(&self) -> String {
        let Some(address) = &self.address else {
            return self.short_name("");
        };
        let locality = address.locality();
        let mut parts: Vec<&str> = Vec::with_capacity(3);
        if let Some(city) = locality {
            parts.push(city);
        }
        if let Some(state) = address.state.as_deref().filter(|s| !s.is_empty()) {
            if Some(state) != locality {
                parts.push(state);
            }
        }
        if let Some(country) = address.country.as_deref().filter(|s| !s.is_empty()) {
            parts.push(country);
        }

        if parts.is_empty() {
            self.short_name("")
        } else {
            parts.join(", ")
        }
    }

    fn elevation(&self) -> Option<f64> {
        self.extratags
            .as_ref()
            .and_then(|tags| tags.elevation.as_deref())
            .and_then(|e| e.trim().parse().ok())
    }
}

pub struct NominatimProvider {
    client: Client,
    base_url: String,
    timeout: Duration,
    limiter: MinIntervalLimiter,
}

impl NominatimProvider {
    #[must_use]
    pub fn new(client: Client, base_url: &str, timeout: Duration, min_interval: Duration) -> Self {
        Self {
            client,
            base_url: super::base_url(base_url),
            timeout,
            limiter: MinIntervalLimiter::new(min_interval),
        }
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<NominatimPlace>, String> {
        self.limiter.acquire().await;

        let url = format!(
            "{}/search?q={}&format=json&limit={}&addressdetails=1&extratags=1",
            self.base_url,
            urlencoding::encode(query),
            limit
        );
        debug!("Nominatim search for '{}'", query);

        fetch_json(&self.client, self.name(), &url, self.timeout).await
    }
}

#[async_trait]
impl GeocodingProvider for NominatimProvider {
    fn name(&self) -> &'static str {
        "Nominatim"
    }

    async fn geocode(&self, query: &str) -> ProviderResult<ResolvedLocation> {
        let places = match self.search(query, 5).await {
            Ok(places) => places,
            Err(reason) => return ProviderResult::Unavailable(reason),
        };

        places
            .into_iter()
            .find_map(|place| {
                let (latitude, longitude) = place.coordinates()?;
                let country = place.address.as_ref().and_then(NominatimAddress::country_name);
                Some(
                    ResolvedLocation::new(latitude, longitude, place.short_name(query))
                        .with_country(country)
                        .with_elevation(place.elevation()),
                )
            })
            .into()
    }

    async fn reverse(&self, latitude: f64, longitude: f64) -> ProviderResult<ResolvedLocation> {
        self.limiter.acquire().await;

        let url = format!(
            "{}/reverse?lat={}&lon={}&format=json&addressdetails=1",
            self.base_url, latitude, longitude
        );
        debug!("Nominatim reverse lookup for ({:.4}, {:.4})", latitude, longitude);

        let response: ReverseResponse =
            match fetch_json(&self.client, self.name(), &url, self.timeout).await {
                Ok(response) => response,
                Err(reason) => return ProviderResult::Unavailable(reason),
            };

        if let Some(error) = response.error {
            debug!("Nominatim reverse lookup returned nothing: {}", error);
            return ProviderResult::NotFound;
        }

        let place = response.place;
        let Some(address) = &place.address else {
            return ProviderResult::NotFound;
        };

        let name = place.readable_name();
        if name.is_empty() {
            return ProviderResult::NotFound;
        }

        // the caller's coordinates stay authoritative
        ProviderResult::Found(
            ResolvedLocation::new(latitude, longitude, name).with_country(address.country_name()),
        )
    }

    async fn suggest(&self, query: &str, limit: usize) -> ProviderResult<Vec<Suggestion>> {
        let places = match self.search(query, limit).await {
            Ok(places) => places,
            Err(reason) => return ProviderResult::Unavailable(reason),
        };

        let suggestions: Vec<Suggestion> = places
            .into_iter()
            .take(limit)
            .filter_map(|place| {
                let (latitude, longitude) = place.coordinates()?;
                let address = place.address.as_ref();
                let name = address
                    .and_then(NominatimAddress::locality)
                    .map_or_else(|| place.short_name(query), str::to_string);
                Some(Suggestion {
                    display_name: place.display_name.clone(),
                    name,
                    country: address.and_then(NominatimAddress::country_name),
                    latitude,
                    longitude,
                    source: self.name().to_string(),
                })
            })
            .collect();

        if suggestions.is_empty() {
            ProviderResult::NotFound
        } else {
            ProviderResult::Found(suggestions)
        }
    }
}
