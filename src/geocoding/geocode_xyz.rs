//! GeoCode.xyz free-tier lookups
//!
//! The service reports "not found" as coordinates `(0, 0)` and mixes strings,
//! numbers and empty objects in the same fields, so the payload is read
//! loosely through `serde_json::Value`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use super::{GeocodingProvider, ProviderResult, fetch_json};
use crate::models::ResolvedLocation;

fn as_f64(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_text(value: Option<&Value>) -> Option<String> {
    value?
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub struct GeocodeXyzProvider {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl GeocodeXyzProvider {
    #[must_use]
    pub fn new(client: Client, base_url: &str, timeout: Duration) -> Self {
        Self {
            client,
            base_url: super::base_url(base_url),
            timeout,
        }
    }
}

#[async_trait]
impl GeocodingProvider for GeocodeXyzProvider {
    fn name(&self) -> &'static str {
        "GeoCode.xyz"
    }

    async fn geocode(&self, query: &str) -> ProviderResult<ResolvedLocation> {
        let url = format!(
            "{}/?geoit=JSON&scantext={}&json=1",
            self.base_url,
            urlencoding::encode(query)
        );
        debug!("GeoCode.xyz lookup for '{}'", query);

        let body: Value = match fetch_json(&self.client, self.name(), &url, self.timeout).await {
            Ok(body) => body,
            Err(reason) => return ProviderResult::Unavailable(reason),
        };

        let (Some(latitude), Some(longitude)) =
            (as_f64(body.get("latt")), as_f64(body.get("longt")))
        else {
            return ProviderResult::NotFound;
        };
        if latitude == 0.0 && longitude == 0.0 {
            return ProviderResult::NotFound;
        }

        let standard = body.get("standard");
        let name = as_text(standard.and_then(|s| s.get("city")))
            .unwrap_or_else(|| query.to_string());
        let country = as_text(standard.and_then(|s| s.get("countryname")));

        ProviderResult::Found(ResolvedLocation::new(latitude, longitude, name).with_country(country))
    }

    async fn reverse(&self, latitude: f64, longitude: f64) -> ProviderResult<ResolvedLocation> {
        let url = format!("{}/{},{}?json=1", self.base_url, latitude, longitude);
        debug!("GeoCode.xyz reverse lookup for ({:.4}, {:.4})", latitude, longitude);

        let body: Value = match fetch_json(&self.client, self.name(), &url, self.timeout).await {
            Ok(body) => body,
            Err(reason) => return ProviderResult::Unavailable(reason),
        };

        if body.get("error").is_some() {
            return ProviderResult::NotFound;
        }

        let city = as_text(body.get("city"));
        let country = as_text(body.get("country"));
        let name = match (&city, &country) {
            (Some(city), Some(country)) => format!("{city}, {country}"),
            (Some(only), None) | (None, Some(only)) => only.clone(),
            (None, None) => return ProviderResult::NotFound,
        };

        ProviderResult::Found(ResolvedLocation::new(latitude, longitude, name).with_country(country))
    }
}
