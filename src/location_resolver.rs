//! Location Resolution Module
//!
//! This module turns a free-text query or a coordinate pair into a
//! [`ResolvedLocation`] by walking an ordered chain of geocoding providers.

use std::time::Instant;

use tracing::{debug, info, instrument, warn};

use crate::error::Stage;
use crate::geocoding::{GeocodingProvider, ProviderResult};
use crate::models::{LocationQuery, ResolvedLocation};
use crate::{ForecastError, Result};

/// What one sweep saw when nothing was found
#[derive(Debug, Default)]
struct SweepOutcome {
    answered: usize,
    unavailable: Vec<String>,
}

impl SweepOutcome {
    /// Not found only if some provider actually answered; otherwise an outage
    fn into_error(self, stage: Stage, query: &str) -> ForecastError {
        if self.answered == 0 && !self.unavailable.is_empty() {
            warn!("Every provider was unavailable for '{}'", query);
            ForecastError::upstream(stage, self.unavailable.join("; "))
        } else {
            warn!("No provider could resolve '{}'", query);
            ForecastError::not_found(query)
        }
    }
}

/// Resolves locations against an ordered provider chain
pub struct LocationResolver {
    providers: Vec<Box<dyn GeocodingProvider>>,
    country_qualifiers: Vec<String>,
}

/// The original text first, then "<text>, <qualifier>" unless the text already has a comma
#[must_use]
pub fn query_variations(query: &str, qualifiers: &[String]) -> Vec<String> {
    let query = query.trim();
    let mut variations = vec![query.to_string()];
    if !query.contains(',') {
        variations.extend(qualifiers.iter().map(|q| format!("{query}, {q}")));
    }
    variations
}

impl LocationResolver {
    #[must_use]
    pub fn new(providers: Vec<Box<dyn GeocodingProvider>>, country_qualifiers: Vec<String>) -> Self {
        Self {
            providers,
            country_qualifiers,
        }
    }

    /// Resolve either kind of query
    pub async fn resolve_query(&self, query: &LocationQuery) -> Result<ResolvedLocation> {
        query.validate()?;
        match query {
            LocationQuery::Text(text) => self.resolve(text).await,
            LocationQuery::Coordinates {
                latitude,
                longitude,
            } => self.reverse_resolve(*latitude, *longitude).await,
        }
    }

    /// Forward geocode free text, trying variations once the plain text is exhausted
    #[instrument(skip(self))]
    pub async fn resolve(&self, query: &str) -> Result<ResolvedLocation> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ForecastError::invalid_query("location must not be empty"));
        }

        let start_time = Instant::now();
        let mut outcome = SweepOutcome::default();

        for variation in query_variations(query, &self.country_qualifiers) {
            debug!("Trying variation: {}", variation);

            for provider in &self.providers {
                debug!("Trying {} for '{}'", provider.name(), variation);
                let result = provider.geocode(&variation).await;
                if let Some(location) = Self::accept(provider.name(), result, &mut outcome) {
                    info!(
                        "Resolved '{}' via {} to {} ({:.4}, {:.4}) in {:.3}s",
                        query,
                        provider.name(),
                        location.resolved_name,
                        location.latitude,
                        location.longitude,
                        start_time.elapsed().as_secs_f64()
                    );
                    return Ok(location);
                }
            }
        }

        Err(outcome.into_error(Stage::Geocoding, query))
    }

    /// Reverse geocode a coordinate pair; no variations apply
    #[instrument(skip(self))]
    pub async fn reverse_resolve(&self, latitude: f64, longitude: f64) -> Result<ResolvedLocation> {
        LocationQuery::Coordinates {
            latitude,
            longitude,
        }
        .validate()?;

        let mut outcome = SweepOutcome::default();

        for provider in self.providers.iter().filter(|p| p.supports_reverse()) {
            debug!("Trying {} reverse lookup", provider.name());
            let result = provider.reverse(latitude, longitude).await;
            if let Some(location) = Self::accept(provider.name(), result, &mut outcome) {
                info!(
                    "Reverse geocoded ({:.4}, {:.4}) via {} to {}",
                    latitude,
                    longitude,
                    provider.name(),
                    location.resolved_name
                );
                return Ok(location);
            }
        }

        let label = crate::models::format_coordinates(latitude, longitude);
        Err(outcome.into_error(Stage::ReverseGeocoding, &label))
    }

    /// Normalize one provider answer; `None` means keep sweeping
    fn accept(
        provider: &str,
        result: ProviderResult<ResolvedLocation>,
        outcome: &mut SweepOutcome,
    ) -> Option<ResolvedLocation> {
        match result {
            ProviderResult::Found(location) if location.has_valid_coordinates() => Some(location),
            ProviderResult::Found(location) => {
                warn!(
                    "{} returned out-of-range coordinates ({}, {}), ignoring",
                    provider, location.latitude, location.longitude
                );
                outcome.answered += 1;
                None
            }
            ProviderResult::NotFound => {
                debug!("{} found nothing", provider);
                outcome.answered += 1;
                None
            }
            ProviderResult::Unavailable(reason) => {
                warn!("{} unavailable: {}", provider, reason);
                outcome.unavailable.push(reason);
                None
            }
        }
    }
}
