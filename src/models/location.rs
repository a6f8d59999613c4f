//! Location model for geographic coordinates and metadata

use serde::{Deserialize, Serialize};

use crate::ForecastError;

/// What a caller asked for: free text or a coordinate pair
#[derive(Debug, Clone, PartialEq)]
pub enum LocationQuery {
    Text(String),
    Coordinates { latitude: f64, longitude: f64 },
}

/// Canonical geographic identity produced once per request
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ResolvedLocation {
    /// Human-readable name (city, region, etc.)
    pub resolved_name: String,
    pub country: Option<String>,
    /// Latitude in decimal degrees
    pub latitude: f64,
    /// Longitude in decimal degrees
    pub longitude: f64,
    /// Elevation in meters, when a provider reports one
    pub elevation: Option<f64>,
}

/// One autocomplete candidate
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Suggestion {
    pub display_name: String,
    pub name: String,
    pub country: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    /// Provider that produced the candidate
    pub source: String,
}

#[must_use]
pub fn coordinates_in_range(latitude: f64, longitude: f64) -> bool {
    (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude)
}

/// Format coordinates as a fallback location label
#[must_use]
pub fn format_coordinates(latitude: f64, longitude: f64) -> String {
    format!("{latitude:.4}, {longitude:.4}")
}

impl LocationQuery {
    /// Reject empty text and out-of-range coordinates
    pub fn validate(&self) -> Result<(), ForecastError> {
        match self {
            LocationQuery::Text(text) if text.trim().is_empty() => {
                Err(ForecastError::invalid_query("location must not be empty"))
            }
            LocationQuery::Text(_) => Ok(()),
            LocationQuery::Coordinates {
                latitude,
                longitude,
            } => {
                if coordinates_in_range(*latitude, *longitude) {
                    Ok(())
                } else {
                    Err(ForecastError::invalid_query(format!(
                        "coordinates ({latitude}, {longitude}) are out of range"
                    )))
                }
            }
        }
    }
}

impl ResolvedLocation {
    #[must_use]
    pub fn new(latitude: f64, longitude: f64, resolved_name: String) -> Self {
        Self {
            resolved_name,
            country: None,
            latitude,
            longitude,
            elevation: None,
        }
    }

    #[must_use]
    pub fn with_country(mut self, country: Option<String>) -> Self {
        self.country = country.filter(|c| !c.trim().is_empty());
        self
    }

    #[must_use]
    pub fn with_elevation(mut self, elevation: Option<f64>) -> Self {
        self.elevation = elevation;
        self
    }

    /// Location labelled only by its coordinates
    #[must_use]
    pub fn from_coordinates(latitude: f64, longitude: f64) -> Self {
        Self::new(latitude, longitude, format_coordinates(latitude, longitude))
    }

    #[must_use]
    pub fn has_valid_coordinates(&self) -> bool {
        coordinates_in_range(self.latitude, self.longitude)
    }
}

impl Suggestion {
    /// Coordinates rounded to three decimals, used to spot duplicates
    #[must_use]
    pub fn dedup_key(&self) -> (i64, i64) {
        #[allow(clippy::cast_possible_truncation)]
        let round = |v: f64| (v * 1000.0).round() as i64;
        (round(self.latitude), round(self.longitude))
    }
}
