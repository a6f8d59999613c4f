//! `SolarCast` - location-resolved weather forecasts blended with per-request models
//!
//! This library resolves a place to coordinates, pulls hourly history and
//! forecast data, trains a small ensemble per target variable and blends its
//! predictions with the provider forecast.

pub mod api;
pub mod autocomplete;
pub mod blend;
pub mod config;
pub mod ensemble;
pub mod error;
pub mod features;
pub mod geocoding;
pub mod http;
pub mod location_resolver;
pub mod models;
pub mod pipeline;
pub mod telemetry;
pub mod weather;
pub mod web;

// Re-export core types for public API
pub use autocomplete::AutocompleteAggregator;
pub use blend::{DEFAULT_ML_WEIGHT, blend};
pub use config::ServiceConfig;
pub use ensemble::EnsembleForecaster;
pub use error::{ForecastError, Stage};
pub use location_resolver::LocationResolver;
pub use models::{DataRequest, ForecastBundle, ResolvedLocation, Suggestion, TimeSeriesPoint};
pub use pipeline::ForecastService;
pub use weather::WeatherFetcher;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, ForecastError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
