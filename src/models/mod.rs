//! Data models for `SolarCast`
//!
//! This module contains the core domain models organized by concern:
//! - Location: queries, resolved locations and autocomplete suggestions
//! - Weather: hourly variables and time series points
//! - Forecast: request validation and the response bundle

pub mod forecast;
pub mod location;
pub mod weather;

// Re-export all public types for convenient access
pub use forecast::{CurrentConditions, DataRequest, ForecastBundle, ForecastRequest};
pub use location::{
    LocationQuery, ResolvedLocation, Suggestion, coordinates_in_range, format_coordinates,
};
pub use weather::{HourlySeries, TimeSeriesPoint, WeatherVariable};
