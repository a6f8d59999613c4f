//! Error types and handling for the `SolarCast` pipeline

use thiserror::Error;

/// Pipeline stage an upstream failure happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Geocoding,
    ReverseGeocoding,
    Historical,
    Forecast,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Geocoding => "geocoding",
            Stage::ReverseGeocoding => "reverse geocoding",
            Stage::Historical => "historical weather",
            Stage::Forecast => "weather forecast",
        };
        f.write_str(name)
    }
}

/// Main error type for the forecasting pipeline
#[derive(Error, Debug)]
pub enum ForecastError {
    /// Client input is malformed
    #[error("Invalid query: {message}")]
    InvalidQuery { message: String },

    /// A requested day range is not usable
    #[error("Invalid range: {message}")]
    InvalidRange { message: String },

    /// Every provider and every query variation came back empty
    #[error("Location not found: {query}")]
    LocationNotFound { query: String },

    /// A provider outage that exhausted every fallback
    #[error("Upstream {stage} unavailable: {message}")]
    UpstreamUnavailable { stage: Stage, message: String },

    /// Too little history to train the full ensemble
    #[error("Insufficient data for {target}: {rows} usable rows")]
    InsufficientData { target: String, rows: usize },

    /// Forecast series disagree on length or timestamps
    #[error("Forecast series misaligned: {message}")]
    AlignmentError { message: String },

    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl ForecastError {
    /// Create a new invalid query error
    pub fn invalid_query<S: Into<String>>(message: S) -> Self {
        Self::InvalidQuery {
            message: message.into(),
        }
    }

    /// Create a new invalid range error
    pub fn invalid_range<S: Into<String>>(message: S) -> Self {
        Self::InvalidRange {
            message: message.into(),
        }
    }

    pub fn not_found<S: Into<String>>(query: S) -> Self {
        Self::LocationNotFound {
            query: query.into(),
        }
    }

    /// Create a new upstream error for the given stage
    pub fn upstream<S: Into<String>>(stage: Stage, message: S) -> Self {
        Self::UpstreamUnavailable {
            stage,
            message: message.into(),
        }
    }

    pub fn alignment<S: Into<String>>(message: S) -> Self {
        Self::AlignmentError {
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// HTTP status class for any transport
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            ForecastError::InvalidQuery { .. } | ForecastError::InvalidRange { .. } => 400,
            ForecastError::LocationNotFound { .. } => 404,
            ForecastError::UpstreamUnavailable { .. }
            | ForecastError::InsufficientData { .. }
            | ForecastError::AlignmentError { .. }
            | ForecastError::Config { .. } => 500,
        }
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            ForecastError::InvalidQuery { message } | ForecastError::InvalidRange { message } => {
                format!("Invalid input: {message}")
            }
            ForecastError::LocationNotFound { query } => format!(
                "Could not find location '{query}'. Try a more specific query, \
                 for example including the country name ('Pune, India'), \
                 or check the spelling."
            ),
            ForecastError::UpstreamUnavailable { stage, .. } => format!(
                "The {stage} service is currently unavailable. Please try again later."
            ),
            ForecastError::InsufficientData { target, .. } => {
                format!("Not enough history to model {target}.")
            }
            ForecastError::AlignmentError { .. } => {
                "Internal error while combining forecasts.".to_string()
            }
            ForecastError::Config { .. } => {
                "Configuration error. Please check your config file and API keys.".to_string()
            }
        }
    }
}
