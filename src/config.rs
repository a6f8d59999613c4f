//! Configuration management for `SolarCast`
//!
//! Handles loading configuration from files, environment variables,
//! and provides validation for all configuration settings.

use crate::ForecastError;
use crate::blend::DEFAULT_ML_WEIGHT;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure for the service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    pub geocoding: GeocodingConfig,
    pub weather: WeatherConfig,
    pub model: ModelConfig,
    pub blending: BlendingConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound for a whole request, training included
    pub request_timeout_seconds: u64,
    pub tls_cert_path: Option<PathBuf>,
    pub tls_key_path: Option<PathBuf>,
}

/// Geocoding provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocodingConfig {
    pub open_meteo_url: String,
    pub nominatim_url: String,
    pub geocode_xyz_url: String,
    pub google_url: String,
    /// Google Maps key; Google is skipped entirely when absent
    pub google_api_key: Option<String>,
    pub lookup_timeout_seconds: u64,
    pub autocomplete_timeout_seconds: u64,
    /// Minimum spacing between two Nominatim calls
    pub nominatim_min_interval_ms: u64,
    /// Appended as "<query>, <qualifier>" when the plain query is not found
    pub country_qualifiers: Vec<String>,
    pub autocomplete_limit: usize,
    pub user_agent: String,
}

/// Weather API configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub forecast_base_url: String,
    pub archive_base_url: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// Maximum number of retries for failed requests
    pub max_retries: u32,
    /// The archive lags behind real time by a few days
    pub archive_delay_days: u32,
    pub max_forecast_days: u32,
}

/// Feature engineering and learner settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub lags: usize,
    pub rolling_windows: Vec<usize>,
    pub trend_k: usize,
    pub min_ensemble_rows: usize,
    pub min_single_rows: usize,
    pub max_recursive_steps: usize,
    pub forest_trees: usize,
    pub forest_max_depth: usize,
    pub boosting_stages: usize,
    pub boosting_max_depth: usize,
    pub boosting_learning_rate: f64,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub seed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlendingConfig {
    /// Weight of the ML forecast; the API forecast gets `1 - ml_weight`
    pub ml_weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub default_historical_days: u32,
    pub default_forecast_days: u32,
    pub max_historical_days: u32,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Log format (pretty or json)
    pub format: String,
    /// OTLP/HTTP collector base URL, e.g. `http://localhost:4318`
    pub otlp_endpoint: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            request_timeout_seconds: 120,
            tls_cert_path: None,
            tls_key_path: None,
        }
    }
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            open_meteo_url: "https://geocoding-api.open-meteo.com/v1".to_string(),
            nominatim_url: "https://nominatim.openstreetmap.org".to_string(),
            geocode_xyz_url: "https://geocode.xyz".to_string(),
            google_url: "https://maps.googleapis.com/maps/api".to_string(),
            google_api_key: None,
            lookup_timeout_seconds: 10,
            autocomplete_timeout_seconds: 5,
            nominatim_min_interval_ms: 1000,
            country_qualifiers: [
                "India",
                "USA",
                "United States",
                "UK",
                "United Kingdom",
                "Canada",
                "Australia",
                "Germany",
                "France",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            autocomplete_limit: 8,
            user_agent: format!("SolarCast/{} (weather forecasting service)", crate::VERSION),
        }
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            forecast_base_url: "https://api.open-meteo.com/v1".to_string(),
            archive_base_url: "https://archive-api.open-meteo.com/v1".to_string(),
            timeout_seconds: 30,
            max_retries: 3,
            archive_delay_days: 3,
            max_forecast_days: 16,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            lags: 24,
            rolling_windows: vec![6, 24],
            trend_k: 3,
            min_ensemble_rows: 48,
            min_single_rows: 10,
            max_recursive_steps: 24 * 21,
            forest_trees: 100,
            forest_max_depth: 15,
            boosting_stages: 100,
            boosting_max_depth: 8,
            boosting_learning_rate: 0.1,
            min_samples_split: 5,
            min_samples_leaf: 2,
            seed: 42,
        }
    }
}

impl Default for BlendingConfig {
    fn default() -> Self {
        Self {
            ml_weight: DEFAULT_ML_WEIGHT,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            default_historical_days: 60,
            default_forecast_days: 7,
            max_historical_days: 365,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            otlp_endpoint: None,
        }
    }
}

impl GeocodingConfig {
    #[must_use]
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_timeout_seconds)
    }

    #[must_use]
    pub fn autocomplete_timeout(&self) -> Duration {
        Duration::from_secs(self.autocomplete_timeout_seconds)
    }
}

impl ServiceConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self> {
        let path = std::env::var_os("SOLARCAST_CONFIG").map(PathBuf::from);
        Self::load_from_path(path)
    }

    /// Load configuration from specified path
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        let config_file = config_path.unwrap_or_else(|| {
            Self::get_config_path().unwrap_or_else(|| PathBuf::from("config.toml"))
        });

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // SOLARCAST_WEATHER__MAX_RETRIES=5 overrides weather.max_retries
        builder = builder.add_source(
            Environment::with_prefix("SOLARCAST")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let mut config: ServiceConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        config.apply_environment_keys();
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("solarcast").join("config.toml"))
    }

    /// Pick up the conventional Google Maps key variable when no key is configured
    pub fn apply_environment_keys(&mut self) {
        if self.geocoding.google_api_key.is_none() {
            self.geocoding.google_api_key = std::env::var("GOOGLE_MAPS_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty());
        }
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_urls()?;
        self.validate_numeric_ranges()?;
        self.validate_model()?;
        self.validate_string_values()?;
        Ok(())
    }

    fn validate_urls(&self) -> Result<()> {
        let urls = [
            ("geocoding.open_meteo_url", &self.geocoding.open_meteo_url),
            ("geocoding.nominatim_url", &self.geocoding.nominatim_url),
            ("geocoding.geocode_xyz_url", &self.geocoding.geocode_xyz_url),
            ("geocoding.google_url", &self.geocoding.google_url),
            ("weather.forecast_base_url", &self.weather.forecast_base_url),
            ("weather.archive_base_url", &self.weather.archive_base_url),
        ];

        for (key, url) in urls {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ForecastError::config(format!(
                    "{key} must be a valid HTTP or HTTPS URL, got '{url}'"
                ))
                .into());
            }
        }

        if let Some(api_key) = &self.geocoding.google_api_key {
            if api_key.trim().is_empty() {
                return Err(ForecastError::config(
                    "Google Maps API key cannot be empty if provided. Either remove it or provide a valid key.",
                )
                .into());
            }
        }

        Ok(())
    }

    /// Validate numeric configuration ranges
    fn validate_numeric_ranges(&self) -> Result<()> {
        if self.weather.timeout_seconds == 0 || self.weather.timeout_seconds > 300 {
            return Err(ForecastError::config(
                "Weather API timeout must be between 1 and 300 seconds",
            )
            .into());
        }

        if self.weather.max_retries > 10 {
            return Err(ForecastError::config("Weather API max retries cannot exceed 10").into());
        }

        if self.geocoding.lookup_timeout_seconds == 0
            || self.geocoding.autocomplete_timeout_seconds == 0
        {
            return Err(ForecastError::config("Geocoding timeouts must be positive").into());
        }

        if self.geocoding.autocomplete_limit == 0 {
            return Err(ForecastError::config("Autocomplete limit must be positive").into());
        }

        if !(0.0..=1.0).contains(&self.blending.ml_weight) {
            return Err(ForecastError::config(format!(
                "Blending ML weight must be within [0, 1], got {}",
                self.blending.ml_weight
            ))
            .into());
        }

        if self.pipeline.default_historical_days == 0
            || self.pipeline.default_forecast_days == 0
            || self.pipeline.default_historical_days > self.pipeline.max_historical_days
        {
            return Err(ForecastError::config(
                "Default day ranges must be positive and within max_historical_days",
            )
            .into());
        }

        if self.weather.max_forecast_days == 0 || self.weather.max_forecast_days > 16 {
            return Err(ForecastError::config("max_forecast_days must be between 1 and 16").into());
        }

        Ok(())
    }

    fn validate_model(&self) -> Result<()> {
        let model = &self.model;

        if !(1..=48).contains(&model.lags) {
            return Err(ForecastError::config("model.lags must be between 1 and 48").into());
        }

        if let Some(window) = model
            .rolling_windows
            .iter()
            .find(|w| **w < 2 || **w > model.lags)
        {
            return Err(ForecastError::config(format!(
                "Rolling window {window} must be between 2 and model.lags ({})",
                model.lags
            ))
            .into());
        }

        if model.trend_k >= model.lags {
            return Err(ForecastError::config("model.trend_k must be smaller than model.lags").into());
        }

        if model.min_single_rows < 2 || model.min_single_rows > model.min_ensemble_rows {
            return Err(ForecastError::config(
                "model.min_single_rows must be at least 2 and not above min_ensemble_rows",
            )
            .into());
        }

        if model.forest_trees == 0 || model.boosting_stages == 0 {
            return Err(ForecastError::config("Ensembles need at least one tree").into());
        }

        if !(0.0..=1.0).contains(&model.boosting_learning_rate) || model.boosting_learning_rate == 0.0
        {
            return Err(ForecastError::config("Boosting learning rate must be within (0, 1]").into());
        }

        Ok(())
    }

    /// Validate string configuration values
    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(ForecastError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(ForecastError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        Ok(())
    }
}
