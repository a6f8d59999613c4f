//! Shared HTTP clients
//!
//! Both clients are connection pools and cheap to clone; they hold no
//! per-request state.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};

use crate::config::{GeocodingConfig, WeatherConfig};

/// Plain client for geocoding; timeouts are set per call
pub fn geocoding_client(config: &GeocodingConfig) -> Result<Client> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .connect_timeout(config.lookup_timeout())
        .build()
        .with_context(|| "Failed to create geocoding HTTP client")
}

/// Weather client that retries connect errors and 5xx with exponential backoff
pub fn weather_client(config: &WeatherConfig, user_agent: &str) -> Result<ClientWithMiddleware> {
    let client = Client::builder()
        .timeout(Duration::from_secs(config.timeout_seconds))
        .user_agent(user_agent.to_string())
        .build()
        .with_context(|| "Failed to create weather HTTP client")?;

    let retry_policy = ExponentialBackoff::builder()
        .retry_bounds(Duration::from_millis(250), Duration::from_secs(5))
        .build_with_max_retries(config.max_retries);

    Ok(ClientBuilder::new(client)
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .build())
}
