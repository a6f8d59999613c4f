use anyhow::{Context, Result};
use solarcast::{ServiceConfig, telemetry, web};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServiceConfig::load().with_context(|| "Failed to load configuration")?;
    let _telemetry = telemetry::init(&config.logging)?;

    info!(
        "Starting SolarCast {} on {}:{}",
        solarcast::VERSION,
        config.server.host,
        config.server.port
    );
    if config.geocoding.google_api_key.is_none() {
        info!("No Google Maps API key configured, using open geocoders only");
    }

    web::run(config).await
}
