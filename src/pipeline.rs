//! Forecast Pipeline
//!
//! Request to bundle orchestration: resolve the location, fetch history and
//! forecast concurrently, train one model per target variable, then blend.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use reqwest::Client;
use tracing::{debug, error, info, instrument, warn};

use crate::autocomplete::AutocompleteAggregator;
use crate::blend::blend;
use crate::config::ServiceConfig;
use crate::ensemble::EnsembleForecaster;
use crate::geocoding::{lookup_providers, suggestion_providers};
use crate::http::{geocoding_client, weather_client};
use crate::location_resolver::LocationResolver;
use crate::models::{
    DataRequest, ForecastBundle, ForecastRequest, HourlySeries, LocationQuery, ResolvedLocation,
    Suggestion, TimeSeriesPoint, WeatherVariable,
};
use crate::weather::{WeatherFetcher, current_conditions};
use crate::{ForecastError, Result};

/// Shared, immutable service state; every request builds its own provider chain
pub struct ForecastService {
    config: Arc<ServiceConfig>,
    geocoding_client: Client,
    weather: WeatherFetcher,
}

/// Copy each target's predictions into one series aligned to `horizon`
#[must_use]
pub fn merge_predictions(
    horizon: &[DateTime<Utc>],
    predictions: &[(WeatherVariable, Vec<TimeSeriesPoint>)],
) -> Vec<TimeSeriesPoint> {
    let mut merged: Vec<TimeSeriesPoint> =
        horizon.iter().map(|t| TimeSeriesPoint::empty(*t)).collect();

    for (target, points) in predictions {
        for (slot, point) in merged.iter_mut().zip(points) {
            if slot.time == point.time {
                slot.set(*target, point.get(*target));
            }
        }
    }
    merged
}

impl ForecastService {
    pub fn new(config: ServiceConfig) -> anyhow::Result<Self> {
        let geocoding_client = geocoding_client(&config.geocoding)?;
        let weather = WeatherFetcher::new(
            weather_client(&config.weather, &config.geocoding.user_agent)?,
            config.weather.clone(),
        );

        Ok(Self {
            config: Arc::new(config),
            geocoding_client,
            weather,
        })
    }

    #[must_use]
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    fn resolver(&self) -> LocationResolver {
        LocationResolver::new(
            lookup_providers(&self.config.geocoding, &self.geocoding_client),
            self.config.geocoding.country_qualifiers.clone(),
        )
    }

    /// Validate a raw request body and run the full pipeline
    pub async fn run(&self, request: &DataRequest) -> Result<ForecastBundle> {
        let pipeline = &self.config.pipeline;
        let request = request.validate(
            pipeline.default_historical_days,
            pipeline.default_forecast_days,
            pipeline.max_historical_days,
        )?;
        self.forecast(&request).await
    }

    #[instrument(skip(self), fields(historical_days = request.historical_days, forecast_days = request.forecast_days))]
    pub async fn forecast(&self, request: &ForecastRequest) -> Result<ForecastBundle> {
        let start_time = Instant::now();

        let mut location = self.resolve_location(&request.query).await?;

        let (historical, forecast) = tokio::join!(
            self.weather
                .fetch_historical(&location, i64::from(request.historical_days)),
            self.weather
                .fetch_forecast(&location, i64::from(request.forecast_days)),
        );

        let historical = historical.unwrap_or_else(|e| {
            warn!("Historical data unavailable, continuing without it: {}", e);
            HourlySeries::default()
        });
        let forecast = forecast?;

        if location.elevation.is_none() {
            location.elevation = forecast.elevation.or(historical.elevation);
        }

        let current = current_conditions(&forecast.points, Utc::now());
        let horizon: Vec<DateTime<Utc>> = forecast.points.iter().map(|p| p.time).collect();

        let train_start = Instant::now();
        let ml_forecast = self.predict_targets(historical.points.clone(), horizon).await;
        info!(
            "Trained {} target models in {:.3}s",
            WeatherVariable::TARGETS.len(),
            train_start.elapsed().as_secs_f64()
        );

        let blended_forecast = blend(&forecast.points, &ml_forecast, self.config.blending.ml_weight)
            .inspect_err(|e| error!("Blending failed: {}", e))?;

        info!(
            "Built forecast bundle for {} ({} historical, {} forecast points) in {:.3}s",
            location.resolved_name,
            historical.points.len(),
            forecast.points.len(),
            start_time.elapsed().as_secs_f64()
        );

        Ok(ForecastBundle {
            location,
            current,
            historical: historical.points,
            api_forecast: forecast.points,
            ml_forecast,
            blended_forecast,
        })
    }

    /// Text is geocoded; coordinates are reverse geocoded for a label but
    /// stay authoritative when no provider knows the place
    async fn resolve_location(&self, query: &LocationQuery) -> Result<ResolvedLocation> {
        let resolver = self.resolver();
        match query {
            LocationQuery::Text(_) => resolver.resolve_query(query).await,
            LocationQuery::Coordinates {
                latitude,
                longitude,
            } => match resolver.reverse_resolve(*latitude, *longitude).await {
                Err(ForecastError::LocationNotFound { .. }) => {
                    debug!("No reverse geocoding result, labelling by coordinates");
                    Ok(ResolvedLocation::from_coordinates(*latitude, *longitude))
                }
                other => other,
            },
        }
    }

    /// One blocking training task per target, awaited together
    async fn predict_targets(
        &self,
        history: Vec<TimeSeriesPoint>,
        horizon: Vec<DateTime<Utc>>,
    ) -> Vec<TimeSeriesPoint> {
        let history = Arc::new(history);
        let horizon = Arc::new(horizon);
        let forecaster = EnsembleForecaster::new(self.config.model.clone());

        let tasks = WeatherVariable::TARGETS.map(|target| {
            let history = Arc::clone(&history);
            let horizon = Arc::clone(&horizon);
            let forecaster = forecaster.clone();
            tokio::task::spawn_blocking(move || {
                (target, forecaster.train_and_predict(&history, target, &horizon))
            })
        });

        let mut predictions = Vec::with_capacity(tasks.len());
        for outcome in futures::future::join_all(tasks).await {
            match outcome {
                Ok(prediction) => predictions.push(prediction),
                Err(e) => error!("Training task failed, target left absent: {}", e),
            }
        }

        merge_predictions(&horizon, &predictions)
    }

    /// Suggestions for a partial query; never fails
    #[instrument(skip(self))]
    pub async fn autocomplete(&self, partial: &str) -> Vec<Suggestion> {
        let geocoding = &self.config.geocoding;
        AutocompleteAggregator::new(
            suggestion_providers(geocoding, &self.geocoding_client),
            geocoding.autocomplete_limit,
            geocoding.autocomplete_timeout(),
        )
        .suggest(partial)
        .await
    }

    /// Reverse geocode only; not found is an error here
    pub async fn reverse_geocode(&self, latitude: f64, longitude: f64) -> Result<ResolvedLocation> {
        self.resolver().reverse_resolve(latitude, longitude).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn horizon(len: i64) -> Vec<DateTime<Utc>> {
        let start = Utc.with_ymd_and_hms(2024, 8, 1, 0, 0, 0).unwrap();
        (0..len).map(|h| start + Duration::hours(h)).collect()
    }

    fn prediction(
        target: WeatherVariable,
        times: &[DateTime<Utc>],
        value: f64,
    ) -> (WeatherVariable, Vec<TimeSeriesPoint>) {
        let points = times
            .iter()
            .map(|t| {
                let mut point = TimeSeriesPoint::empty(*t);
                point.set(target, Some(value));
                point
            })
            .collect();
        (target, points)
    }

    #[test]
    fn test_merge_fills_each_target() {
        let times = horizon(6);
        let merged = merge_predictions(
            &times,
            &[
                prediction(WeatherVariable::Temperature, &times, 21.0),
                prediction(WeatherVariable::WindSpeed, &times, 3.0),
            ],
        );

        assert_eq!(merged.len(), 6);
        assert!(merged.iter().all(|p| p.temperature_2m == Some(21.0)));
        assert!(merged.iter().all(|p| p.wind_speed_10m == Some(3.0)));
        assert!(merged.iter().all(|p| p.shortwave_radiation.is_none()));
    }

    #[test]
    fn test_merge_without_predictions_keeps_alignment() {
        let times = horizon(4);
        let merged = merge_predictions(&times, &[]);
        assert_eq!(merged.iter().map(|p| p.time).collect::<Vec<_>>(), times);
        assert!(merged.iter().all(|p| p.temperature_2m.is_none()));
    }

    #[test]
    fn test_service_builds_from_default_config() {
        let service = ForecastService::new(ServiceConfig::default()).unwrap();
        assert_eq!(service.config().pipeline.default_forecast_days, 7);
    }

    #[tokio::test]
    async fn test_invalid_request_rejected_before_any_provider_call() {
        let mut config = ServiceConfig::default();
        // unroutable: a provider call here would fail rather than hang
        config.geocoding.open_meteo_url = "http://127.0.0.1:9".to_string();
        let service = ForecastService::new(config).unwrap();

        let err = service.run(&DataRequest::default()).await.unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[tokio::test]
    async fn test_short_autocomplete_query_is_empty() {
        let service = ForecastService::new(ServiceConfig::default()).unwrap();
        assert!(service.autocomplete(" a ").await.is_empty());
    }
}
