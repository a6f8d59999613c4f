//! Weather Fetcher
//!
//! Retrieves hourly historical (archive) and forecast series from Open-Meteo.
//! There is no provider fallback here; transient transport failures are
//! retried by the middleware stack before a call is declared failed.

use std::time::Instant;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use reqwest_middleware::ClientWithMiddleware;
use tracing::{debug, error, info, instrument, warn};

use crate::config::WeatherConfig;
use crate::error::Stage;
use crate::models::{CurrentConditions, HourlySeries, ResolvedLocation, TimeSeriesPoint, WeatherVariable};
use crate::{ForecastError, Result};

pub mod open_meteo;

use open_meteo::HourlyResponse;

/// `(start, end)` dates for an archive request ending `delay_days` before `today`
#[must_use]
pub fn historical_window(days: u32, delay_days: u32, today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let end = today - Duration::days(i64::from(delay_days));
    let start = end - Duration::days(i64::from(days));
    (start, end)
}

/// Sort, drop duplicate timestamps and fill missing hours with all-absent points
#[must_use]
pub fn normalize_hourly(mut points: Vec<TimeSeriesPoint>) -> Vec<TimeSeriesPoint> {
    points.sort_by_key(|p| p.time);
    points.dedup_by_key(|p| p.time);

    let mut normalized: Vec<TimeSeriesPoint> = Vec::with_capacity(points.len());
    for point in points {
        if let Some(last) = normalized.last() {
            let mut expected = last.time + Duration::hours(1);
            while expected < point.time {
                normalized.push(TimeSeriesPoint::empty(expected));
                expected += Duration::hours(1);
            }
        }
        normalized.push(point);
    }
    normalized
}

/// Values of the forecast point closest to `now`, absent variables omitted
#[must_use]
pub fn current_conditions(series: &[TimeSeriesPoint], now: DateTime<Utc>) -> CurrentConditions {
    let Some(closest) = series
        .iter()
        .min_by_key(|p| (p.time - now).num_seconds().abs())
    else {
        return CurrentConditions::new();
    };

    WeatherVariable::ALL
        .iter()
        .filter_map(|variable| {
            closest
                .get(*variable)
                .map(|value| (variable.field_name().to_string(), value))
        })
        .collect()
}

fn hourly_parameter() -> String {
    WeatherVariable::ALL
        .iter()
        .map(|v| v.api_name())
        .collect::<Vec<_>>()
        .join(",")
}

/// Failure text without the request URL
fn transport_reason(error: reqwest_middleware::Error) -> String {
    match error {
        reqwest_middleware::Error::Reqwest(e) => e.without_url().to_string(),
        other => other.to_string(),
    }
}

fn validate_days(days: i64) -> Result<u32> {
    if days <= 0 {
        return Err(ForecastError::invalid_range(format!(
            "day count must be positive, got {days}"
        )));
    }
    u32::try_from(days).map_err(|_| ForecastError::invalid_range("day count is too large"))
}

/// Client for the Open-Meteo forecast and archive APIs
pub struct WeatherFetcher {
    client: ClientWithMiddleware,
    config: WeatherConfig,
}

impl WeatherFetcher {
    #[must_use]
    pub fn new(client: ClientWithMiddleware, config: WeatherConfig) -> Self {
        Self { client, config }
    }

    /// Hourly archive data for `days` days ending `archive_delay_days` before today
    #[instrument(skip(self, location), fields(lat = location.latitude, lon = location.longitude))]
    pub async fn fetch_historical(&self, location: &ResolvedLocation, days: i64) -> Result<HourlySeries> {
        let days = validate_days(days)?;
        let today = Utc::now().date_naive();
        let (start, end) = historical_window(days, self.config.archive_delay_days, today);

        let url = format!(
            "{}/archive?latitude={}&longitude={}&start_date={}&end_date={}&hourly={}&timezone=UTC",
            self.config.archive_base_url.trim_end_matches('/'),
            location.latitude,
            location.longitude,
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d"),
            hourly_parameter()
        );

        info!("Fetching historical data from {} to {}", start, end);
        self.fetch_series(&url, Stage::Historical).await
    }

    /// Hourly forecast for `days` days, capped at the provider maximum
    #[instrument(skip(self, location), fields(lat = location.latitude, lon = location.longitude))]
    pub async fn fetch_forecast(&self, location: &ResolvedLocation, days: i64) -> Result<HourlySeries> {
        let days = validate_days(days)?;
        let capped = days.min(self.config.max_forecast_days);
        if capped < days {
            debug!("Capping forecast days from {} to {}", days, capped);
        }

        let url = format!(
            "{}/forecast?latitude={}&longitude={}&hourly={}&forecast_days={}&timezone=UTC",
            self.config.forecast_base_url.trim_end_matches('/'),
            location.latitude,
            location.longitude,
            hourly_parameter(),
            capped
        );

        info!("Fetching {}-day forecast", capped);
        self.fetch_series(&url, Stage::Forecast).await
    }

    async fn fetch_series(&self, url: &str, stage: Stage) -> Result<HourlySeries> {
        let start_time = Instant::now();
        debug!("Open-Meteo request URL: {}", url);

        let response = self.client.get(url).send().await.map_err(|e| {
            let reason = transport_reason(e);
            error!("{} request failed: {}", stage, reason);
            ForecastError::upstream(stage, reason)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let reason = serde_json::from_str::<HourlyResponse>(&body)
                .ok()
                .and_then(|r| r.reason)
                .unwrap_or_else(|| format!("HTTP {status}"));
            error!("{} API returned {}: {}", stage, status, reason);
            return Err(ForecastError::upstream(stage, reason));
        }

        let parse_start = Instant::now();
        let payload: HourlyResponse = response.json().await.map_err(|e| {
            let e = e.without_url();
            error!("Failed to parse {} response: {}", stage, e);
            ForecastError::upstream(stage, format!("invalid response body: {e}"))
        })?;

        if payload.error {
            let reason = payload.reason.unwrap_or_else(|| "unknown error".to_string());
            return Err(ForecastError::upstream(stage, reason));
        }

        let hourly = payload
            .hourly
            .filter(|h| !h.time.is_empty())
            .ok_or_else(|| ForecastError::upstream(stage, "response carried no hourly data"))?;

        let points = normalize_hourly(hourly.to_points());
        let total_duration = start_time.elapsed();

        info!(
            "Successfully retrieved {} with {} data points in {:.3}s (parse: {:.3}s)",
            stage,
            points.len(),
            total_duration.as_secs_f64(),
            parse_start.elapsed().as_secs_f64()
        );

        if total_duration.as_secs() > 5 {
            warn!("Slow {} API response: {:.3}s", stage, total_duration.as_secs_f64());
        }

        Ok(HourlySeries {
            points,
            elevation: payload.elevation,
        })
    }
}
