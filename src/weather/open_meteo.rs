//! Open-Meteo forecast / archive wire types

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;

use crate::models::{TimeSeriesPoint, WeatherVariable};

/// Hourly response shared by the forecast and archive APIs
#[derive(Debug, Deserialize)]
pub struct HourlyResponse {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub elevation: Option<f64>,
    pub hourly: Option<HourlyData>,
    /// Set on validation failures together with `reason`
    #[serde(default)]
    pub error: bool,
    pub reason: Option<String>,
}

/// Column-oriented hourly block; absent columns deserialize to `None`
#[derive(Debug, Default, Deserialize)]
pub struct HourlyData {
    #[serde(default)]
    pub time: Vec<String>,
    #[serde(default)]
    pub temperature_2m: Option<Vec<Option<f64>>>,
    #[serde(default, alias = "relativehumidity_2m")]
    pub relative_humidity_2m: Option<Vec<Option<f64>>>,
    #[serde(default)]
    pub shortwave_radiation: Option<Vec<Option<f64>>>,
    #[serde(default, alias = "cloudcover")]
    pub cloud_cover: Option<Vec<Option<f64>>>,
    #[serde(default)]
    pub precipitation: Option<Vec<Option<f64>>>,
    #[serde(default)]
    pub pressure_msl: Option<Vec<Option<f64>>>,
    #[serde(default)]
    pub wind_speed_10m: Option<Vec<Option<f64>>>,
}

/// Open-Meteo sends "2024-06-01T13:00" when asked for `timezone=UTC`
pub fn parse_time(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .map(|naive| naive.and_utc())
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        })
}

impl HourlyData {
    fn column(&self, variable: WeatherVariable) -> Option<&Vec<Option<f64>>> {
        match variable {
            WeatherVariable::Temperature => self.temperature_2m.as_ref(),
            WeatherVariable::ShortwaveRadiation => self.shortwave_radiation.as_ref(),
            WeatherVariable::WindSpeed => self.wind_speed_10m.as_ref(),
            WeatherVariable::RelativeHumidity => self.relative_humidity_2m.as_ref(),
            WeatherVariable::CloudCover => self.cloud_cover.as_ref(),
            WeatherVariable::Precipitation => self.precipitation.as_ref(),
            WeatherVariable::PressureMsl => self.pressure_msl.as_ref(),
        }
    }

    /// Row-oriented points in payload order; rows with unparseable times are skipped
    #[must_use]
    pub fn to_points(&self) -> Vec<TimeSeriesPoint> {
        self.time
            .iter()
            .enumerate()
            .filter_map(|(index, raw)| {
                let mut point = TimeSeriesPoint::empty(parse_time(raw)?);
                for variable in WeatherVariable::ALL {
                    let value = self
                        .column(variable)
                        .and_then(|column| column.get(index).copied().flatten());
                    point.set(variable, value);
                }
                Some(point)
            })
            .collect()
    }
}
