//! Hourly weather time series model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Hourly variables carried through the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WeatherVariable {
    Temperature,
    ShortwaveRadiation,
    WindSpeed,
    RelativeHumidity,
    CloudCover,
    Precipitation,
    PressureMsl,
}

impl WeatherVariable {
    pub const ALL: [WeatherVariable; 7] = [
        WeatherVariable::Temperature,
        WeatherVariable::ShortwaveRadiation,
        WeatherVariable::WindSpeed,
        WeatherVariable::RelativeHumidity,
        WeatherVariable::CloudCover,
        WeatherVariable::Precipitation,
        WeatherVariable::PressureMsl,
    ];

    /// Variables that get their own ML model
    pub const TARGETS: [WeatherVariable; 3] = [
        WeatherVariable::Temperature,
        WeatherVariable::ShortwaveRadiation,
        WeatherVariable::WindSpeed,
    ];

    /// Name used in the response bundle
    #[must_use]
    pub fn field_name(self) -> &'static str {
        match self {
            WeatherVariable::Temperature => "temperature_2m",
            WeatherVariable::ShortwaveRadiation => "shortwave_radiation",
            WeatherVariable::WindSpeed => "wind_speed_10m",
            WeatherVariable::RelativeHumidity => "relativehumidity_2m",
            WeatherVariable::CloudCover => "cloudcover",
            WeatherVariable::Precipitation => "precipitation",
            WeatherVariable::PressureMsl => "pressure_msl",
        }
    }

    /// Name the Open-Meteo `hourly=` parameter expects
    #[must_use]
    pub fn api_name(self) -> &'static str {
        match self {
            WeatherVariable::RelativeHumidity => "relative_humidity_2m",
            WeatherVariable::CloudCover => "cloud_cover",
            other => other.field_name(),
        }
    }
}

/// One hourly sample; every variable may be absent
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TimeSeriesPoint {
    pub time: DateTime<Utc>,
    pub temperature_2m: Option<f64>,
    pub shortwave_radiation: Option<f64>,
    pub wind_speed_10m: Option<f64>,
    pub relativehumidity_2m: Option<f64>,
    pub cloudcover: Option<f64>,
    pub precipitation: Option<f64>,
    pub pressure_msl: Option<f64>,
}

impl TimeSeriesPoint {
    /// Point with every variable absent
    #[must_use]
    pub fn empty(time: DateTime<Utc>) -> Self {
        Self {
            time,
            temperature_2m: None,
            shortwave_radiation: None,
            wind_speed_10m: None,
            relativehumidity_2m: None,
            cloudcover: None,
            precipitation: None,
            pressure_msl: None,
        }
    }

    #[must_use]
    pub fn get(&self, variable: WeatherVariable) -> Option<f64> {
        match variable {
            WeatherVariable::Temperature => self.temperature_2m,
            WeatherVariable::ShortwaveRadiation => self.shortwave_radiation,
            WeatherVariable::WindSpeed => self.wind_speed_10m,
            WeatherVariable::RelativeHumidity => self.relativehumidity_2m,
            WeatherVariable::CloudCover => self.cloudcover,
            WeatherVariable::Precipitation => self.precipitation,
            WeatherVariable::PressureMsl => self.pressure_msl,
        }
    }

    pub fn set(&mut self, variable: WeatherVariable, value: Option<f64>) {
        // NaN from an upstream payload counts as absent
        let value = value.filter(|v| v.is_finite());
        match variable {
            WeatherVariable::Temperature => self.temperature_2m = value,
            WeatherVariable::ShortwaveRadiation => self.shortwave_radiation = value,
            WeatherVariable::WindSpeed => self.wind_speed_10m = value,
            WeatherVariable::RelativeHumidity => self.relativehumidity_2m = value,
            WeatherVariable::CloudCover => self.cloudcover = value,
            WeatherVariable::Precipitation => self.precipitation = value,
            WeatherVariable::PressureMsl => self.pressure_msl = value,
        }
    }
}

/// Hourly series plus the elevation the provider echoed back
#[derive(Debug, Clone, Default)]
pub struct HourlySeries {
    pub points: Vec<TimeSeriesPoint>,
    pub elevation: Option<f64>,
}
