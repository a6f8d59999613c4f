//! Request and response bundle for the forecasting pipeline

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{LocationQuery, ResolvedLocation, TimeSeriesPoint};
use crate::ForecastError;

/// Body of a data request; exactly one of `location` or the coordinate pair
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataRequest {
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub historical_days: Option<i64>,
    pub forecast_days: Option<i64>,
}

/// Validated request with day ranges filled in
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRequest {
    pub query: LocationQuery,
    pub historical_days: u32,
    pub forecast_days: u32,
}

/// Variable name to value, taken from the forecast point closest to now
pub type CurrentConditions = BTreeMap<String, f64>;

/// Everything a consumer needs to render one location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastBundle {
    pub location: ResolvedLocation,
    pub current: CurrentConditions,
    pub historical: Vec<TimeSeriesPoint>,
    pub api_forecast: Vec<TimeSeriesPoint>,
    pub ml_forecast: Vec<TimeSeriesPoint>,
    pub blended_forecast: Vec<TimeSeriesPoint>,
}

impl DataRequest {
    #[must_use]
    pub fn for_location(location: &str) -> Self {
        Self {
            location: Some(location.to_string()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn for_coordinates(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude: Some(latitude),
            longitude: Some(longitude),
            ..Self::default()
        }
    }

    /// Check the body and apply day defaults
    pub fn validate(
        &self,
        default_historical_days: u32,
        default_forecast_days: u32,
        max_historical_days: u32,
    ) -> Result<ForecastRequest, ForecastError> {
        let query = self.query()?;
        query.validate()?;

        let historical_days = positive_days(
            "historical_days",
            self.historical_days,
            default_historical_days,
        )?;
        if historical_days > max_historical_days {
            return Err(ForecastError::invalid_range(format!(
                "historical_days must not exceed {max_historical_days}"
            )));
        }
        let forecast_days =
            positive_days("forecast_days", self.forecast_days, default_forecast_days)?;

        Ok(ForecastRequest {
            query,
            historical_days,
            forecast_days,
        })
    }

    fn query(&self) -> Result<LocationQuery, ForecastError> {
        let text = self
            .location
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty());

        match (text, self.latitude, self.longitude) {
            (Some(text), None, None) => Ok(LocationQuery::Text(text.to_string())),
            (None, Some(latitude), Some(longitude)) => Ok(LocationQuery::Coordinates {
                latitude,
                longitude,
            }),
            (Some(_), _, _) => Err(ForecastError::invalid_query(
                "provide either a location or coordinates, not both",
            )),
            (None, Some(_), None) | (None, None, Some(_)) => Err(ForecastError::invalid_query(
                "latitude and longitude must be provided together",
            )),
            (None, None, None) => Err(ForecastError::invalid_query(
                "a location or a latitude/longitude pair is required",
            )),
        }
    }
}

fn positive_days(field: &str, value: Option<i64>, default: u32) -> Result<u32, ForecastError> {
    match value {
        None => Ok(default),
        Some(days) if days <= 0 => Err(ForecastError::invalid_range(format!(
            "{field} must be positive, got {days}"
        ))),
        Some(days) => u32::try_from(days)
            .map_err(|_| ForecastError::invalid_range(format!("{field} is too large"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn validate(request: &DataRequest) -> Result<ForecastRequest, ForecastError> {
        request.validate(60, 7, 365)
    }

    #[test]
    fn test_text_request_gets_default_days() {
        let request = validate(&DataRequest::for_location("  Pune ")).unwrap();
        assert_eq!(request.query, LocationQuery::Text("Pune".to_string()));
        assert_eq!(request.historical_days, 60);
        assert_eq!(request.forecast_days, 7);
    }

    #[test]
    fn test_coordinate_request() {
        let request = validate(&DataRequest::for_coordinates(18.52, 73.85)).unwrap();
        assert_eq!(
            request.query,
            LocationQuery::Coordinates {
                latitude: 18.52,
                longitude: 73.85
            }
        );
    }

    #[test]
    fn test_empty_request_is_invalid_query() {
        let err = validate(&DataRequest::default()).unwrap_err();
        assert!(matches!(err, ForecastError::InvalidQuery { .. }));
    }

    #[test]
    fn test_blank_location_counts_as_missing() {
        let err = validate(&DataRequest::for_location("   ")).unwrap_err();
        assert!(matches!(err, ForecastError::InvalidQuery { .. }));
    }

    #[rstest]
    #[case(Some("Pune"), Some(1.0), Some(2.0))]
    #[case(None, Some(1.0), None)]
    #[case(None, None, Some(2.0))]
    #[case(None, Some(95.0), Some(2.0))]
    fn test_ambiguous_or_bad_location_rejected(
        #[case] location: Option<&str>,
        #[case] latitude: Option<f64>,
        #[case] longitude: Option<f64>,
    ) {
        let request = DataRequest {
            location: location.map(String::from),
            latitude,
            longitude,
            ..DataRequest::default()
        };
        let err = validate(&request).unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[rstest]
    #[case(Some(0), None)]
    #[case(Some(-5), None)]
    #[case(None, Some(0))]
    #[case(Some(366), None)]
    fn test_bad_day_ranges(#[case] historical: Option<i64>, #[case] forecast: Option<i64>) {
        let request = DataRequest {
            historical_days: historical,
            forecast_days: forecast,
            ..DataRequest::for_location("Pune")
        };
        let err = validate(&request).unwrap_err();
        assert!(matches!(err, ForecastError::InvalidRange { .. }));
    }
}
