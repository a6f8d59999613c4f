//! Blender: fixed-weight consensus of the ML and API forecasts

use crate::ForecastError;
use crate::models::{TimeSeriesPoint, WeatherVariable};

/// Share of the ML prediction in the blend; the API forecast gets the rest
pub const DEFAULT_ML_WEIGHT: f64 = 0.6;

/// Combine two index-aligned series variable by variable.
///
/// Both present gives the weighted sum, one present passes through, neither
/// stays absent. Misaligned inputs are a pipeline bug and fail the request.
pub fn blend(
    api: &[TimeSeriesPoint],
    ml: &[TimeSeriesPoint],
    ml_weight: f64,
) -> crate::Result<Vec<TimeSeriesPoint>> {
    if api.len() != ml.len() {
        return Err(ForecastError::alignment(format!(
            "api forecast has {} points, ml forecast has {}",
            api.len(),
            ml.len()
        )));
    }

    let api_weight = 1.0 - ml_weight;
    api.iter()
        .zip(ml)
        .enumerate()
        .map(|(index, (api_point, ml_point))| {
            if api_point.time != ml_point.time {
                return Err(ForecastError::alignment(format!(
                    "timestamp mismatch at index {index}: {} vs {}",
                    api_point.time, ml_point.time
                )));
            }

            let mut point = TimeSeriesPoint::empty(api_point.time);
            for variable in WeatherVariable::ALL {
                let value = match (ml_point.get(variable), api_point.get(variable)) {
                    (Some(m), Some(a)) => Some(ml_weight * m + api_weight * a),
                    (Some(v), None) | (None, Some(v)) => Some(v),
                    (None, None) => None,
                };
                point.set(variable, value);
            }
            Ok(point)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn at(hour: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap() + Duration::hours(hour)
    }

    fn point(hour: i64, temperature: Option<f64>, wind: Option<f64>) -> TimeSeriesPoint {
        let mut point = TimeSeriesPoint::empty(at(hour));
        point.set(WeatherVariable::Temperature, temperature);
        point.set(WeatherVariable::WindSpeed, wind);
        point
    }

    #[test]
    fn test_weighted_sum_when_both_present() {
        let api = vec![point(0, Some(10.0), Some(4.0))];
        let ml = vec![point(0, Some(20.0), Some(2.0))];

        let blended = blend(&api, &ml, DEFAULT_ML_WEIGHT).unwrap();
        assert!((blended[0].temperature_2m.unwrap() - 16.0).abs() < 1e-9);
        assert!((blended[0].wind_speed_10m.unwrap() - 2.8).abs() < 1e-9);
    }

    #[test]
    fn test_single_side_passes_through() {
        let api = vec![point(0, None, Some(4.0)), point(1, None, None)];
        let ml = vec![point(0, Some(20.0), None), point(1, None, None)];

        let blended = blend(&api, &ml, 0.6).unwrap();
        assert_eq!(blended[0].temperature_2m, Some(20.0));
        assert_eq!(blended[0].wind_speed_10m, Some(4.0));
        assert_eq!(blended[1].temperature_2m, None);
    }

    #[test]
    fn test_output_aligned_with_inputs() {
        let api: Vec<_> = (0..48).map(|h| point(h, Some(1.0), None)).collect();
        let ml: Vec<_> = (0..48).map(|h| point(h, Some(3.0), None)).collect();

        let blended = blend(&api, &ml, 0.5).unwrap();
        assert_eq!(blended.len(), 48);
        assert!(blended.iter().zip(&api).all(|(b, a)| b.time == a.time));
        assert!(blended.iter().all(|p| p.temperature_2m == Some(2.0)));
    }

    #[test]
    fn test_length_mismatch_is_alignment_error() {
        let api = vec![point(0, Some(1.0), None), point(1, Some(1.0), None)];
        let ml = vec![point(0, Some(1.0), None)];

        let err = blend(&api, &ml, 0.6).unwrap_err();
        assert!(matches!(err, ForecastError::AlignmentError { .. }));
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn test_timestamp_mismatch_is_alignment_error() {
        let api = vec![point(0, Some(1.0), None)];
        let ml = vec![point(1, Some(1.0), None)];

        let err = blend(&api, &ml, 0.6).unwrap_err();
        assert!(matches!(err, ForecastError::AlignmentError { .. }));
    }
}
