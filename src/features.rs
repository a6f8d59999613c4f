//! Feature Engine
//!
//! Builds supervised rows from an hourly series for one target variable.
//! The same [`feature_vector`] routine serves training rows and recursive
//! prediction steps, so both always share one column layout:
//!
//! | block | columns |
//! |---|---|
//! | lags | `v[t-1] ..= v[t-lags]` |
//! | absence | count of absent values in the lag window |
//! | rolling | mean, std, min, max per window, ending at `t-1` |
//! | calendar | hour, day-of-week, month as sin/cos pairs |
//! | trend | last `trend_k` first differences, daily delta when `lags >= 24` |

use std::f64::consts::TAU;

use chrono::{DateTime, Datelike, Timelike, Utc};

use crate::config::ModelConfig;
use crate::models::{TimeSeriesPoint, WeatherVariable};

/// Stands in for an absent value; never imputed to zero
pub const ABSENT: f64 = -9999.0;

const HOURS_PER_DAY: usize = 24;

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureConfig {
    pub lags: usize,
    pub rolling_windows: Vec<usize>,
    pub trend_k: usize,
}

/// One supervised row; rows with an absent target are never trained on
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub time: DateTime<Utc>,
    pub features: Vec<f64>,
    pub target: Option<f64>,
}

impl From<&ModelConfig> for FeatureConfig {
    fn from(config: &ModelConfig) -> Self {
        Self {
            lags: config.lags,
            rolling_windows: config.rolling_windows.clone(),
            trend_k: config.trend_k,
        }
    }
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self::from(&ModelConfig::default())
    }
}

impl FeatureConfig {
    /// Same layout rules over a shorter lag window
    #[must_use]
    pub fn reduced(&self, lags: usize) -> Self {
        let lags = lags.clamp(1, self.lags.max(1));
        Self {
            lags,
            rolling_windows: self
                .rolling_windows
                .iter()
                .copied()
                .filter(|w| *w <= lags)
                .collect(),
            trend_k: self.trend_k.min(lags.saturating_sub(1)),
        }
    }

    fn has_daily_delta(&self) -> bool {
        self.lags >= HOURS_PER_DAY
    }

    #[must_use]
    pub fn feature_count(&self) -> usize {
        self.lags
            + 1
            + 4 * self.rolling_windows.len()
            + 6
            + self.trend_k
            + usize::from(self.has_daily_delta())
    }
}

fn or_absent(value: Option<f64>) -> f64 {
    value.unwrap_or(ABSENT)
}

fn difference(later: Option<f64>, earlier: Option<f64>) -> f64 {
    match (later, earlier) {
        (Some(a), Some(b)) => a - b,
        _ => ABSENT,
    }
}

fn cyclical(value: f64, period: f64) -> [f64; 2] {
    let angle = TAU * value / period;
    [angle.sin(), angle.cos()]
}

/// Mean, population std, min and max of the present values
fn window_stats(window: &[Option<f64>]) -> [f64; 4] {
    let present: Vec<f64> = window.iter().flatten().copied().collect();
    if present.is_empty() {
        return [ABSENT; 4];
    }

    #[allow(clippy::cast_precision_loss)]
    let n = present.len() as f64;
    let mean = present.iter().sum::<f64>() / n;
    let variance = present.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let min = present.iter().copied().fold(f64::INFINITY, f64::min);
    let max = present.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    [mean, variance.sqrt(), min, max]
}

/// Features for the step at `time`, given every value strictly before it.
///
/// `history` must hold at least `config.lags` values; its last element is `v[t-1]`.
#[must_use]
pub fn feature_vector(history: &[Option<f64>], time: DateTime<Utc>, config: &FeatureConfig) -> Vec<f64> {
    debug_assert!(history.len() >= config.lags);
    let n = history.len();
    let back = |k: usize| -> Option<f64> { history.get(n.wrapping_sub(k)).copied().flatten() };

    let mut features = Vec::with_capacity(config.feature_count());

    let lag_window = &history[n - config.lags..];
    features.extend((1..=config.lags).map(|k| or_absent(back(k))));
    #[allow(clippy::cast_precision_loss)]
    features.push(lag_window.iter().filter(|v| v.is_none()).count() as f64);

    for window in &config.rolling_windows {
        features.extend(window_stats(&history[n - window..]));
    }

    features.extend(cyclical(f64::from(time.hour()), 24.0));
    features.extend(cyclical(f64::from(time.weekday().num_days_from_monday()), 7.0));
    features.extend(cyclical(f64::from(time.month0()), 12.0));

    features.extend((1..=config.trend_k).map(|k| difference(back(k), back(k + 1))));
    if config.has_daily_delta() {
        features.push(difference(back(1), back(HOURS_PER_DAY)));
    }

    features
}

/// Rows for every index with a full lag window behind it
#[must_use]
pub fn build_features(
    series: &[TimeSeriesPoint],
    target: WeatherVariable,
    config: &FeatureConfig,
) -> Vec<FeatureRow> {
    let values: Vec<Option<f64>> = series.iter().map(|p| p.get(target)).collect();

    (config.lags..series.len())
        .map(|t| FeatureRow {
            time: series[t].time,
            features: feature_vector(&values[..t], series[t].time, config),
            target: values[t],
        })
        .collect()
}
