//! Ensemble Forecaster
//!
//! Trains a short-lived model per request and target variable, then steps
//! forward hour by hour, feeding each prediction back into the history.
//! Complexity adapts to how much history there is:
//!
//! - enough rows: random forest + gradient boosting, averaged
//! - a few rows: one small forest on a reduced lag window
//! - almost nothing: persistence of the last observed value

pub mod boosting;
pub mod forest;
pub mod tree;

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::ForecastError;
use crate::config::ModelConfig;
use crate::features::{FeatureConfig, FeatureRow, build_features, feature_vector};
use crate::models::{TimeSeriesPoint, WeatherVariable};

pub use boosting::{BoostingParams, GradientBoosting};
pub use forest::{ForestParams, RandomForest};
pub use tree::{RegressionTree, TreeParams, sqrt_features};

/// A fitted model mapping one feature vector to one value
pub trait Regressor: Send + Sync {
    fn predict(&self, features: &[f64]) -> f64;

    fn name(&self) -> &'static str;
}

/// Fitted learners plus the feature layout they were trained on
pub struct TrainedEnsemble {
    learners: Vec<Box<dyn Regressor>>,
    features: FeatureConfig,
}

impl TrainedEnsemble {
    /// Arithmetic mean of every learner
    #[must_use]
    pub fn predict(&self, features: &[f64]) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let n = self.learners.len().max(1) as f64;
        self.learners.iter().map(|l| l.predict(features)).sum::<f64>() / n
    }

    #[must_use]
    pub fn learner_names(&self) -> Vec<&'static str> {
        self.learners.iter().map(|l| l.name()).collect()
    }

    #[must_use]
    pub fn feature_config(&self) -> &FeatureConfig {
        &self.features
    }
}

pub enum TrainedModel {
    Ensemble(TrainedEnsemble),
    /// Degraded path: a single small forest
    SingleForest(TrainedEnsemble),
    Persistence(f64),
    /// No observation of the target at all
    Absent,
}

impl TrainedModel {
    /// One recursive step: `(accumulated history, time) -> value`
    #[must_use]
    pub fn step(&self, accumulated: &[Option<f64>], time: DateTime<Utc>) -> Option<f64> {
        match self {
            TrainedModel::Ensemble(model) | TrainedModel::SingleForest(model) => {
                let features = feature_vector(accumulated, time, &model.features);
                Some(model.predict(&features)).filter(|v| v.is_finite())
            }
            TrainedModel::Persistence(value) => Some(*value),
            TrainedModel::Absent => None,
        }
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            TrainedModel::Ensemble(_) => "ensemble",
            TrainedModel::SingleForest(_) => "single-forest",
            TrainedModel::Persistence(_) => "persistence",
            TrainedModel::Absent => "absent",
        }
    }
}

fn training_set(rows: &[FeatureRow]) -> (Vec<Vec<f64>>, Vec<f64>) {
    rows.iter()
        .filter_map(|row| row.target.map(|target| (row.features.clone(), target)))
        .unzip()
}

#[derive(Debug, Clone)]
pub struct EnsembleForecaster {
    config: ModelConfig,
}

impl EnsembleForecaster {
    #[must_use]
    pub fn new(config: ModelConfig) -> Self {
        Self { config }
    }

    fn tree_params(&self, max_depth: usize, n_features: usize) -> TreeParams {
        TreeParams {
            max_depth,
            min_samples_split: self.config.min_samples_split,
            min_samples_leaf: self.config.min_samples_leaf,
            max_features: Some(sqrt_features(n_features)),
        }
    }

    /// Pick the richest model the history supports; never fails
    #[must_use]
    pub fn train(&self, history: &[TimeSeriesPoint], target: WeatherVariable) -> TrainedModel {
        let full = FeatureConfig::from(&self.config);
        let (x, y) = training_set(&build_features(history, target, &full));

        if y.len() >= self.config.min_ensemble_rows {
            let n_features = full.feature_count();
            let forest = RandomForest::fit(
                &x,
                &y,
                &ForestParams {
                    n_trees: self.config.forest_trees,
                    tree: self.tree_params(self.config.forest_max_depth, n_features),
                    seed: self.config.seed,
                },
            );
            let boosting = GradientBoosting::fit(
                &x,
                &y,
                &BoostingParams {
                    n_stages: self.config.boosting_stages,
                    learning_rate: self.config.boosting_learning_rate,
                    tree: self.tree_params(self.config.boosting_max_depth, n_features),
                    seed: self.config.seed.wrapping_add(1),
                },
            );
            info!(
                "Trained ensemble for {} on {} rows ({} features)",
                target.field_name(),
                y.len(),
                n_features
            );
            return TrainedModel::Ensemble(TrainedEnsemble {
                learners: vec![Box::new(forest), Box::new(boosting)],
                features: full,
            });
        }

        warn!(
            "{}, falling back to a smaller model",
            ForecastError::InsufficientData {
                target: target.field_name().to_string(),
                rows: y.len(),
            }
        );

        let reduced = full.reduced((self.config.lags / 4).max(1));
        let (x, y) = training_set(&build_features(history, target, &reduced));
        if y.len() >= self.config.min_single_rows {
            let forest = RandomForest::fit(
                &x,
                &y,
                &ForestParams {
                    n_trees: (self.config.forest_trees / 4).max(10),
                    tree: self.tree_params(
                        (self.config.forest_max_depth / 2).max(3),
                        reduced.feature_count(),
                    ),
                    seed: self.config.seed,
                },
            );
            info!(
                "Trained single forest for {} on {} rows with {} lags",
                target.field_name(),
                y.len(),
                reduced.lags
            );
            return TrainedModel::SingleForest(TrainedEnsemble {
                learners: vec![Box::new(forest)],
                features: reduced,
            });
        }

        match history.iter().rev().find_map(|p| p.get(target)) {
            Some(last) => {
                warn!("Using persistence for {} ({} usable rows)", target.field_name(), y.len());
                TrainedModel::Persistence(last)
            }
            None => {
                warn!("No observations of {}, ML values will be absent", target.field_name());
                TrainedModel::Absent
            }
        }
    }

    /// Recursive hourly prediction aligned to `horizon`
    ///
    /// Stepping starts right after the last historical timestamp; steps that
    /// fall before the first horizon timestamp are predicted and discarded.
    #[must_use]
    pub fn predict_horizon(
        &self,
        model: &TrainedModel,
        history: &[TimeSeriesPoint],
        target: WeatherVariable,
        horizon: &[DateTime<Utc>],
    ) -> Vec<Option<f64>> {
        let (Some(last_time), Some(last_needed)) =
            (history.last().map(|p| p.time), horizon.iter().max().copied())
        else {
            return vec![None; horizon.len()];
        };

        let mut accumulated: Vec<Option<f64>> = history.iter().map(|p| p.get(target)).collect();
        let mut predicted: HashMap<DateTime<Utc>, f64> = HashMap::with_capacity(horizon.len());

        let mut time = last_time + Duration::hours(1);
        let mut steps = 0;
        while time <= last_needed && steps < self.config.max_recursive_steps {
            let value = model.step(&accumulated, time);
            if let Some(value) = value {
                predicted.insert(time, value);
            }
            accumulated.push(value);
            time += Duration::hours(1);
            steps += 1;
        }

        if time <= last_needed {
            debug!(
                "Recursive forecast for {} stopped after {} steps",
                target.field_name(),
                steps
            );
        }

        horizon.iter().map(|t| predicted.get(t).copied()).collect()
    }

    /// Train on `history` and return one point per horizon timestamp,
    /// with only `target` populated
    #[must_use]
    pub fn train_and_predict(
        &self,
        history: &[TimeSeriesPoint],
        target: WeatherVariable,
        horizon: &[DateTime<Utc>],
    ) -> Vec<TimeSeriesPoint> {
        let model = self.train(history, target);
        debug!("Model for {}: {}", target.field_name(), model.kind());

        self.predict_horizon(&model, history, target, horizon)
            .into_iter()
            .zip(horizon)
            .map(|(value, time)| {
                let mut point = TimeSeriesPoint::empty(*time);
                point.set(target, value);
                point
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
    }

    fn history(hours: usize, value: impl Fn(usize) -> Option<f64>) -> Vec<TimeSeriesPoint> {
        (0..hours)
            .map(|i| {
                let mut point = TimeSeriesPoint::empty(start() + Duration::hours(i as i64));
                point.set(WeatherVariable::Temperature, value(i));
                point
            })
            .collect()
    }

    fn daily_cycle(i: usize) -> Option<f64> {
        let hour = (i % 24) as f64;
        Some(20.0 + 8.0 * (std::f64::consts::TAU * hour / 24.0).sin())
    }

    fn horizon_after(history: &[TimeSeriesPoint], gap_hours: i64, len: usize) -> Vec<DateTime<Utc>> {
        let first = history.last().unwrap().time + Duration::hours(gap_hours + 1);
        (0..len).map(|i| first + Duration::hours(i as i64)).collect()
    }

    fn fast_config() -> ModelConfig {
        ModelConfig {
            forest_trees: 12,
            forest_max_depth: 8,
            boosting_stages: 15,
            boosting_max_depth: 4,
            ..ModelConfig::default()
        }
    }

    #[test]
    fn test_full_ensemble_with_enough_history() {
        let data = history(24 * 6, daily_cycle);
        let forecaster = EnsembleForecaster::new(fast_config());

        let model = forecaster.train(&data, WeatherVariable::Temperature);
        let TrainedModel::Ensemble(ensemble) = &model else {
            panic!("expected full ensemble, got {}", model.kind());
        };
        assert_eq!(ensemble.learner_names(), vec!["random-forest", "gradient-boosting"]);
    }

    #[test]
    fn test_ensemble_tracks_daily_cycle_across_archive_gap() {
        let data = history(24 * 8, daily_cycle);
        let horizon = horizon_after(&data, 72, 24);
        let forecaster = EnsembleForecaster::new(fast_config());

        let points = forecaster.train_and_predict(&data, WeatherVariable::Temperature, &horizon);
        assert_eq!(points.len(), 24);
        assert!(points.iter().zip(&horizon).all(|(p, t)| p.time == *t));
        assert!(points.iter().all(|p| p.temperature_2m.is_some()));
        // other variables are left to the API forecast
        assert!(points.iter().all(|p| p.wind_speed_10m.is_none()));

        let values: Vec<f64> = points.iter().filter_map(|p| p.temperature_2m).collect();
        let spread = values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
            - values.iter().copied().fold(f64::INFINITY, f64::min);
        assert!(spread > 4.0, "forecast lost the daily cycle, spread {spread}");
    }

    #[test]
    fn test_short_history_uses_single_forest_and_keeps_horizon_length() {
        let data = history(40, daily_cycle);
        let horizon = horizon_after(&data, 0, 30);
        let forecaster = EnsembleForecaster::new(fast_config());

        let model = forecaster.train(&data, WeatherVariable::Temperature);
        assert_eq!(model.kind(), "single-forest");

        let points = forecaster.train_and_predict(&data, WeatherVariable::Temperature, &horizon);
        assert_eq!(points.len(), 30);
    }

    #[test]
    fn test_tiny_history_falls_back_to_persistence() {
        let data = history(5, |i| Some(i as f64));
        let horizon = horizon_after(&data, 0, 6);
        let forecaster = EnsembleForecaster::new(fast_config());

        let points = forecaster.train_and_predict(&data, WeatherVariable::Temperature, &horizon);
        assert_eq!(points.len(), 6);
        assert!(points.iter().all(|p| p.temperature_2m == Some(4.0)));
    }

    #[test]
    fn test_no_observations_yield_absent_values() {
        let data = history(100, |_| None);
        let horizon = horizon_after(&data, 0, 4);
        let forecaster = EnsembleForecaster::new(fast_config());

        let points = forecaster.train_and_predict(&data, WeatherVariable::Temperature, &horizon);
        assert_eq!(points.len(), 4);
        assert!(points.iter().all(|p| p.temperature_2m.is_none()));
    }

    #[test]
    fn test_empty_history_keeps_horizon_length() {
        let horizon: Vec<DateTime<Utc>> = (0..5).map(|i| start() + Duration::hours(i)).collect();
        let forecaster = EnsembleForecaster::new(fast_config());

        let points = forecaster.train_and_predict(&[], WeatherVariable::Temperature, &horizon);
        assert_eq!(points.len(), 5);
        assert!(points.iter().all(|p| p.temperature_2m.is_none()));
    }

    #[test]
    fn test_horizon_replays_step_over_own_predictions() {
        let data = history(24 * 6, daily_cycle);
        let horizon = horizon_after(&data, 0, 12);
        let forecaster = EnsembleForecaster::new(fast_config());

        let model = forecaster.train(&data, WeatherVariable::Temperature);
        let TrainedModel::Ensemble(ensemble) = &model else {
            panic!("expected full ensemble, got {}", model.kind());
        };
        let predictions =
            forecaster.predict_horizon(&model, &data, WeatherVariable::Temperature, &horizon);
        assert!(predictions.iter().all(Option::is_some));

        let mut accumulated: Vec<Option<f64>> = data.iter().map(|p| p.temperature_2m).collect();
        for (k, time) in horizon.iter().enumerate() {
            assert_eq!(model.step(&accumulated, *time), predictions[k], "step {k}");
            accumulated.push(predictions[k]);
        }

        // the next step reads the previous prediction as its first lag
        let config = ensemble.feature_config();
        let mut prefix: Vec<Option<f64>> = data.iter().map(|p| p.temperature_2m).collect();
        prefix.push(predictions[0]);
        let unchanged = feature_vector(&prefix, horizon[1], config);
        let perturbed_value = predictions[0].unwrap() + 50.0;
        *prefix.last_mut().unwrap() = Some(perturbed_value);
        let perturbed = feature_vector(&prefix, horizon[1], config);

        assert_eq!(unchanged[0], predictions[0].unwrap());
        assert_eq!(perturbed[0], perturbed_value);
        assert_ne!(unchanged, perturbed);
    }

    #[test]
    fn test_steps_beyond_bound_are_absent() {
        let data = history(24 * 3, daily_cycle);
        let horizon = horizon_after(&data, 0, 10);
        let forecaster = EnsembleForecaster::new(ModelConfig {
            max_recursive_steps: 4,
            ..fast_config()
        });

        let points = forecaster.train_and_predict(&data, WeatherVariable::Temperature, &horizon);
        assert_eq!(points.len(), 10);
        assert!(points[..4].iter().all(|p| p.temperature_2m.is_some()));
        assert!(points[4..].iter().all(|p| p.temperature_2m.is_none()));
    }
}
