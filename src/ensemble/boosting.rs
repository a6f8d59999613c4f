//! Gradient-boosted regression trees (squared loss)

use rand::SeedableRng;
use rand::rngs::StdRng;

use super::Regressor;
use super::tree::{RegressionTree, TreeParams};

#[derive(Debug, Clone)]
pub struct BoostingParams {
    pub n_stages: usize,
    pub learning_rate: f64,
    pub tree: TreeParams,
    pub seed: u64,
}

#[derive(Debug, Clone)]
pub struct GradientBoosting {
    base: f64,
    learning_rate: f64,
    stages: Vec<RegressionTree>,
}

impl GradientBoosting {
    /// Each stage fits the residuals of the running prediction
    #[must_use]
    pub fn fit(x: &[Vec<f64>], y: &[f64], params: &BoostingParams) -> Self {
        let n = y.len();
        let indices: Vec<usize> = (0..n).collect();
        let mut rng = StdRng::seed_from_u64(params.seed);

        #[allow(clippy::cast_precision_loss)]
        let base = if n == 0 { 0.0 } else { y.iter().sum::<f64>() / n as f64 };
        let mut current = vec![base; n];
        let mut stages = Vec::with_capacity(params.n_stages);

        for _ in 0..params.n_stages {
            let residuals: Vec<f64> = y.iter().zip(&current).map(|(t, p)| t - p).collect();
            if residuals.iter().all(|r| r.abs() < 1e-12) {
                break;
            }

            let tree = RegressionTree::fit(x, &residuals, &indices, &params.tree, &mut rng);
            for (prediction, row) in current.iter_mut().zip(x) {
                *prediction += params.learning_rate * tree.predict(row);
            }
            stages.push(tree);
        }

        Self {
            base,
            learning_rate: params.learning_rate,
            stages,
        }
    }

    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }
}

impl Regressor for GradientBoosting {
    fn predict(&self, features: &[f64]) -> f64 {
        self.base
            + self
                .stages
                .iter()
                .map(|t| self.learning_rate * t.predict(features))
                .sum::<f64>()
    }

    fn name(&self) -> &'static str {
        "gradient-boosting"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> BoostingParams {
        BoostingParams {
            n_stages: 40,
            learning_rate: 0.2,
            tree: TreeParams {
                max_depth: 3,
                min_samples_split: 2,
                min_samples_leaf: 1,
                max_features: None,
            },
            seed: 42,
        }
    }

    #[test]
    fn test_boosting_reduces_training_error() {
        let x: Vec<Vec<f64>> = (0..50).map(|i| vec![f64::from(i)]).collect();
        let y: Vec<f64> = (0..50).map(|i| (f64::from(i) / 5.0).sin() * 10.0).collect();

        let model = GradientBoosting::fit(&x, &y, &params());
        let mse: f64 = x
            .iter()
            .zip(&y)
            .map(|(row, target)| (model.predict(row) - target).powi(2))
            .sum::<f64>()
            / 50.0;
        let variance: f64 = y.iter().map(|v| v.powi(2)).sum::<f64>() / 50.0;

        assert!(mse < variance * 0.1, "mse {mse} vs variance {variance}");
    }

    #[test]
    fn test_constant_target_stops_early() {
        let x: Vec<Vec<f64>> = (0..10).map(|i| vec![f64::from(i)]).collect();
        let y = vec![4.0; 10];

        let model = GradientBoosting::fit(&x, &y, &params());
        assert_eq!(model.stage_count(), 0);
        assert_eq!(model.predict(&[3.0]), 4.0);
    }
}
