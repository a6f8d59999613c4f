//! Bagged regression-tree forest

use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};

use super::Regressor;
use super::tree::{RegressionTree, TreeParams};

#[derive(Debug, Clone)]
pub struct ForestParams {
    pub n_trees: usize,
    pub tree: TreeParams,
    pub seed: u64,
}

#[derive(Debug, Clone)]
pub struct RandomForest {
    trees: Vec<RegressionTree>,
}

impl RandomForest {
    /// Every tree sees a bootstrap sample of the rows and random feature subsets per split
    #[must_use]
    pub fn fit(x: &[Vec<f64>], y: &[f64], params: &ForestParams) -> Self {
        let n = y.len();
        let mut rng = StdRng::seed_from_u64(params.seed);

        let trees = (0..params.n_trees)
            .map(|_| {
                let sample: Vec<usize> = (0..n).map(|_| rng.random_range(0..n)).collect();
                RegressionTree::fit(x, y, &sample, &params.tree, &mut rng)
            })
            .collect();

        Self { trees }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.trees.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }
}

impl Regressor for RandomForest {
    fn predict(&self, features: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let n = self.trees.len() as f64;
        self.trees.iter().map(|t| t.predict(features)).sum::<f64>() / n
    }

    fn name(&self) -> &'static str {
        "random-forest"
    }
}
