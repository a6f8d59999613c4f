//! CART regression tree (variance reduction splits)

use rand::RngExt;
use rand::rngs::StdRng;

use super::Regressor;

#[derive(Debug, Clone)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features considered per split; `None` means all of them
    pub max_features: Option<usize>,
}

#[derive(Debug, Clone)]
enum Node {
    Leaf(f64),
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Nodes live in one arena; index 0 is the root
#[derive(Debug, Clone)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    score: f64,
}

/// `sqrt(n)` rounded down, at least one
#[must_use]
pub fn sqrt_features(n_features: usize) -> usize {
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let k = (n_features as f64).sqrt().floor() as usize;
    k.max(1)
}

fn mean(y: &[f64], indices: &[usize]) -> f64 {
    if indices.is_empty() {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let n = indices.len() as f64;
    indices.iter().map(|&i| y[i]).sum::<f64>() / n
}

/// Pick `k` distinct feature indices (partial Fisher-Yates)
fn candidate_features(n_features: usize, k: usize, rng: &mut StdRng) -> Vec<usize> {
    let mut all: Vec<usize> = (0..n_features).collect();
    let k = k.min(n_features);
    for i in 0..k {
        let j = rng.random_range(i..n_features);
        all.swap(i, j);
    }
    all.truncate(k);
    all
}

impl RegressionTree {
    /// Fit on the rows named by `indices` (bootstrap samples may repeat rows)
    pub fn fit(
        x: &[Vec<f64>],
        y: &[f64],
        indices: &[usize],
        params: &TreeParams,
        rng: &mut StdRng,
    ) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        let mut indices = indices.to_vec();
        tree.grow(x, y, &mut indices, 0, params, rng);
        tree
    }

    fn grow(
        &mut self,
        x: &[Vec<f64>],
        y: &[f64],
        indices: &mut [usize],
        depth: usize,
        params: &TreeParams,
        rng: &mut StdRng,
    ) -> usize {
        let node_id = self.nodes.len();
        let value = mean(y, indices);
        self.nodes.push(Node::Leaf(value));

        let constant = indices.iter().all(|&i| (y[i] - value).abs() < f64::EPSILON);
        if depth >= params.max_depth
            || indices.len() < params.min_samples_split
            || indices.len() < 2 * params.min_samples_leaf
            || constant
        {
            return node_id;
        }

        let Some(split) = Self::best_split(x, y, indices, params, rng) else {
            return node_id;
        };

        // in-place partition: left block holds x <= threshold
        let mut boundary = 0;
        for i in 0..indices.len() {
            if x[indices[i]][split.feature] <= split.threshold {
                indices.swap(i, boundary);
                boundary += 1;
            }
        }
        if boundary == 0 || boundary == indices.len() {
            return node_id;
        }

        let (left_indices, right_indices) = indices.split_at_mut(boundary);
        let left = self.grow(x, y, left_indices, depth + 1, params, rng);
        let right = self.grow(x, y, right_indices, depth + 1, params, rng);
        self.nodes[node_id] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        node_id
    }

    fn best_split(
        x: &[Vec<f64>],
        y: &[f64],
        indices: &[usize],
        params: &TreeParams,
        rng: &mut StdRng,
    ) -> Option<BestSplit> {
        let n_features = x.first().map_or(0, Vec::len);
        if n_features == 0 {
            return None;
        }
        let k = params.max_features.unwrap_or(n_features).clamp(1, n_features);
        let features = candidate_features(n_features, k, rng);

        let n = indices.len();
        let total: f64 = indices.iter().map(|&i| y[i]).sum();
        #[allow(clippy::cast_precision_loss)]
        let parent_score = total * total / n as f64;
        let min_leaf = params.min_samples_leaf.max(1);

        let mut best: Option<BestSplit> = None;
        let mut sorted = indices.to_vec();

        for feature in features {
            sorted.sort_by(|&a, &b| x[a][feature].total_cmp(&x[b][feature]));

            let mut left_sum = 0.0;
            for position in 1..n {
                left_sum += y[sorted[position - 1]];
                let left_n = position;
                let right_n = n - position;
                if left_n < min_leaf || right_n < min_leaf {
                    continue;
                }

                let previous = x[sorted[position - 1]][feature];
                let current = x[sorted[position]][feature];
                if previous >= current {
                    continue;
                }

                let right_sum = total - left_sum;
                #[allow(clippy::cast_precision_loss)]
                let score = left_sum * left_sum / left_n as f64 + right_sum * right_sum / right_n as f64;

                if score > parent_score + 1e-12 && best.as_ref().is_none_or(|b| score > b.score) {
                    best = Some(BestSplit {
                        feature,
                        threshold: previous + (current - previous) / 2.0,
                        score,
                    });
                }
            }
        }

        best
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], id: usize) -> usize {
            match &nodes[id] {
                Node::Leaf(_) => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        if self.nodes.is_empty() { 0 } else { walk(&self.nodes, 0) }
    }
}

impl Regressor for RegressionTree {
    fn predict(&self, features: &[f64]) -> f64 {
        let mut id = 0;
        loop {
            match self.nodes.get(id) {
                Some(Node::Leaf(value)) => return *value,
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let value = features.get(*feature).copied().unwrap_or(f64::NAN);
                    id = if value <= *threshold { *left } else { *right };
                }
                None => return 0.0,
            }
        }
    }

    fn name(&self) -> &'static str {
        "regression-tree"
    }
}
