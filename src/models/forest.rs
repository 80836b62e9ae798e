//! Regression trees and the bagged ensemble behind the tree model
//!
//! Trees split on feature midpoints by variance reduction and are grown in
//! parallel, each from its own seeded bootstrap sample, so a fixed seed
//! yields an identical forest.

use crate::error::{ForecastError, Result};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

/// Forest hyperparameters
#[derive(Debug, Clone)]
pub struct ForestConfig {
    /// Number of trees
    pub n_trees: usize,
    /// Maximum depth of each tree
    pub max_depth: usize,
    /// Minimum samples required to split a node
    pub min_samples_split: usize,
    /// Minimum samples in a leaf
    pub min_samples_leaf: usize,
    /// Features considered per split (None = n/3, at least one)
    pub max_features: Option<usize>,
    /// Draw a bootstrap sample per tree
    pub bootstrap: bool,
    /// Base seed; tree i uses seed + i
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 10,
            min_samples_split: 5,
            min_samples_leaf: 2,
            max_features: None,
            bootstrap: true,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn variance(values: &[f64]) -> f64 {
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

#[derive(Debug, Clone)]
struct RegressionTree {
    root: Node,
}

impl RegressionTree {
    fn fit(
        rows: &[Vec<f64>],
        targets: &[f64],
        indices: &[usize],
        config: &ForestConfig,
        rng: &mut ChaCha8Rng,
    ) -> Self {
        let root = Self::build(rows, targets, indices, 0, config, rng);
        Self { root }
    }

    fn build(
        rows: &[Vec<f64>],
        targets: &[f64],
        indices: &[usize],
        depth: usize,
        config: &ForestConfig,
        rng: &mut ChaCha8Rng,
    ) -> Node {
        let labels: Vec<f64> = indices.iter().map(|&i| targets[i]).collect();
        let impurity = variance(&labels);

        if depth >= config.max_depth
            || indices.len() < config.min_samples_split
            || impurity < 1e-10
        {
            return Node::Leaf {
                value: mean(&labels),
            };
        }

        match Self::best_split(rows, targets, indices, impurity, config, rng) {
            Some((feature, threshold, left_idx, right_idx)) => {
                if left_idx.len() < config.min_samples_leaf
                    || right_idx.len() < config.min_samples_leaf
                {
                    return Node::Leaf {
                        value: mean(&labels),
                    };
                }

                let left = Self::build(rows, targets, &left_idx, depth + 1, config, rng);
                let right = Self::build(rows, targets, &right_idx, depth + 1, config, rng);

                Node::Split {
                    feature,
                    threshold,
                    left: Box::new(left),
                    right: Box::new(right),
                }
            }
            None => Node::Leaf {
                value: mean(&labels),
            },
        }
    }

    /// Best variance-reducing split over a random feature subset, trying
    /// midpoints between consecutive distinct values as thresholds.
    fn best_split(
        rows: &[Vec<f64>],
        targets: &[f64],
        indices: &[usize],
        parent_impurity: f64,
        config: &ForestConfig,
        rng: &mut ChaCha8Rng,
    ) -> Option<(usize, f64, Vec<usize>, Vec<usize>)> {
        let n_features = rows[indices[0]].len();
        let max_features = config
            .max_features
            .unwrap_or((n_features / 3).max(1))
            .min(n_features);

        let mut feature_indices: Vec<usize> = (0..n_features).collect();
        feature_indices.shuffle(rng);
        feature_indices.truncate(max_features);

        let mut best_gain = 0.0;
        let mut best: Option<(usize, f64, Vec<usize>, Vec<usize>)> = None;

        for &feature in &feature_indices {
            let mut values: Vec<f64> = indices.iter().map(|&i| rows[i][feature]).collect();
            values.sort_by(|a, b| a.total_cmp(b));
            values.dedup();

            for window in values.windows(2) {
                let threshold = (window[0] + window[1]) / 2.0;

                let (left_idx, right_idx): (Vec<usize>, Vec<usize>) =
                    indices.iter().partition(|&&i| rows[i][feature] <= threshold);

                if left_idx.is_empty() || right_idx.is_empty() {
                    continue;
                }

                let left_labels: Vec<f64> = left_idx.iter().map(|&i| targets[i]).collect();
                let right_labels: Vec<f64> = right_idx.iter().map(|&i| targets[i]).collect();

                let n_left = left_idx.len() as f64;
                let n_right = right_idx.len() as f64;
                let weighted = (n_left * variance(&left_labels)
                    + n_right * variance(&right_labels))
                    / (n_left + n_right);

                let gain = parent_impurity - weighted;
                if gain > best_gain {
                    best_gain = gain;
                    best = Some((feature, threshold, left_idx, right_idx));
                }
            }
        }

        best
    }

    fn predict_one(&self, row: &[f64]) -> f64 {
        let mut node = &self.root;
        loop {
            match node {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }
}

/// Bagged ensemble of regression trees averaged at prediction time.
#[derive(Debug)]
pub struct RandomForest {
    config: ForestConfig,
    trees: Vec<RegressionTree>,
}

impl RandomForest {
    pub fn new(config: ForestConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
        }
    }

    /// Fit the forest. Trees are independent, so they are grown in
    /// parallel with per-tree seeds.
    pub fn fit(&mut self, rows: &[Vec<f64>], targets: &[f64]) -> Result<()> {
        if rows.is_empty() {
            return Err(ForecastError::FitError(
                "Cannot fit a forest on an empty training set".to_string(),
            ));
        }
        if rows.len() != targets.len() {
            return Err(ForecastError::FitError(format!(
                "Feature rows ({}) and targets ({}) differ in length",
                rows.len(),
                targets.len()
            )));
        }
        if self.config.n_trees == 0 {
            return Err(ForecastError::InvalidParameter(
                "Forest needs at least one tree".to_string(),
            ));
        }

        let n = rows.len();
        let config = self.config.clone();

        self.trees = (0..config.n_trees)
            .into_par_iter()
            .map(|i| {
                let mut rng = ChaCha8Rng::seed_from_u64(config.seed.wrapping_add(i as u64));

                let indices: Vec<usize> = if config.bootstrap {
                    (0..n).map(|_| rng.gen_range(0..n)).collect()
                } else {
                    (0..n).collect()
                };

                RegressionTree::fit(rows, targets, &indices, &config, &mut rng)
            })
            .collect();

        Ok(())
    }

    pub fn predict_one(&self, row: &[f64]) -> Result<f64> {
        if self.trees.is_empty() {
            return Err(ForecastError::ForecastingError(
                "Forest has not been fitted".to_string(),
            ));
        }
        let sum: f64 = self.trees.iter().map(|t| t.predict_one(row)).sum();
        Ok(sum / self.trees.len() as f64)
    }

    pub fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        rows.iter().map(|row| self.predict_one(row)).collect()
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}
