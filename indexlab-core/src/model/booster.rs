//! Boosted ensemble, fitting loop and early stopping.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::matrix::Matrix;
use super::metrics::rmse;
use super::tree::RegressionTree;
use super::ModelError;

/// Booster hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoosterParams {
    pub n_rounds: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    /// Fraction of rows sampled per tree.
    pub subsample: f64,
    /// Fraction of columns sampled per tree.
    pub colsample: f64,
    /// L2 regularization on leaf weights.
    pub lambda: f64,
    pub min_child_weight: f64,
    /// Minimum gain required to split.
    pub gamma: f64,
    /// Stop after this many rounds without eval-RMSE improvement.
    pub early_stopping_rounds: Option<usize>,
    pub seed: u64,
}

impl Default for BoosterParams {
    fn default() -> Self {
        Self {
            n_rounds: 300,
            learning_rate: 0.05,
            max_depth: 6,
            subsample: 0.8,
            colsample: 0.8,
            lambda: 1.0,
            min_child_weight: 1.0,
            gamma: 0.0,
            early_stopping_rounds: Some(20),
            seed: 42,
        }
    }
}

impl BoosterParams {
    pub fn validate(&self) -> Result<(), ModelError> {
        let fraction_ok = |v: f64| v > 0.0 && v <= 1.0;
        if self.n_rounds == 0 {
            return Err(ModelError::InvalidParams("n_rounds must be > 0".into()));
        }
        if !(self.learning_rate > 0.0) {
            return Err(ModelError::InvalidParams("learning_rate must be > 0".into()));
        }
        if !fraction_ok(self.subsample) {
            return Err(ModelError::InvalidParams("subsample must be in (0, 1]".into()));
        }
        if !fraction_ok(self.colsample) {
            return Err(ModelError::InvalidParams("colsample must be in (0, 1]".into()));
        }
        if self.lambda < 0.0 || self.gamma < 0.0 || self.min_child_weight < 0.0 {
            return Err(ModelError::InvalidParams(
                "lambda, gamma and min_child_weight must be >= 0".into(),
            ));
        }
        if self.early_stopping_rounds == Some(0) {
            return Err(ModelError::InvalidParams("early_stopping_rounds must be > 0".into()));
        }
        Ok(())
    }
}

/// A fitted ensemble. Prediction is `base_score + Σ tree(x)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBooster {
    pub params: BoosterParams,
    pub base_score: f64,
    pub n_features: usize,
    trees: Vec<RegressionTree>,
}

/// Diagnostics from one fit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitReport {
    /// Rounds actually run before stopping.
    pub rounds_run: usize,
    /// Zero-based round with the lowest eval RMSE; the ensemble keeps
    /// `best_iteration + 1` trees. `None` without an eval set.
    pub best_iteration: Option<usize>,
    pub best_eval_rmse: Option<f64>,
    pub train_rmse: f64,
    pub eval_history: Vec<f64>,
}

impl GradientBooster {
    /// Fit on `(x, y)`, optionally early stopping against `eval`.
    pub fn fit(
        params: &BoosterParams,
        x: &Matrix,
        y: &[f64],
        eval: Option<(&Matrix, &[f64])>,
    ) -> Result<(Self, FitReport), ModelError> {
        params.validate()?;
        if x.is_empty() {
            return Err(ModelError::EmptyTrainingSet);
        }
        if x.n_rows() != y.len() {
            return Err(ModelError::ShapeMismatch {
                expected: format!("{} targets", x.n_rows()),
                actual: format!("{} targets", y.len()),
            });
        }
        if let Some(i) = y.iter().position(|v| !v.is_finite()) {
            return Err(ModelError::NonFiniteTarget(i));
        }
        if let Some((ex, ey)) = eval {
            if ex.n_cols() != x.n_cols() || ex.n_rows() != ey.len() {
                return Err(ModelError::ShapeMismatch {
                    expected: format!("eval set with {} columns and matching targets", x.n_cols()),
                    actual: format!("{}x{} with {} targets", ex.n_rows(), ex.n_cols(), ey.len()),
                });
            }
        }
        let eval = eval.filter(|(ex, _)| !ex.is_empty());

        let n = x.n_rows();
        let base_score = y.iter().sum::<f64>() / n as f64;
        let mut booster = Self {
            params: params.clone(),
            base_score,
            n_features: x.n_cols(),
            trees: Vec::with_capacity(params.n_rounds),
        };

        let mut rng = StdRng::seed_from_u64(params.seed);
        let mut preds = vec![base_score; n];
        let mut eval_preds = eval.map(|(ex, _)| vec![base_score; ex.n_rows()]);
        let hess = vec![1.0; n];

        let mut eval_history = Vec::new();
        let mut best: Option<(usize, f64)> = None;

        for round in 0..params.n_rounds {
            let grad: Vec<f64> = preds.iter().zip(y).map(|(p, t)| p - t).collect();
            let rows = sample_indices(&mut rng, n, params.subsample);
            let columns = sample_indices(&mut rng, x.n_cols(), params.colsample);

            let tree = RegressionTree::grow(x, &grad, &hess, &rows, &columns, params);
            for (i, p) in preds.iter_mut().enumerate() {
                *p += tree.predict(x.row(i));
            }

            if let (Some((ex, ey)), Some(ep)) = (eval, eval_preds.as_mut()) {
                for (i, p) in ep.iter_mut().enumerate() {
                    *p += tree.predict(ex.row(i));
                }
                let score = rmse(ep, ey);
                eval_history.push(score);

                if best.map_or(true, |(_, b)| score < b) {
                    best = Some((round, score));
                }
                debug!(round, eval_rmse = score, "boosting round");
            }
            booster.trees.push(tree);

            if let (Some(patience), Some((best_round, _))) = (params.early_stopping_rounds, best) {
                if eval.is_some() && round - best_round >= patience {
                    debug!(round, best_round, "early stopping");
                    break;
                }
            }
        }

        let rounds_run = booster.trees.len();
        if let Some((best_round, _)) = best {
            booster.trees.truncate(best_round + 1);
        }

        let train_rmse = rmse(&booster.predict(x), y);
        let report = FitReport {
            rounds_run,
            best_iteration: best.map(|(r, _)| r),
            best_eval_rmse: best.map(|(_, s)| s),
            train_rmse,
            eval_history,
        };
        Ok((booster, report))
    }

    pub fn predict_row(&self, row: &[f64]) -> f64 {
        self.base_score + self.trees.iter().map(|t| t.predict(row)).sum::<f64>()
    }

    pub fn predict(&self, x: &Matrix) -> Vec<f64> {
        (0..x.n_rows()).map(|i| self.predict_row(x.row(i))).collect()
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Share of splits per feature across the ensemble.
    pub fn feature_importances(&self) -> Vec<f64> {
        let mut counts = vec![0usize; self.n_features];
        for tree in &self.trees {
            for (c, k) in counts.iter_mut().zip(tree.split_counts(self.n_features)) {
                *c += k;
            }
        }
        let total: usize = counts.iter().sum();
        counts
            .into_iter()
            .map(|c| if total == 0 { 0.0 } else { c as f64 / total as f64 })
            .collect()
    }
}

/// Sorted sample of `ceil(n * fraction)` indices (at least one).
fn sample_indices(rng: &mut StdRng, n: usize, fraction: f64) -> Vec<usize> {
    if fraction >= 1.0 || n <= 1 {
        return (0..n).collect();
    }
    let amount = ((n as f64 * fraction).ceil() as usize).clamp(1, n);
    let mut picked = rand::seq::index::sample(rng, n, amount).into_vec();
    picked.sort_unstable();
    picked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_data(n: usize) -> (Matrix, Vec<f64>) {
        let mut data = Vec::with_capacity(n * 2);
        let mut y = Vec::with_capacity(n);
        for i in 0..n {
            let a = i as f64;
            let b = (i % 7) as f64;
            data.push(a);
            data.push(b);
            y.push(3.0 * a + 10.0 * b);
        }
        (Matrix::new(data, n, 2).unwrap(), y)
    }

    #[test]
    fn reduces_error_versus_base_score() {
        let (x, y) = linear_data(200);
        let params = BoosterParams {
            n_rounds: 100,
            learning_rate: 0.3,
            early_stopping_rounds: None,
            ..BoosterParams::default()
        };
        let (booster, report) = GradientBooster::fit(&params, &x, &y, None).unwrap();

        let base = vec![booster.base_score; y.len()];
        assert!(report.train_rmse < rmse(&base, &y) * 0.2);
        assert_eq!(booster.n_trees(), 100);
        assert!(report.best_iteration.is_none());
    }

    #[test]
    fn same_seed_same_model() {
        let (x, y) = linear_data(80);
        let params = BoosterParams {
            n_rounds: 20,
            ..BoosterParams::default()
        };
        let (a, _) = GradientBooster::fit(&params, &x, &y, None).unwrap();
        let (b, _) = GradientBooster::fit(&params, &x, &y, None).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn early_stopping_truncates_to_best_iteration() {
        let (x, y) = linear_data(120);
        // Eval targets far above anything in training: every round moves away.
        let (ex, _) = linear_data(30);
        let ey = vec![1000.0; 30];
        let params = BoosterParams {
            n_rounds: 300,
            learning_rate: 0.3,
            early_stopping_rounds: Some(5),
            ..BoosterParams::default()
        };

        let (booster, report) = GradientBooster::fit(&params, &x, &y, Some((&ex, &ey))).unwrap();
        let best = report.best_iteration.unwrap();
        assert!(report.rounds_run < 300);
        assert_eq!(booster.n_trees(), best + 1);
        assert_eq!(report.rounds_run, best + 1 + 5);

        let min = report.eval_history.iter().cloned().fold(f64::INFINITY, f64::min);
        assert_eq!(report.best_eval_rmse, Some(min));
    }

    #[test]
    fn rejects_bad_input() {
        let (x, y) = linear_data(10);
        let params = BoosterParams::default();

        assert!(matches!(
            GradientBooster::fit(&params, &x, &y[..5], None),
            Err(ModelError::ShapeMismatch { .. })
        ));

        let mut bad = y.clone();
        bad[3] = f64::NAN;
        assert!(matches!(
            GradientBooster::fit(&params, &x, &bad, None),
            Err(ModelError::NonFiniteTarget(3))
        ));

        let empty = Matrix::new(Vec::new(), 0, 2).unwrap();
        assert!(matches!(
            GradientBooster::fit(&params, &empty, &[], None),
            Err(ModelError::EmptyTrainingSet)
        ));
    }

    #[test]
    fn invalid_params_rejected() {
        let params = BoosterParams {
            subsample: 0.0,
            ..BoosterParams::default()
        };
        assert!(params.validate().is_err());
        assert!(BoosterParams::default().validate().is_ok());
    }

    #[test]
    fn importances_sum_to_one() {
        let (x, y) = linear_data(100);
        let params = BoosterParams {
            n_rounds: 10,
            ..BoosterParams::default()
        };
        let (booster, _) = GradientBooster::fit(&params, &x, &y, None).unwrap();
        let total: f64 = booster.feature_importances().iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
    }
}
