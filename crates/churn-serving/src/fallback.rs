//! Placeholder predictor used when the real artifact cannot be loaded
//!
//! A logistic regression over positional features, fitted on a handful of
//! synthetic rows drawn from a fixed-seed RNG. It exists only so the
//! container passes health checks in degraded mode; its predictions carry
//! no meaning.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::artifact::{sigmoid, PredictionError, Predictor};
use crate::frame::{Cell, Frame};

/// Default number of positional inputs
pub const DEFAULT_FALLBACK_FEATURES: usize = 30;

const SYNTHETIC_ROWS: usize = 10;
const SEED: u64 = 42;
const ITERATIONS: usize = 200;
const LEARNING_RATE: f64 = 0.5;
/// L2 strength, matching an inverse regularization of C = 1
const L2: f64 = 1.0;

/// Logistic regression over the request's columns taken in order
#[derive(Clone, Debug, PartialEq)]
pub struct FallbackModel {
    weights: Vec<f64>,
    intercept: f64,
}

impl FallbackModel {
    /// Fit the placeholder on deterministic synthetic data.
    ///
    /// Returns `None` when `n_features` is zero.
    pub fn fit(n_features: usize) -> Option<Self> {
        if n_features == 0 {
            return None;
        }

        let mut rng = StdRng::seed_from_u64(SEED);
        let x: Vec<Vec<f64>> = (0..SYNTHETIC_ROWS)
            .map(|_| (0..n_features).map(|_| rng.gen::<f64>()).collect())
            .collect();
        let mut y: Vec<f64> = (0..SYNTHETIC_ROWS)
            .map(|_| if rng.gen_bool(0.5) { 1.0 } else { 0.0 })
            .collect();
        // Both classes must be present for the fit to mean anything
        if y.iter().all(|&v| v == y[0]) {
            y[0] = 1.0 - y[0];
        }

        let mut weights = vec![0.0; n_features];
        let mut intercept = 0.0;
        let n = SYNTHETIC_ROWS as f64;

        for _ in 0..ITERATIONS {
            let mut grad_w = vec![0.0; n_features];
            let mut grad_b = 0.0;
            for (row, &target) in x.iter().zip(&y) {
                let z = intercept + dot(&weights, row);
                let residual = sigmoid(z) - target;
                for (g, xi) in grad_w.iter_mut().zip(row) {
                    *g += residual * xi;
                }
                grad_b += residual;
            }
            for (w, g) in weights.iter_mut().zip(&grad_w) {
                *w -= LEARNING_RATE * (g / n + L2 * *w / n);
            }
            intercept -= LEARNING_RATE * grad_b / n;
        }

        Some(Self { weights, intercept })
    }

    /// Number of positional inputs
    pub fn n_features(&self) -> usize {
        self.weights.len()
    }
}

impl Predictor for FallbackModel {
    fn predict_proba(&self, frame: &Frame) -> Result<Vec<f64>, PredictionError> {
        if frame.columns().len() != self.n_features() {
            return Err(PredictionError::FeatureCount {
                expected: self.n_features(),
                got: frame.columns().len(),
            });
        }

        frame
            .rows()
            .iter()
            .enumerate()
            .map(|(row, cells)| {
                let values = cells
                    .iter()
                    .zip(frame.columns())
                    .map(|(cell, column)| match cell {
                        Cell::Number(x) => Ok(*x),
                        Cell::Missing => Err(PredictionError::MissingValue {
                            column: column.clone(),
                            row,
                        }),
                        Cell::Text(_) => Err(PredictionError::NonNumeric {
                            column: column.clone(),
                            row,
                        }),
                    })
                    .collect::<Result<Vec<_>, _>>()?;

                let p = sigmoid(self.intercept + dot(&self.weights, &values));
                if p.is_finite() {
                    Ok(p)
                } else {
                    Err(PredictionError::NonFinite { row })
                }
            })
            .collect()
    }

    fn describe(&self) -> String {
        format!("fallback placeholder ({} positional features)", self.weights.len())
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
