//! Logistic Regression
//!
//! Class-balanced, L2 penalized logistic regression fitted with damped Newton
//! steps. The intercept is not penalized.
use crate::constants::{LOGISTIC_C, LOGISTIC_MAX_ITER, LOGISTIC_TOL};
use crate::data::DenseMatrix;
use crate::errors::{Result, RiskError};
use crate::utils::sigmoid;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// A fitted logistic regression.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogisticRegression {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    /// Inverse regularization strength.
    pub c: f64,
    pub max_iter: usize,
    pub n_iter: usize,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LogisticRegression {
    pub fn new() -> Self {
        LogisticRegression {
            coefficients: Vec::new(),
            intercept: 0.0,
            c: LOGISTIC_C,
            max_iter: LOGISTIC_MAX_ITER,
            n_iter: 0,
        }
    }

    /// Log-odds of the positive class.
    pub fn decision_function_row(&self, row: &[f64]) -> f64 {
        self.intercept + self.coefficients.iter().zip(row).map(|(w, x)| w * x).sum::<f64>()
    }

    pub fn predict_proba_row(&self, row: &[f64]) -> f64 {
        sigmoid(self.decision_function_row(row))
    }

    /// Fit with balanced class weights `n / (2 * n_class)`.
    pub fn fit(&mut self, data: &DenseMatrix, y: &[u8]) -> Result<()> {
        if data.rows == 0 || data.rows != y.len() {
            return Err(RiskError::InvalidParameter(
                "y".to_string(),
                format!("{} labels", data.rows),
                y.len().to_string(),
            ));
        }
        let n_pos = y.iter().filter(|&&v| v == 1).count();
        let n_neg = y.len() - n_pos;
        if n_pos == 0 || n_neg == 0 {
            return Err(RiskError::SingleClassLabel);
        }
        let n = y.len() as f64;
        let w_pos = n / (2.0 * n_pos as f64);
        let w_neg = n / (2.0 * n_neg as f64);
        let sample_weight: Vec<f64> = y.iter().map(|&v| if v == 1 { w_pos } else { w_neg }).collect();
        self.fit_weighted(data, y, &sample_weight)
    }

    fn fit_weighted(&mut self, data: &DenseMatrix, y: &[u8], sample_weight: &[f64]) -> Result<()> {
        let p = data.cols;
        // Parameters: coefficients then the intercept.
        let mut beta = vec![0.0; p + 1];
        let mut loss = self.penalized_loss(data, y, sample_weight, &beta);
        let mut converged = false;

        for iter in 0..self.max_iter {
            let (gradient, mut hessian) = self.gradient_hessian(data, y, sample_weight, &beta);
            if gradient.iter().all(|g| g.abs() < LOGISTIC_TOL) {
                converged = true;
                self.n_iter = iter;
                break;
            }
            let mut step = gradient.clone();
            solve_in_place(&mut hessian, &mut step, p + 1).ok_or_else(|| {
                RiskError::ModelSelectionFailure("singular Hessian in logistic regression".to_string())
            })?;

            // Backtrack until the penalized loss decreases.
            let mut scale = 1.0;
            let mut candidate = beta.clone();
            let mut improved = false;
            for _ in 0..40 {
                for ((c, b), s) in candidate.iter_mut().zip(&beta).zip(&step) {
                    *c = b - scale * s;
                }
                let new_loss = self.penalized_loss(data, y, sample_weight, &candidate);
                if new_loss <= loss {
                    loss = new_loss;
                    improved = true;
                    break;
                }
                scale *= 0.5;
            }
            if !improved {
                converged = true;
                self.n_iter = iter;
                break;
            }
            let max_step = step.iter().map(|s| (s * scale).abs()).fold(0.0, f64::max);
            beta = candidate;
            self.n_iter = iter + 1;
            if max_step < LOGISTIC_TOL {
                converged = true;
                break;
            }
        }
        if !converged {
            warn!("Logistic regression did not converge in {} iterations.", self.max_iter);
        }
        debug!("Logistic regression fitted in {} iterations, loss {:.6}.", self.n_iter, loss);

        self.intercept = beta[p];
        beta.truncate(p);
        self.coefficients = beta;
        if self.coefficients.iter().any(|w| !w.is_finite()) || !self.intercept.is_finite() {
            return Err(RiskError::ModelSelectionFailure(
                "non-finite logistic regression coefficients".to_string(),
            ));
        }
        Ok(())
    }

    fn margin(data_row: &[f64], beta: &[f64]) -> f64 {
        let p = data_row.len();
        beta[p] + data_row.iter().zip(beta).map(|(x, w)| x * w).sum::<f64>()
    }

    fn penalized_loss(&self, data: &DenseMatrix, y: &[u8], sample_weight: &[f64], beta: &[f64]) -> f64 {
        let p = data.cols;
        let data_loss: f64 = data
            .row_iter()
            .zip(y)
            .zip(sample_weight)
            .map(|((row, &label), w)| {
                let z = Self::margin(row, beta);
                // log(1 + e^z) - y * z, computed without overflow.
                let softplus = if z > 0.0 { z + (-z).exp().ln_1p() } else { z.exp().ln_1p() };
                w * (softplus - f64::from(label) * z)
            })
            .sum();
        let penalty: f64 = beta[..p].iter().map(|b| b * b).sum::<f64>() / (2.0 * self.c);
        data_loss + penalty
    }

    fn gradient_hessian(
        &self,
        data: &DenseMatrix,
        y: &[u8],
        sample_weight: &[f64],
        beta: &[f64],
    ) -> (Vec<f64>, Vec<f64>) {
        let p = data.cols;
        let k = p + 1;
        let mut gradient = vec![0.0; k];
        let mut hessian = vec![0.0; k * k];
        for ((row, &label), w) in data.row_iter().zip(y).zip(sample_weight) {
            let prob = sigmoid(Self::margin(row, beta));
            let residual = w * (prob - f64::from(label));
            let curvature = w * prob * (1.0 - prob);
            for a in 0..k {
                let xa = if a < p { row[a] } else { 1.0 };
                gradient[a] += residual * xa;
                if xa == 0.0 {
                    continue;
                }
                for b in a..k {
                    let xb = if b < p { row[b] } else { 1.0 };
                    hessian[a * k + b] += curvature * xa * xb;
                }
            }
        }
        for a in 0..k {
            for b in 0..a {
                hessian[a * k + b] = hessian[b * k + a];
            }
        }
        for j in 0..p {
            gradient[j] += beta[j] / self.c;
            hessian[j * k + j] += 1.0 / self.c;
        }
        // Keeps the intercept row invertible when every probability saturates.
        hessian[p * k + p] += 1e-12;
        (gradient, hessian)
    }
}

/// Solve `a x = b` by Gaussian elimination with partial pivoting, leaving `x` in `b`.
fn solve_in_place(a: &mut [f64], b: &mut [f64], n: usize) -> Option<()> {
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[i * n + col].abs().total_cmp(&a[j * n + col].abs()))?;
        if a[pivot * n + col].abs() < 1e-300 {
            return None;
        }
        if pivot != col {
            for j in 0..n {
                a.swap(col * n + j, pivot * n + j);
            }
            b.swap(col, pivot);
        }
        for row in col + 1..n {
            let factor = a[row * n + col] / a[col * n + col];
            if factor == 0.0 {
                continue;
            }
            for j in col..n {
                a[row * n + j] -= factor * a[col * n + j];
            }
            b[row] -= factor * b[col];
        }
    }
    for col in (0..n).rev() {
        let mut acc = b[col];
        for j in col + 1..n {
            acc -= a[col * n + j] * b[j];
        }
        b[col] = acc / a[col * n + col];
    }
    Some(())
}
