//! Binary logistic regression solved with L-BFGS

use super::lbfgs::Lbfgs;
use crate::error::{LabError, Result};
use ndarray::{s, Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Hyperparameters for [`LogisticRegression`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogisticRegressionConfig {
    /// Inverse L2 regularization strength
    pub c: f64,
    /// Whether to fit an (unpenalized) intercept
    pub fit_intercept: bool,
    /// Maximum L-BFGS iterations
    pub max_iter: usize,
    /// Gradient tolerance
    pub tol: f64,
    /// L-BFGS history size
    pub history: usize,
}

impl Default for LogisticRegressionConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            fit_intercept: true,
            max_iter: 100,
            tol: 1e-4,
            history: 10,
        }
    }
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// log(1 + exp(z)) without overflow
fn softplus(z: f64) -> f64 {
    if z > 0.0 {
        z + (-z).exp().ln_1p()
    } else {
        z.exp().ln_1p()
    }
}

/// Logistic regression for binary classification (labels 0/1)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    pub config: LogisticRegressionConfig,
    /// Fitted coefficients
    pub coefficients: Option<Array1<f64>>,
    /// Fitted intercept
    pub intercept: Option<f64>,
    /// Iterations used by the solver
    pub n_iter: usize,
    /// Whether the solver met its tolerance
    pub converged: bool,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LogisticRegression {
    /// Create a new logistic regression model
    pub fn new() -> Self {
        Self::with_config(LogisticRegressionConfig::default())
    }

    pub fn with_config(config: LogisticRegressionConfig) -> Self {
        Self {
            config,
            coefficients: None,
            intercept: None,
            n_iter: 0,
            converged: false,
        }
    }

    /// Set inverse regularization strength
    pub fn with_c(mut self, c: f64) -> Self {
        self.config.c = c;
        self
    }

    /// Set maximum iterations
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.config.max_iter = max_iter;
        self
    }

    pub fn is_fitted(&self) -> bool {
        self.coefficients.is_some()
    }

    /// Fit on labels in {0, 1}
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(LabError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(LabError::TrainingError("no training samples".to_string()));
        }
        if !(self.config.c > 0.0) {
            return Err(LabError::InvalidParameter {
                name: "c".to_string(),
                value: self.config.c.to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if let Some(bad) = y.iter().find(|&&v| v != 0.0 && v != 1.0) {
            return Err(LabError::TrainingError(format!(
                "labels must be 0 or 1, found {}",
                bad
            )));
        }
        let positives = y.sum();
        if positives == 0.0 || positives == n_samples as f64 {
            return Err(LabError::TrainingError(
                "training labels contain a single class".to_string(),
            ));
        }

        let n = n_samples as f64;
        let penalty = 1.0 / (self.config.c * n);
        let fit_intercept = self.config.fit_intercept;

        // Mean log-loss plus (1 / (2 C n)) ||w||^2; the intercept is the last
        // parameter and is not penalized.
        let objective = |params: &Array1<f64>| {
            let w = params.slice(s![..n_features]);
            let b = if fit_intercept { params[n_features] } else { 0.0 };
            let z = x.dot(&w) + b;

            let loss = z
                .iter()
                .zip(y.iter())
                .map(|(&zi, &yi)| softplus(zi) - yi * zi)
                .sum::<f64>()
                / n
                + 0.5 * penalty * w.dot(&w);

            let residual = z.mapv(sigmoid) - y;
            let mut grad = Array1::zeros(params.len());
            let grad_w = x.t().dot(&residual) / n + &w * penalty;
            grad.slice_mut(s![..n_features]).assign(&grad_w);
            if fit_intercept {
                grad[n_features] = residual.sum() / n;
            }
            (loss, grad)
        };

        let n_params = n_features + usize::from(fit_intercept);
        let solver = Lbfgs::default()
            .with_max_iter(self.config.max_iter)
            .with_gtol(self.config.tol)
            .with_history(self.config.history);
        let result = solver.minimize(Array1::zeros(n_params), objective)?;

        if !result.converged {
            warn!(
                iterations = result.n_iter,
                "lbfgs failed to converge; increase max_iter or scale the data"
            );
        }
        debug!(iterations = result.n_iter, loss = result.fx, "logistic regression fitted");

        self.coefficients = Some(result.x.slice(s![..n_features]).to_owned());
        self.intercept = Some(if fit_intercept { result.x[n_features] } else { 0.0 });
        self.n_iter = result.n_iter;
        self.converged = result.converged;
        Ok(self)
    }

    /// Decision function values
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = self.coefficients.as_ref().ok_or(LabError::ModelNotFitted)?;
        if x.ncols() != coefficients.len() {
            return Err(LabError::ShapeError {
                expected: format!("{} features", coefficients.len()),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(x.dot(coefficients) + self.intercept.unwrap_or(0.0))
    }

    /// Probability of class 1
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.decision_function(x)?.mapv(sigmoid))
    }

    /// Predict class labels
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(proba.mapv(|p| if p > 0.5 { 1.0 } else { 0.0 }))
    }

    /// Get accuracy score
    pub fn score(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<f64> {
        let y_pred = self.predict(x)?;
        if y.is_empty() {
            return Ok(0.0);
        }
        let correct = y_pred
            .iter()
            .zip(y.iter())
            .filter(|(pred, actual)| (*pred - *actual).abs() < 0.5)
            .count();

        Ok(correct as f64 / y.len() as f64)
    }
}
