//! Limited-memory BFGS minimizer for smooth objectives

use crate::error::{LabError, Result};
use ndarray::Array1;
use std::collections::VecDeque;
use tracing::trace;

/// Outcome of a minimization
#[derive(Debug, Clone)]
pub struct LbfgsResult {
    /// Final iterate
    pub x: Array1<f64>,
    /// Objective value at `x`
    pub fx: f64,
    /// Iterations performed
    pub n_iter: usize,
    /// Whether a stopping tolerance was met before `max_iter`
    pub converged: bool,
}

/// L-BFGS with two-loop recursion and Armijo backtracking
#[derive(Debug, Clone)]
pub struct Lbfgs {
    /// Number of correction pairs kept
    pub history: usize,
    pub max_iter: usize,
    /// Stop when the largest gradient component falls below this
    pub gtol: f64,
    /// Stop when the relative objective reduction falls below this
    pub ftol: f64,
    /// Sufficient-decrease constant
    pub c1: f64,
    pub max_line_search: usize,
}

impl Default for Lbfgs {
    fn default() -> Self {
        Self {
            history: 10,
            max_iter: 100,
            gtol: 1e-4,
            ftol: 2.220446049250313e-9,
            c1: 1e-4,
            max_line_search: 40,
        }
    }
}

fn inf_norm(v: &Array1<f64>) -> f64 {
    v.iter().fold(0.0f64, |acc, x| acc.max(x.abs()))
}

struct Correction {
    s: Array1<f64>,
    y: Array1<f64>,
    rho: f64,
}

impl Lbfgs {
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_gtol(mut self, gtol: f64) -> Self {
        self.gtol = gtol;
        self
    }

    pub fn with_history(mut self, history: usize) -> Self {
        self.history = history.max(1);
        self
    }

    /// Minimize `objective`, which returns the value and gradient at a point
    pub fn minimize<F>(&self, x0: Array1<f64>, mut objective: F) -> Result<LbfgsResult>
    where
        F: FnMut(&Array1<f64>) -> (f64, Array1<f64>),
    {
        let mut x = x0;
        let (mut fx, mut g) = objective(&x);
        if !fx.is_finite() {
            return Err(LabError::TrainingError(
                "objective is not finite at the starting point".to_string(),
            ));
        }

        let mut corrections: VecDeque<Correction> = VecDeque::with_capacity(self.history);
        let mut n_iter = 0;
        let mut converged = inf_norm(&g) <= self.gtol;

        while !converged && n_iter < self.max_iter {
            n_iter += 1;

            let mut d = self.direction(&g, &corrections);
            let mut dg = g.dot(&d);
            if dg >= 0.0 {
                // Curvature information went stale; restart from steepest descent.
                corrections.clear();
                d = -&g;
                dg = -g.dot(&g);
            }

            let mut step = if corrections.is_empty() {
                (1.0 / g.dot(&g).sqrt()).min(1.0)
            } else {
                1.0
            };

            let mut accepted = None;
            for _ in 0..self.max_line_search {
                let candidate = &x + &(&d * step);
                let (f_new, g_new) = objective(&candidate);
                if f_new.is_finite() && f_new <= fx + self.c1 * step * dg {
                    accepted = Some((candidate, f_new, g_new));
                    break;
                }
                step *= 0.5;
            }

            let Some((x_new, f_new, g_new)) = accepted else {
                trace!(iteration = n_iter, "line search could not reduce the objective");
                break;
            };

            let s = &x_new - &x;
            let y = &g_new - &g;
            let sy = s.dot(&y);
            if sy > 1e-10 {
                if corrections.len() == self.history {
                    corrections.pop_front();
                }
                corrections.push_back(Correction { s, y, rho: 1.0 / sy });
            }

            let reduction = (fx - f_new) / fx.abs().max(f_new.abs()).max(1.0);
            x = x_new;
            fx = f_new;
            g = g_new;
            trace!(iteration = n_iter, objective = fx, "lbfgs step");

            converged = inf_norm(&g) <= self.gtol || reduction <= self.ftol;
        }

        Ok(LbfgsResult {
            x,
            fx,
            n_iter,
            converged,
        })
    }

    fn direction(&self, g: &Array1<f64>, corrections: &VecDeque<Correction>) -> Array1<f64> {
        let mut q = g.clone();
        let mut alphas = Vec::with_capacity(corrections.len());
        for c in corrections.iter().rev() {
            let alpha = c.rho * c.s.dot(&q);
            q.scaled_add(-alpha, &c.y);
            alphas.push(alpha);
        }

        let gamma = corrections
            .back()
            .map(|c| c.s.dot(&c.y) / c.y.dot(&c.y))
            .unwrap_or(1.0);
        let mut r = q * gamma;

        for (c, alpha) in corrections.iter().zip(alphas.into_iter().rev()) {
            let beta = c.rho * c.y.dot(&r);
            r.scaled_add(alpha - beta, &c.s);
        }
        -r
    }
}
