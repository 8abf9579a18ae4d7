//! Derivative-free and quasi-Newton minimisers for parameter estimation.
//!
//! Both minimisers take a plain `Fn(&[f64]) -> f64` objective. [`lbfgs`]
//! approximates gradients by central differences, so objectives need not be
//! differentiable in closed form; non-finite objective values are treated as
//! infeasible and rejected by the line search.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::VecDeque;
use tracing::{debug, trace};

/// Outcome of a minimisation run.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationResult {
    /// The best point found.
    pub optimal_point: Vec<f64>,
    /// Objective value at `optimal_point`.
    pub optimal_value: f64,
    /// Iterations performed.
    pub iterations: usize,
    /// Whether a convergence criterion was met within the iteration budget.
    pub converged: bool,
}

impl OptimizationResult {
    fn failed(initial: &[f64]) -> Self {
        Self {
            optimal_point: initial.to_vec(),
            optimal_value: f64::NAN,
            iterations: 0,
            converged: false,
        }
    }
}

/// Configuration for Nelder-Mead optimization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NelderMeadConfig {
    pub max_iter: usize,
    /// Stop when the spread of simplex values falls below this.
    pub tolerance: f64,
    /// Reflection coefficient.
    pub alpha: f64,
    /// Expansion coefficient.
    pub gamma: f64,
    /// Contraction coefficient.
    pub rho: f64,
    /// Shrink coefficient.
    pub sigma: f64,
    /// Initial simplex step, relative to the coordinate when it is non-zero.
    pub initial_step: f64,
}

impl Default for NelderMeadConfig {
    fn default() -> Self {
        Self {
            max_iter: 1000,
            tolerance: 1e-8,
            alpha: 1.0,
            gamma: 2.0,
            rho: 0.5,
            sigma: 0.5,
            initial_step: 0.05,
        }
    }
}

impl NelderMeadConfig {
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }
}

/// Nelder-Mead simplex minimisation.
///
/// # Example
/// ```
/// use energy_analytics::utils::optimization::{nelder_mead, NelderMeadConfig};
///
/// let result = nelder_mead(
///     |x| (x[0] - 2.0).powi(2) + (x[1] - 3.0).powi(2),
///     &[0.0, 0.0],
///     &NelderMeadConfig::default(),
/// );
/// assert!(result.converged);
/// assert!((result.optimal_point[0] - 2.0).abs() < 0.01);
/// ```
pub fn nelder_mead<F>(objective: F, initial: &[f64], config: &NelderMeadConfig) -> OptimizationResult
where
    F: Fn(&[f64]) -> f64,
{
    let n = initial.len();
    if n == 0 {
        return OptimizationResult::failed(initial);
    }

    // Infeasible points rank last.
    let eval = |x: &[f64]| {
        let v = objective(x);
        if v.is_finite() {
            v
        } else {
            f64::INFINITY
        }
    };

    let mut simplex: Vec<Vec<f64>> = Vec::with_capacity(n + 1);
    simplex.push(initial.to_vec());
    for i in 0..n {
        let mut vertex = initial.to_vec();
        vertex[i] += if initial[i].abs() > 1e-10 {
            config.initial_step * initial[i].abs()
        } else {
            config.initial_step
        };
        simplex.push(vertex);
    }
    let mut values: Vec<f64> = simplex.iter().map(|v| eval(v)).collect();

    let blend = |from: &[f64], to: &[f64], t: f64| -> Vec<f64> {
        from.iter().zip(to).map(|(a, b)| a + t * (b - a)).collect()
    };

    let mut iterations = 0;
    let mut converged = false;
    while iterations < config.max_iter {
        iterations += 1;

        let mut order: Vec<usize> = (0..=n).collect();
        order.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap_or(Ordering::Equal));
        let (best, second_worst, worst) = (order[0], order[n - 1], order[n]);

        let spread = values[worst] - values[best];
        if spread.is_finite() && spread < config.tolerance {
            converged = true;
            break;
        }

        let mut centroid = vec![0.0; n];
        for (_, vertex) in simplex.iter().enumerate().filter(|(i, _)| *i != worst) {
            for (c, v) in centroid.iter_mut().zip(vertex) {
                *c += v / n as f64;
            }
        }

        let reflected = blend(&centroid, &simplex[worst], -config.alpha);
        let f_reflected = eval(&reflected);

        if f_reflected < values[best] {
            let expanded = blend(&centroid, &reflected, config.gamma);
            let f_expanded = eval(&expanded);
            if f_expanded < f_reflected {
                simplex[worst] = expanded;
                values[worst] = f_expanded;
            } else {
                simplex[worst] = reflected;
                values[worst] = f_reflected;
            }
            continue;
        }
        if f_reflected < values[second_worst] {
            simplex[worst] = reflected;
            values[worst] = f_reflected;
            continue;
        }

        let (contracted, threshold) = if f_reflected < values[worst] {
            (blend(&centroid, &reflected, config.rho), f_reflected)
        } else {
            (blend(&centroid, &simplex[worst], config.rho), values[worst])
        };
        let f_contracted = eval(&contracted);
        if f_contracted < threshold {
            simplex[worst] = contracted;
            values[worst] = f_contracted;
            continue;
        }

        let anchor = simplex[best].clone();
        for i in (0..=n).filter(|&i| i != best) {
            simplex[i] = blend(&anchor, &simplex[i], config.sigma);
            values[i] = eval(&simplex[i]);
        }
    }

    let best = values
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(Ordering::Equal))
        .map_or(0, |(i, _)| i);

    debug!(iterations, converged, value = values[best], "nelder-mead finished");
    OptimizationResult {
        optimal_point: simplex[best].clone(),
        optimal_value: values[best],
        iterations,
        converged,
    }
}

/// Configuration for [`lbfgs`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LbfgsConfig {
    pub max_iter: usize,
    /// Number of correction pairs kept for the inverse Hessian estimate.
    pub memory: usize,
    /// Converged when the largest gradient component falls below this.
    pub gradient_tolerance: f64,
    /// Converged when the relative objective decrease falls below this.
    pub function_tolerance: f64,
    /// Backtracking halvings tried before a line search gives up.
    pub max_line_search: usize,
}

impl Default for LbfgsConfig {
    fn default() -> Self {
        Self {
            max_iter: 200,
            memory: 10,
            gradient_tolerance: 1e-5,
            function_tolerance: 1e-10,
            max_line_search: 40,
        }
    }
}

impl LbfgsConfig {
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }
}

/// Central-difference gradient.
pub fn numerical_gradient<F>(objective: &F, x: &[f64]) -> Vec<f64>
where
    F: Fn(&[f64]) -> f64,
{
    let mut probe = x.to_vec();
    (0..x.len())
        .map(|i| {
            let h = f64::EPSILON.cbrt() * x[i].abs().max(1.0);
            probe[i] = x[i] + h;
            let up = objective(&probe);
            probe[i] = x[i] - h;
            let down = objective(&probe);
            probe[i] = x[i];
            let g = (up - down) / (2.0 * h);
            if g.is_finite() {
                g
            } else {
                0.0
            }
        })
        .collect()
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Limited-memory BFGS with Armijo backtracking.
///
/// Gradients come from [`numerical_gradient`]. A run whose line search
/// cannot improve on a steepest-descent step has reached a stationary point
/// within numerical precision and is reported as converged.
///
/// # Example
/// ```
/// use energy_analytics::utils::optimization::{lbfgs, LbfgsConfig};
///
/// let result = lbfgs(
///     |x| (1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0] * x[0]).powi(2),
///     &[-1.2, 1.0],
///     &LbfgsConfig::default(),
/// );
/// assert!(result.converged);
/// assert!((result.optimal_point[0] - 1.0).abs() < 1e-3);
/// ```
pub fn lbfgs<F>(objective: F, initial: &[f64], config: &LbfgsConfig) -> OptimizationResult
where
    F: Fn(&[f64]) -> f64,
{
    let n = initial.len();
    let mut x = initial.to_vec();
    let mut f = objective(&x);
    if n == 0 || !f.is_finite() {
        return OptimizationResult {
            optimal_value: f,
            ..OptimizationResult::failed(initial)
        };
    }
    let mut g = numerical_gradient(&objective, &x);

    // (s, y, 1 / y·s)
    let mut history: VecDeque<(Vec<f64>, Vec<f64>, f64)> = VecDeque::with_capacity(config.memory);
    let mut iterations = 0;
    let mut converged = false;

    while iterations < config.max_iter {
        if g.iter().all(|gi| gi.abs() < config.gradient_tolerance) {
            converged = true;
            break;
        }
        iterations += 1;

        // Two-loop recursion.
        let mut q = g.clone();
        let mut alphas = Vec::with_capacity(history.len());
        for (s, y, rho) in history.iter().rev() {
            let a = rho * dot(s, &q);
            for (qi, yi) in q.iter_mut().zip(y) {
                *qi -= a * yi;
            }
            alphas.push(a);
        }
        if let Some((s, y, _)) = history.back() {
            let gamma = dot(s, y) / dot(y, y);
            q.iter_mut().for_each(|qi| *qi *= gamma);
        }
        for ((s, y, rho), a) in history.iter().zip(alphas.iter().rev()) {
            let b = rho * dot(y, &q);
            for (qi, si) in q.iter_mut().zip(s) {
                *qi += (a - b) * si;
            }
        }
        let mut direction: Vec<f64> = q.iter().map(|v| -v).collect();

        let mut slope = dot(&g, &direction);
        if slope.is_nan() || slope >= 0.0 {
            history.clear();
            direction = g.iter().map(|v| -v).collect();
            slope = -dot(&g, &g);
        }

        let mut step = if history.is_empty() {
            (1.0 / g.iter().map(|v| v.abs()).fold(0.0, f64::max)).min(1.0)
        } else {
            1.0
        };

        let mut accepted = None;
        for _ in 0..config.max_line_search {
            let candidate: Vec<f64> = x.iter().zip(&direction).map(|(xi, di)| xi + step * di).collect();
            let fc = objective(&candidate);
            if fc.is_finite() && fc <= f + 1e-4 * step * slope {
                accepted = Some((candidate, fc));
                break;
            }
            step *= 0.5;
        }

        let Some((x_new, f_new)) = accepted else {
            if history.is_empty() {
                converged = true;
                break;
            }
            trace!(iterations, "line search failed, restarting from steepest descent");
            history.clear();
            continue;
        };

        let g_new = numerical_gradient(&objective, &x_new);
        let s: Vec<f64> = x_new.iter().zip(&x).map(|(a, b)| a - b).collect();
        let y: Vec<f64> = g_new.iter().zip(&g).map(|(a, b)| a - b).collect();
        let sy = dot(&s, &y);
        if sy > 1e-10 {
            while history.len() >= config.memory.max(1) {
                history.pop_front();
            }
            history.push_back((s, y, 1.0 / sy));
        }

        let decrease = f - f_new;
        x = x_new;
        g = g_new;
        f = f_new;
        trace!(iterations, value = f, "lbfgs step");

        if decrease.abs() <= config.function_tolerance * f.abs().max(1.0) {
            converged = true;
            break;
        }
    }

    debug!(iterations, converged, value = f, "lbfgs finished");
    OptimizationResult {
        optimal_point: x,
        optimal_value: f,
        iterations,
        converged,
    }
}
