//! Power-law locus fitting.
//!
//! Fits `y = a * x^b` to the (low attenuation, high attenuation) point cloud
//! with a two-parameter Levenberg-Marquardt solver. Material classes separate
//! by which side of the locus their points fall.

use serde::{Deserialize, Serialize};

use crate::data::filter::check_alignment;
use crate::data::model::{Band, EnergySeries, PositionRange};
use crate::error::{AnalysisError, AnalysisResult};

/// Damping beyond which the solver gives up on finding a downhill step.
const MAX_LAMBDA: f64 = 1e16;

/// Configuration for the Levenberg-Marquardt solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    /// Starting `(a, b)`.
    pub initial_guess: [f64; 2],
    /// Maximum iterations.
    pub max_iterations: usize,
    /// Relative parameter change treated as converged.
    pub tolerance: f64,
    /// Largest cosine between the residual vector and a Jacobian column
    /// treated as a stationary point.
    pub gradient_tolerance: f64,
    /// Initial damping parameter.
    pub initial_lambda: f64,
    /// Factor to increase lambda on failed step.
    pub lambda_up: f64,
    /// Factor to decrease lambda on successful step.
    pub lambda_down: f64,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            initial_guess: [2.0, 1.5],
            max_iterations: 200,
            tolerance: 1e-10,
            gradient_tolerance: 1e-8,
            initial_lambda: 1e-3,
            lambda_up: 10.0,
            lambda_down: 0.1,
        }
    }
}

/// A converged power-law fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocusFit {
    pub a: f64,
    pub b: f64,
    /// Parameter covariance, `(JᵀJ)⁻¹ · χ²/(n − 2)`. `None` (JSON `null`)
    /// when the data leave no degrees of freedom or `JᵀJ` is singular.
    pub covariance: Option<[[f64; 2]; 2]>,
    /// Sum of squared residuals at the solution.
    pub chi2: f64,
    pub iterations: usize,
    /// Number of points the fit used.
    pub points: usize,
}

impl LocusFit {
    pub fn evaluate(&self, x: f64) -> f64 {
        power_law(x, [self.a, self.b])
    }

    /// One-sigma uncertainties of `a` and `b`, when a covariance exists.
    pub fn std_errors(&self) -> Option<[f64; 2]> {
        self.covariance.map(|c| [c[0][0].sqrt(), c[1][1].sqrt()])
    }

    /// `n` evenly spaced points of the curve over `[0, x_max]`.
    pub fn sample(&self, x_max: f64, n: usize) -> Vec<[f64; 2]> {
        let step = if n > 1 { x_max / (n - 1) as f64 } else { 0.0 };
        (0..n)
            .map(|i| {
                let x = i as f64 * step;
                [x, self.evaluate(x)]
            })
            .collect()
    }
}

#[inline]
fn power_law(x: f64, p: [f64; 2]) -> f64 {
    p[0] * x.powf(p[1])
}

#[inline]
fn jacobian_row(x: f64, p: [f64; 2]) -> [f64; 2] {
    let xb = x.powf(p[1]);
    [xb, p[0] * xb * x.ln()]
}

fn compute_chi2(xs: &[f64], ys: &[f64], p: [f64; 2]) -> f64 {
    xs.iter()
        .zip(ys)
        .map(|(&x, &y)| {
            let r = y - power_law(x, p);
            r * r
        })
        .sum()
}

/// `JᵀJ` and `Jᵀr` at `p`.
fn normal_equations(xs: &[f64], ys: &[f64], p: [f64; 2]) -> ([[f64; 2]; 2], [f64; 2]) {
    let mut h = [[0.0f64; 2]; 2];
    let mut g = [0.0f64; 2];
    for (&x, &y) in xs.iter().zip(ys) {
        let j = jacobian_row(x, p);
        let r = y - power_law(x, p);
        g[0] += j[0] * r;
        g[1] += j[1] * r;
        h[0][0] += j[0] * j[0];
        h[0][1] += j[0] * j[1];
        h[1][1] += j[1] * j[1];
    }
    h[1][0] = h[0][1];
    (h, g)
}

fn invert_2x2(m: &[[f64; 2]; 2]) -> Option<[[f64; 2]; 2]> {
    let det = m[0][0] * m[1][1] - m[0][1] * m[1][0];
    let scale = (m[0][0] * m[1][1]).abs().max((m[0][1] * m[1][0]).abs());
    if !det.is_finite() || det.abs() <= f64::EPSILON * scale {
        return None;
    }
    Some([
        [m[1][1] / det, -m[0][1] / det],
        [-m[1][0] / det, m[0][0] / det],
    ])
}

fn solve_2x2(m: &[[f64; 2]; 2], rhs: &[f64; 2]) -> Option<[f64; 2]> {
    let inv = invert_2x2(m)?;
    Some([
        inv[0][0] * rhs[0] + inv[0][1] * rhs[1],
        inv[1][0] * rhs[0] + inv[1][1] * rhs[1],
    ])
}

/// Fit `y = a * x^b` by nonlinear least squares.
///
/// Non-finite points and points with `x <= 0` (where a fractional power is
/// undefined) are dropped with a warning. Needs at least two usable points
/// with distinct `x`; anything that fails to converge is an
/// [`AnalysisError::FitConvergence`].
pub fn fit_power_law(xs: &[f64], ys: &[f64], config: &FitConfig) -> AnalysisResult<LocusFit> {
    let (fx, fy): (Vec<f64>, Vec<f64>) = xs
        .iter()
        .zip(ys)
        .filter(|&(&x, &y)| x.is_finite() && y.is_finite() && x > 0.0)
        .map(|(&x, &y)| (x, y))
        .unzip();

    let dropped = xs.len().min(ys.len()) - fx.len();
    if dropped > 0 {
        log::warn!("Excluding {dropped} points with non-positive or non-finite values from the fit");
    }

    let n = fx.len();
    if n < 2 {
        return Err(AnalysisError::FitConvergence(format!(
            "{n} usable points, need at least 2"
        )));
    }
    let first = fx[0];
    if fx.iter().all(|&x| x == first) {
        return Err(AnalysisError::FitConvergence(
            "all points share the same x".into(),
        ));
    }

    let mut params = config.initial_guess;
    let mut chi2 = compute_chi2(&fx, &fy, params);
    if !chi2.is_finite() {
        return Err(AnalysisError::FitConvergence(
            "initial guess gives non-finite residuals".into(),
        ));
    }

    let exact = f64::EPSILON * f64::EPSILON * fy.iter().map(|y| y * y).sum::<f64>();
    let tol = config.tolerance;
    let mut lambda = config.initial_lambda;
    let mut converged = false;
    let mut iterations = 0;

    for iter in 0..config.max_iterations {
        iterations = iter + 1;

        if chi2 <= exact {
            converged = true;
            break;
        }

        let (hessian, gradient) = normal_equations(&fx, &fy, params);

        // Stationary when the residuals are orthogonal to every Jacobian column.
        let residual_norm = chi2.sqrt();
        let stationary = (0..2).all(|i| {
            let col_norm = hessian[i][i].sqrt();
            col_norm == 0.0
                || gradient[i].abs() <= config.gradient_tolerance * col_norm * residual_norm
        });
        if stationary {
            converged = true;
            break;
        }

        let mut damped = hessian;
        for (i, row) in damped.iter_mut().enumerate() {
            row[i] *= 1.0 + lambda;
        }

        let Some(delta) = solve_2x2(&damped, &gradient) else {
            lambda *= config.lambda_up;
            if lambda > MAX_LAMBDA {
                break;
            }
            continue;
        };

        let trial = [params[0] + delta[0], params[1] + delta[1]];
        let trial_chi2 = compute_chi2(&fx, &fy, trial);
        let small_step = delta
            .iter()
            .zip(params)
            .all(|(d, p)| d.abs() <= tol * (p.abs() + tol));

        if trial_chi2.is_finite() && trial_chi2 < chi2 {
            params = trial;
            chi2 = trial_chi2;
            lambda *= config.lambda_down;
            if small_step {
                converged = true;
                break;
            }
        } else {
            // No downhill step even at this resolution: already at the minimum.
            if small_step {
                converged = true;
                break;
            }
            lambda *= config.lambda_up;
            if lambda > MAX_LAMBDA {
                break;
            }
        }
    }

    if !converged || !params.iter().all(|p| p.is_finite()) {
        return Err(AnalysisError::FitConvergence(format!(
            "stopped after {iterations} iterations at a = {}, b = {} (chi2 = {chi2})",
            params[0], params[1]
        )));
    }

    let (hessian, _) = normal_equations(&fx, &fy, params);
    let covariance = match invert_2x2(&hessian) {
        Some(inv) if n > 2 => {
            let s2 = chi2 / (n - 2) as f64;
            Some([
                [inv[0][0] * s2, inv[0][1] * s2],
                [inv[1][0] * s2, inv[1][1] * s2],
            ])
        }
        _ => None,
    };

    log::info!("Power law: y = {:.3} * x^{:.3}", params[0], params[1]);
    log::debug!("fit used {n} points, {iterations} iterations, chi2 = {chi2:.3e}");

    Ok(LocusFit {
        a: params[0],
        b: params[1],
        covariance,
        chi2,
        iterations,
        points: n,
    })
}

/// Fit the locus to two attenuated, row-aligned series over `fit_range`.
///
/// The low band supplies `x`, the high band `y`.
pub fn fit_locus(
    high: &EnergySeries,
    low: &EnergySeries,
    fit_range: &PositionRange,
    config: &FitConfig,
) -> AnalysisResult<LocusFit> {
    check_alignment(high, low)?;
    let high_att = high
        .att
        .as_deref()
        .ok_or(AnalysisError::MissingAttenuation { band: Band::High })?;
    let low_att = low
        .att
        .as_deref()
        .ok_or(AnalysisError::MissingAttenuation { band: Band::Low })?;

    let (xs, ys): (Vec<f64>, Vec<f64>) = (0..low.len())
        .filter(|&i| fit_range.contains(low.x[i]) && fit_range.contains(high.x[i]))
        .map(|i| (low_att[i], high_att[i]))
        .unzip();

    if xs.is_empty() {
        return Err(AnalysisError::EmptyRegion {
            what: "fit",
            left: fit_range.left,
            right: fit_range.right,
        });
    }

    log::info!("Fitting power law");
    fit_power_law(&xs, &ys, config)
}
