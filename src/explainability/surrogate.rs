//! Weighted ridge surrogate and token selection

use crate::config::FeatureSelection;
use crate::error::{Result, SpamLensError};
use ndarray::{Array1, Array2};

/// Token count at or below which `Auto` selection uses forward selection
pub const FORWARD_SELECTION_LIMIT: usize = 6;

/// Fitted weighted linear model over a subset of columns
#[derive(Debug, Clone)]
pub struct SurrogateFit {
    pub intercept: f64,
    /// One coefficient per selected column, in selection order
    pub coefficients: Vec<f64>,
    /// Weighted R² of the fit on the training samples
    pub score: f64,
}

/// Weighted ridge regression with an unpenalized intercept
#[derive(Debug, Clone)]
pub struct WeightedRidge {
    alpha: f64,
}

impl WeightedRidge {
    pub fn new(alpha: f64) -> Self {
        Self { alpha: alpha.max(0.0) }
    }

    /// Fit `y ~ z[:, columns]` with per-row weights `w`
    pub fn fit(
        &self,
        z: &Array2<f64>,
        y: &Array1<f64>,
        w: &Array1<f64>,
        columns: &[usize],
    ) -> Result<SurrogateFit> {
        let n_samples = z.nrows();
        if n_samples == 0 || y.len() != n_samples || w.len() != n_samples {
            return Err(SpamLensError::NumericalError(format!(
                "Surrogate inputs disagree: {} rows, {} targets, {} weights",
                n_samples,
                y.len(),
                w.len()
            )));
        }

        let weight_sum: f64 = w.sum();
        if !(weight_sum.is_finite() && weight_sum > 0.0) {
            return Err(SpamLensError::NumericalError(
                "Sample weights sum to zero".to_string(),
            ));
        }

        // Design columns: selected tokens, then the intercept
        let p = columns.len();
        let dim = p + 1;
        let mut ata = Array2::<f64>::zeros((dim, dim));
        let mut atb = Array1::<f64>::zeros(dim);
        let mut row = vec![0.0; dim];

        for i in 0..n_samples {
            for (k, &col) in columns.iter().enumerate() {
                row[k] = z[[i, col]];
            }
            row[p] = 1.0;

            let wi = w[i];
            for a in 0..dim {
                let wa = wi * row[a];
                if wa == 0.0 {
                    continue;
                }
                atb[a] += wa * y[i];
                for b in 0..=a {
                    ata[[a, b]] += wa * row[b];
                }
            }
        }
        for a in 0..dim {
            for b in 0..a {
                ata[[b, a]] = ata[[a, b]];
            }
        }
        for k in 0..p {
            ata[[k, k]] += self.alpha;
        }

        let beta = cholesky_solve(&ata, &atb).ok_or_else(|| {
            SpamLensError::NumericalError("Surrogate normal equations are singular".to_string())
        })?;
        if beta.iter().any(|v| !v.is_finite()) {
            return Err(SpamLensError::NumericalError(
                "Surrogate coefficients are not finite".to_string(),
            ));
        }

        let coefficients = beta.iter().take(p).copied().collect::<Vec<_>>();
        let intercept = beta[p];

        let y_mean = y.iter().zip(w.iter()).map(|(yi, wi)| yi * wi).sum::<f64>() / weight_sum;
        let mut ss_res = 0.0;
        let mut ss_tot = 0.0;
        for i in 0..n_samples {
            let mut pred = intercept;
            for (k, &col) in columns.iter().enumerate() {
                pred += coefficients[k] * z[[i, col]];
            }
            ss_res += w[i] * (y[i] - pred).powi(2);
            ss_tot += w[i] * (y[i] - y_mean).powi(2);
        }
        let score = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 };

        Ok(SurrogateFit {
            intercept,
            coefficients,
            score,
        })
    }

    /// Choose up to `k` columns of `z` with the given heuristic
    ///
    /// Returned indices are in selection order and contain no duplicates.
    pub fn select(
        &self,
        z: &Array2<f64>,
        y: &Array1<f64>,
        w: &Array1<f64>,
        k: usize,
        mode: FeatureSelection,
    ) -> Result<Vec<usize>> {
        let d = z.ncols();
        if k >= d {
            return Ok((0..d).collect());
        }

        let mode = match mode {
            FeatureSelection::Auto if k <= FORWARD_SELECTION_LIMIT => FeatureSelection::Forward,
            FeatureSelection::Auto => FeatureSelection::HighestWeights,
            other => other,
        };

        match mode {
            FeatureSelection::None | FeatureSelection::Auto => Ok((0..d).collect()),
            FeatureSelection::HighestWeights => {
                let all: Vec<usize> = (0..d).collect();
                let fit = self.fit(z, y, w, &all)?;
                let mut ranked: Vec<usize> = all;
                ranked.sort_by(|&a, &b| {
                    fit.coefficients[b]
                        .abs()
                        .partial_cmp(&fit.coefficients[a].abs())
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then(a.cmp(&b))
                });
                ranked.truncate(k);
                Ok(ranked)
            }
            FeatureSelection::Forward => {
                let mut selected: Vec<usize> = Vec::with_capacity(k);
                for _ in 0..k {
                    let mut best: Option<(usize, f64)> = None;
                    for candidate in 0..d {
                        if selected.contains(&candidate) {
                            continue;
                        }
                        let mut columns = selected.clone();
                        columns.push(candidate);
                        let score = self.fit(z, y, w, &columns)?.score;
                        let better = match best {
                            Some((_, best_score)) => score > best_score,
                            None => true,
                        };
                        if better {
                            best = Some((candidate, score));
                        }
                    }
                    match best {
                        Some((candidate, _)) => selected.push(candidate),
                        None => break,
                    }
                }
                Ok(selected)
            }
        }
    }
}

/// Proximity kernel on the masked fraction of tokens
pub fn kernel_weight(masked_fraction: f64, kernel_width: f64) -> f64 {
    (-(masked_fraction * masked_fraction) / (kernel_width * kernel_width)).exp()
}

/// Solve `A x = b` for symmetric positive definite `A`
///
/// A matrix that is not positive definite gets a small diagonal ridge and one
/// more attempt.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n != b.len() {
        return None;
    }

    if let Some(x) = cholesky_solve_inner(a, b) {
        return Some(x);
    }

    let ridge = 1e-8 * a.diag().iter().map(|v| v.abs()).sum::<f64>() / n as f64;
    if ridge <= 0.0 {
        return None;
    }
    let mut a_reg = a.clone();
    for k in 0..n {
        a_reg[[k, k]] += ridge;
    }
    cholesky_solve_inner(&a_reg, b)
}

fn cholesky_solve_inner(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();

    // A = L * L^T
    let mut l = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[i, k]] * l[[j, k]];
            }
            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 0.0 || !diag.is_finite() {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    // L * y = b
    let mut y = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut sum = 0.0;
        for j in 0..i {
            sum += l[[i, j]] * y[j];
        }
        y[i] = (b[i] - sum) / l[[i, i]];
    }

    // L^T * x = y
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = 0.0;
        for j in (i + 1)..n {
            sum += l[[j, i]] * x[j];
        }
        x[i] = (y[i] - sum) / l[[i, i]];
    }

    Some(x)
}
