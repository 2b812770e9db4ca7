//! Mathematical utility functions for numerical stability
//!
//! Log-likelihood estimates are combined on the log scale throughout; nothing here exponentiates
//! an unshifted log-likelihood.

use serde_derive::{Deserialize, Serialize};

/// Compute the log-sum-exp of a slice of values in a numerically stable way.
///
/// `logsumexp(x) = max(x) + log(sum(exp(x_i - max(x))))`
///
/// Returns `f64::NEG_INFINITY` for an empty slice or when all values are `-inf`.
#[inline]
pub fn logsumexp(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NEG_INFINITY;
    }

    let max_val = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    if max_val.is_infinite() {
        // All values are -inf, or at least one is +inf
        max_val
    } else {
        max_val
            + values
                .iter()
                .map(|&x| (x - max_val).exp())
                .sum::<f64>()
                .ln()
    }
}

/// Log of the arithmetic mean of `exp(values)`, computed with the max-shift
///
/// This is the unbiased-on-the-natural-scale way of averaging independent likelihood estimates.
#[inline]
pub fn logmeanexp(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NEG_INFINITY;
    }
    let max_val = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max_val.is_infinite() {
        return max_val;
    }
    let mean = values.iter().map(|&x| (x - max_val).exp()).sum::<f64>() / values.len() as f64;
    max_val + mean.ln()
}

/// A combined log-likelihood estimate with its Monte Carlo standard error
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogMeanExp {
    pub estimate: f64,
    /// Jackknife standard error; NaN when fewer than two values were combined
    pub se: f64,
}

/// [logmeanexp] with a jackknife standard error
///
/// With `n` values and leave-one-out estimates `j_k = logmeanexp(values without k)`, the standard error is
///
/// `se = sqrt((n - 1) / n * sum_k (j_k - mean(j))^2)`
///
/// which equals `(n - 1) * sd(j) / sqrt(n)` with `sd` the sample standard deviation. Identical inputs give
/// exactly zero.
pub fn logmeanexp_se(values: &[f64]) -> LogMeanExp {
    let estimate = logmeanexp(values);
    let n = values.len();
    if n < 2 {
        return LogMeanExp {
            estimate,
            se: f64::NAN,
        };
    }

    let mut leave_one_out = Vec::with_capacity(n);
    let mut rest = Vec::with_capacity(n - 1);
    for k in 0..n {
        rest.clear();
        rest.extend(values[..k].iter().chain(&values[k + 1..]));
        leave_one_out.push(logmeanexp(&rest));
    }

    // Centered on the first value, so equal leave-one-out estimates give exactly zero deviations
    let nf = n as f64;
    let pivot = leave_one_out[0];
    let mean = pivot + leave_one_out.iter().map(|j| j - pivot).sum::<f64>() / nf;
    let ss: f64 = leave_one_out.iter().map(|j| (j - mean).powi(2)).sum();
    LogMeanExp {
        estimate,
        se: ((nf - 1.0) / nf * ss).sqrt(),
    }
}

/// Effective sample size `1 / sum(w_i^2)` of normalized weights
#[inline]
pub fn effective_sample_size(normalized: &[f64]) -> f64 {
    1.0 / normalized.iter().map(|w| w * w).sum::<f64>()
}

/// Arithmetic mean; NaN for an empty slice
pub fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (denominator `n - 1`); NaN for fewer than two values
pub fn sample_sd(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    (values.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (n as f64 - 1.0)).sqrt()
}
