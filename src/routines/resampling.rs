use crate::error::{PompError, PompResult};

/// Systematic resampling
///
/// Places `n` evenly spaced marks `(u + k) / n`, `k = 0..n`, on the cumulative distribution of `weights` and
/// returns, for each mark, the first index whose cumulative weight exceeds it. Index `i` is selected either
/// `floor(n * w_i)` or `ceil(n * w_i)` times, with the mark offset `u` drawn once from `[0, 1)`.
///
/// The weights need not be normalized, but must be non-negative, finite and not all zero.
pub fn systematic(weights: &[f64], n: usize, u: f64) -> PompResult<Vec<usize>> {
    if weights.is_empty() || n == 0 {
        return Err(PompError::domain("systematic resampling needs at least one weight and one draw"));
    }
    if !(0.0..1.0).contains(&u) {
        return Err(PompError::domain(format!(
            "resampling offset must lie in [0, 1), got {}",
            u
        )));
    }
    if let Some(w) = weights.iter().find(|w| !(**w >= 0.0) || !w.is_finite()) {
        return Err(PompError::domain(format!(
            "resampling weights must be non-negative and finite, got {}",
            w
        )));
    }
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return Err(PompError::domain("resampling weights sum to zero"));
    }

    // Rounding in the cumulative sum must never push a mark onto trailing zero weights
    let last = weights.iter().rposition(|w| *w > 0.0).unwrap_or(0);
    let mut indices = Vec::with_capacity(n);
    let mut j = 0;
    let mut cumulative = weights[0] / total;
    for k in 0..n {
        let mark = (u + k as f64) / n as f64;
        while cumulative <= mark && j < last {
            j += 1;
            cumulative += weights[j] / total;
        }
        indices.push(j);
    }
    Ok(indices)
}

/// How many times each source index appears in `indices`
pub fn counts(indices: &[usize], sources: usize) -> Vec<usize> {
    let mut counts = vec![0; sources];
    for &i in indices {
        counts[i] += 1;
    }
    counts
}
