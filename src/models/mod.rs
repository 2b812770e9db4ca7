//! Reference models
//!
//! [sir::Sir] is the Euler-multinomial SIR model with binomial case reports; [death::PureDeath] is a pure death
//! process whose likelihood is also available exactly, for validating the filter.

use statrs::distribution::{Binomial, Discrete};

use crate::error::{PompError, PompResult};

pub mod death;
pub mod sir;

/// Converts an observed or simulated count to an integer, rejecting negative or fractional values
pub(crate) fn count(value: f64, what: &str) -> PompResult<u64> {
    if !(value >= 0.0) || !value.is_finite() || value.fract() != 0.0 {
        return Err(PompError::domain(format!(
            "{} must be a non-negative integer, got {}",
            what, value
        )));
    }
    Ok(value as u64)
}

/// Binomial probability mass of `k` successes out of `n` trials, optionally on the log scale
pub(crate) fn dbinom(k: u64, n: u64, p: f64, log: bool) -> PompResult<f64> {
    let dist = Binomial::new(p, n)
        .map_err(|e| PompError::domain(format!("binomial(n = {}, p = {}): {}", n, p, e)))?;
    Ok(if log { dist.ln_pmf(k) } else { dist.pmf(k) })
}
