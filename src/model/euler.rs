//! Helpers for Euler-discretized continuous-time models

use rand::Rng;
use rand_distr::{Binomial, Distribution};

use crate::error::{PompError, PompResult};

/// Relative slack before an interval is split into one more sub-step
const STEP_TOLERANCE: f64 = 1e-9;

/// Sub-step sizes covering `[t_start, t_end]` with nominal step `dt`
///
/// The interval is split into `ceil((t_end - t_start) / dt)` equal steps, so no step exceeds `dt`.
/// An empty interval yields no steps.
pub fn euler_steps(t_start: f64, t_end: f64, dt: f64) -> PompResult<Vec<f64>> {
    if !(dt > 0.0) || !dt.is_finite() {
        return Err(PompError::domain(format!(
            "Euler step size must be positive and finite, got {}",
            dt
        )));
    }
    let span = t_end - t_start;
    if span < 0.0 || !span.is_finite() {
        return Err(PompError::domain(format!(
            "cannot step backwards from {} to {}",
            t_start, t_end
        )));
    }
    if span == 0.0 {
        return Ok(Vec::new());
    }
    let n = ((span / dt) - STEP_TOLERANCE).ceil().max(1.0) as usize;
    Ok(vec![span / n as f64; n])
}

/// Euler-multinomial draw of the number of individuals leaving a compartment of size `n`
///
/// Each individual leaves during `dt` with probability `1 - exp(-sum(rates) * dt)` and, if it leaves,
/// takes exit `k` with probability `rates[k] / sum(rates)`. Returns the count along each exit.
pub fn reulermultinom<R: Rng + ?Sized>(
    n: f64,
    rates: &[f64],
    dt: f64,
    rng: &mut R,
) -> PompResult<Vec<f64>> {
    if !(n >= 0.0) || !n.is_finite() || n.fract() != 0.0 {
        return Err(PompError::domain(format!(
            "Euler-multinomial population must be a non-negative integer, got {}",
            n
        )));
    }
    if let Some(rate) = rates.iter().find(|r| !(**r >= 0.0) || !r.is_finite()) {
        return Err(PompError::domain(format!(
            "Euler-multinomial rates must be non-negative and finite, got {}",
            rate
        )));
    }
    if !(dt >= 0.0) {
        return Err(PompError::domain(format!(
            "Euler-multinomial time step must be non-negative, got {}",
            dt
        )));
    }

    let mut counts = vec![0.0; rates.len()];
    let total_rate: f64 = rates.iter().sum();
    if n == 0.0 || total_rate == 0.0 || dt == 0.0 {
        return Ok(counts);
    }

    let p_leave = -(-total_rate * dt).exp_m1();
    let mut remaining = binomial(n as u64, p_leave, rng)?;
    // Exits with zero rate never receive anyone, whatever the rounding in `remaining_rate`
    let last_open = rates.iter().rposition(|r| *r > 0.0).unwrap_or(0);
    let mut remaining_rate = total_rate;
    for (k, rate) in rates.iter().enumerate() {
        if remaining == 0 {
            break;
        }
        if *rate == 0.0 {
            continue;
        }
        if k == last_open || remaining_rate <= 0.0 {
            counts[k] = remaining as f64;
            remaining = 0;
            continue;
        }
        let p = (rate / remaining_rate).clamp(0.0, 1.0);
        let drawn = binomial(remaining, p, rng)?;
        counts[k] = drawn as f64;
        remaining -= drawn;
        remaining_rate -= rate;
    }
    Ok(counts)
}

/// Binomial draw that reports invalid arguments as domain violations
pub fn binomial<R: Rng + ?Sized>(n: u64, p: f64, rng: &mut R) -> PompResult<u64> {
    let dist = Binomial::new(n, p).map_err(|e| {
        PompError::domain(format!("binomial(n = {}, p = {}): {}", n, p, e))
    })?;
    Ok(dist.sample(rng))
}
