use rand::Rng;

use crate::error::{PompError, PompResult};
use crate::fetch_params;
use crate::model::euler::binomial;
use crate::model::{Model, ModelSpec, Observation, Observations};
use crate::models::{count, dbinom};
use crate::structs::parameters::ParameterVector;
use crate::structs::swarm::State;

/// Pure death process with binomially observed survivors
///
/// A single state `N`, the number of survivors, starts at `N0`. Over an interval of length `dt` every survivor dies
/// independently with probability `1 - exp(-mu * dt)`. Each observation reports `Binomial(N, rho)` survivors.
///
/// The hidden state is finite, so [PureDeath::exact_loglik] computes the likelihood exactly with the forward
/// algorithm.
#[derive(Debug, Clone)]
pub struct PureDeath {
    spec: ModelSpec,
}

impl PureDeath {
    pub fn new() -> Self {
        Self {
            spec: ModelSpec::new(&["N"], &["mu", "rho", "N0"], &["survivors"]),
        }
    }

    fn survival(mu: f64, dt: f64) -> PompResult<f64> {
        if !(mu >= 0.0) || !mu.is_finite() {
            return Err(PompError::domain(format!("death rate must be non-negative, got {}", mu)));
        }
        Ok((-mu * dt).exp())
    }

    /// Exact log-likelihood of `observations` at `params`
    pub fn exact_loglik(&self, params: &ParameterVector, observations: &Observations) -> PompResult<f64> {
        self.spec.check_parameters(params)?;
        fetch_params!(params, mu, rho, n0);
        let n0 = count(n0, "N0")? as usize;

        // Filtered distribution of N, normalized after every observation
        let mut alpha = vec![0.0; n0 + 1];
        alpha[n0] = 1.0;
        let mut time = observations.t0();
        let mut loglik = 0.0;

        for observation in observations.records() {
            let survival = Self::survival(mu, observation.time - time)?;
            let mut predicted = vec![0.0; n0 + 1];
            for (n, &mass) in alpha.iter().enumerate() {
                if mass == 0.0 {
                    continue;
                }
                for (m, p) in predicted.iter_mut().enumerate().take(n + 1) {
                    *p += mass * dbinom(m as u64, n as u64, survival, false)?;
                }
            }

            let reported = count(observation.values[0], "survivors")?;
            for (m, p) in predicted.iter_mut().enumerate() {
                *p *= dbinom(reported, m as u64, rho, false)?;
            }
            let total: f64 = predicted.iter().sum();
            if total == 0.0 {
                return Ok(f64::NEG_INFINITY);
            }
            loglik += total.ln();
            alpha = predicted.into_iter().map(|p| p / total).collect();
            time = observation.time;
        }
        Ok(loglik)
    }
}

impl Default for PureDeath {
    fn default() -> Self {
        Self::new()
    }
}

impl Model for PureDeath {
    fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    fn initialize<R: Rng + ?Sized>(
        &self,
        params: &ParameterVector,
        _t0: f64,
        _rng: &mut R,
    ) -> PompResult<State> {
        fetch_params!(params, _mu, _rho, n0);
        Ok(vec![count(n0, "N0")? as f64])
    }

    fn propagate<R: Rng + ?Sized>(
        &self,
        state: &mut State,
        params: &ParameterVector,
        t_start: f64,
        t_end: f64,
        rng: &mut R,
    ) -> PompResult<()> {
        fetch_params!(params, mu);
        let survival = Self::survival(mu, t_end - t_start)?;
        state[0] = binomial(count(state[0], "N")?, survival, rng)? as f64;
        Ok(())
    }

    fn measurement_density(
        &self,
        observation: &Observation,
        state: &State,
        params: &ParameterVector,
        log: bool,
    ) -> PompResult<f64> {
        fetch_params!(params, _mu, rho);
        let reported = count(observation.values[0], "survivors")?;
        dbinom(reported, count(state[0], "N")?, rho, log)
    }

    fn measurement_sample<R: Rng + ?Sized>(
        &self,
        state: &State,
        params: &ParameterVector,
        _time: f64,
        rng: &mut R,
    ) -> PompResult<Vec<f64>> {
        fetch_params!(params, _mu, rho);
        Ok(vec![binomial(count(state[0], "N")?, rho, rng)? as f64])
    }
}
