use rand::Rng;

use crate::error::{PompError, PompResult};
use crate::fetch_params;
use crate::model::euler::{binomial, euler_steps, reulermultinom};
use crate::model::{Model, ModelSpec, Observation};
use crate::models::{count, dbinom};
use crate::structs::parameters::ParameterVector;
use crate::structs::swarm::State;

/// Euler-multinomial SIR model with binomially reported incidence
///
/// States `S, I, R, H`, where `H` accumulates recoveries over each reporting interval. Parameters:
///
/// - `Beta`: transmission rate
/// - `mu_IR`: recovery rate
/// - `rho`: reporting probability
/// - `eta`: initial susceptible fraction
/// - `N`: population size
///
/// The process starts with one infective and `round(eta * N)` susceptibles. Reports are `Binomial(H, rho)`.
#[derive(Debug, Clone)]
pub struct Sir {
    spec: ModelSpec,
    dt: f64,
}

impl Sir {
    /// The model with Euler step `dt`
    pub fn new(dt: f64) -> PompResult<Self> {
        if !(dt > 0.0) || !dt.is_finite() {
            return Err(PompError::domain(format!("Euler step size must be positive, got {}", dt)));
        }
        let spec = ModelSpec::new(
            &["S", "I", "R", "H"],
            &["Beta", "mu_IR", "rho", "eta", "N"],
            &["reports"],
        )
        .with_accumulators(&["H"])?;
        Ok(Self { spec, dt })
    }

    /// Weekly reports with daily Euler steps
    pub fn weekly() -> PompResult<Self> {
        Self::new(1.0 / 7.0)
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }
}

impl Model for Sir {
    fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    fn initialize<R: Rng + ?Sized>(
        &self,
        params: &ParameterVector,
        _t0: f64,
        _rng: &mut R,
    ) -> PompResult<State> {
        fetch_params!(params, _beta, _mu_ir, _rho, eta, n);
        if !(0.0..=1.0).contains(&eta) {
            return Err(PompError::domain(format!("eta must lie in [0, 1], got {}", eta)));
        }
        let n = n.round();
        if !(n >= 1.0) || !n.is_finite() {
            return Err(PompError::domain(format!("population size must be at least 1, got {}", n)));
        }
        let s = (eta * n).round().min(n - 1.0);
        let i = 1.0;
        let r = n - s - i;
        Ok(vec![s, i, r, 0.0])
    }

    fn propagate<R: Rng + ?Sized>(
        &self,
        state: &mut State,
        params: &ParameterVector,
        t_start: f64,
        t_end: f64,
        rng: &mut R,
    ) -> PompResult<()> {
        fetch_params!(params, beta, mu_ir, _rho, _eta, n);
        for dt in euler_steps(t_start, t_end, self.dt)? {
            let infection = reulermultinom(state[0], &[beta * state[1] / n], dt, rng)?[0];
            let recovery = reulermultinom(state[1], &[mu_ir], dt, rng)?[0];
            state[0] -= infection;
            state[1] += infection - recovery;
            state[2] += recovery;
            state[3] += recovery;
        }
        Ok(())
    }

    fn measurement_density(
        &self,
        observation: &Observation,
        state: &State,
        params: &ParameterVector,
        log: bool,
    ) -> PompResult<f64> {
        fetch_params!(params, _beta, _mu_ir, rho);
        let reports = count(observation.values[0], "reports")?;
        dbinom(reports, count(state[3], "H")?, rho, log)
    }

    fn measurement_sample<R: Rng + ?Sized>(
        &self,
        state: &State,
        params: &ParameterVector,
        _time: f64,
        rng: &mut R,
    ) -> PompResult<Vec<f64>> {
        fetch_params!(params, _beta, _mu_ir, rho);
        Ok(vec![binomial(count(state[3], "H")?, rho, rng)? as f64])
    }
}
