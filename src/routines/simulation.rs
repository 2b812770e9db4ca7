//! Forward simulation of a model
//!
//! Draws a latent trajectory and a synthetic observation at each requested time. The result can be fed straight
//! back to the filter, which is how the end-to-end checks validate it against known parameters.

use rand::Rng;

use crate::error::{PompError, PompResult};
use crate::model::{Model, Observation, Observations};
use crate::structs::parameters::ParameterVector;
use crate::structs::swarm::State;

/// One simulated realization
#[derive(Debug, Clone)]
pub struct Simulation {
    /// The latent state at each observation time, after propagation
    pub states: Vec<State>,
    pub observations: Observations,
}

/// Simulates `model` at `params` from `t0` through `times`
pub fn simulate<M: Model, R: Rng + ?Sized>(
    model: &M,
    params: &ParameterVector,
    t0: f64,
    times: &[f64],
    rng: &mut R,
) -> PompResult<Simulation> {
    let spec = model.spec();
    spec.check_parameters(params)?;
    if times.is_empty() {
        return Err(PompError::domain("no observation times to simulate"));
    }

    let mut state = model.initialize(params, t0, rng)?;
    if state.len() != spec.states().len() {
        return Err(PompError::DimensionMismatch {
            what: "initial state",
            expected: spec.states().len(),
            found: state.len(),
        });
    }

    let mut states = Vec::with_capacity(times.len());
    let mut records = Vec::with_capacity(times.len());
    let mut time = t0;
    for &t in times {
        if !(t >= time) {
            return Err(PompError::domain(format!(
                "simulation times must be increasing from t0 = {}, got {} after {}",
                t0, t, time
            )));
        }
        spec.reset_accumulators(&mut state);
        model.propagate(&mut state, params, time, t, rng)?;
        let values = model.measurement_sample(&state, params, t, rng)?;
        if values.len() != spec.observables().len() {
            return Err(PompError::DimensionMismatch {
                what: "simulated observation",
                expected: spec.observables().len(),
                found: values.len(),
            });
        }
        records.push(Observation::new(t, values));
        states.push(state.clone());
        time = t;
    }

    tracing::debug!("Simulated {} observations at {}", records.len(), params);
    Ok(Simulation {
        states,
        observations: Observations::new(t0, records)?,
    })
}
