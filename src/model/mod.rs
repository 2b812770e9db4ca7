//! The model interface consumed by the filtering routines
//!
//! A model is any type implementing [Model]: an initializer, a stochastic one-interval propagator, a measurement
//! density and a measurement sampler, together with the [ModelSpec] naming its states, parameters, accumulators
//! and observables. The engine is generic over the implementer, so calls are statically dispatched.

use rand::Rng;

use crate::error::{PompError, PompResult};
use crate::structs::parameters::ParameterVector;
use crate::structs::swarm::State;

pub mod euler;

/// Names declared by a model
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSpec {
    states: Vec<String>,
    parameters: Vec<String>,
    accumulators: Vec<usize>,
    observables: Vec<String>,
}

impl ModelSpec {
    pub fn new<S: AsRef<str>>(states: &[S], parameters: &[S], observables: &[S]) -> Self {
        Self {
            states: states.iter().map(|s| s.as_ref().to_string()).collect(),
            parameters: parameters.iter().map(|s| s.as_ref().to_string()).collect(),
            accumulators: Vec::new(),
            observables: observables.iter().map(|s| s.as_ref().to_string()).collect(),
        }
    }

    /// Declares state variables that are zeroed at the start of every inter-observation interval
    pub fn with_accumulators<S: AsRef<str>>(mut self, accumulators: &[S]) -> PompResult<Self> {
        for name in accumulators {
            let index = self.state_index(name.as_ref()).ok_or_else(|| {
                PompError::domain(format!(
                    "accumulator '{}' is not a declared state variable",
                    name.as_ref()
                ))
            })?;
            if !self.accumulators.contains(&index) {
                self.accumulators.push(index);
            }
        }
        Ok(self)
    }

    pub fn states(&self) -> &[String] {
        &self.states
    }

    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    pub fn observables(&self) -> &[String] {
        &self.observables
    }

    /// Indices of the accumulator variables in the state vector
    pub fn accumulators(&self) -> &[usize] {
        &self.accumulators
    }

    pub fn accumulator_names(&self) -> Vec<&str> {
        self.accumulators
            .iter()
            .map(|&i| self.states[i].as_str())
            .collect()
    }

    pub fn state_index(&self, name: &str) -> Option<usize> {
        self.states.iter().position(|s| s == name)
    }

    pub fn parameter_index(&self, name: &str) -> Option<usize> {
        self.parameters.iter().position(|s| s == name)
    }

    /// Builds a [ParameterVector] in declaration order from name/value pairs given in any order
    pub fn parameter_vector(&self, pairs: &[(&str, f64)]) -> PompResult<ParameterVector> {
        let mut values = Vec::with_capacity(self.parameters.len());
        for name in &self.parameters {
            let value = pairs
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| *v)
                .ok_or_else(|| PompError::domain(format!("no value given for parameter '{}'", name)))?;
            values.push(value);
        }
        if pairs.len() != self.parameters.len() {
            let unknown: Vec<&str> = pairs
                .iter()
                .map(|(n, _)| *n)
                .filter(|n| self.parameter_index(n).is_none())
                .collect();
            return Err(PompError::domain(format!(
                "values given for undeclared parameters: {:?}",
                unknown
            )));
        }
        ParameterVector::new(self.parameters.clone(), values)
    }

    /// Checks that `params` follows the declared parameter order
    pub fn check_parameters(&self, params: &ParameterVector) -> PompResult<()> {
        if params.names() != self.parameters.as_slice() {
            return Err(PompError::domain(format!(
                "parameter layout {:?} does not match the model's declared parameters {:?}",
                params.names(),
                self.parameters
            )));
        }
        Ok(())
    }

    /// Zeroes the accumulator variables of `state`
    pub fn reset_accumulators(&self, state: &mut State) {
        for &i in &self.accumulators {
            state[i] = 0.0;
        }
    }
}

/// One measurement record
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub time: f64,
    pub values: Vec<f64>,
}

impl Observation {
    pub fn new(time: f64, values: Vec<f64>) -> Self {
        Self { time, values }
    }
}

/// A read-only sequence of observations with strictly increasing times, following the reference time `t0`
#[derive(Debug, Clone, PartialEq)]
pub struct Observations {
    t0: f64,
    records: Vec<Observation>,
}

impl Observations {
    pub fn new(t0: f64, records: Vec<Observation>) -> PompResult<Self> {
        if records.is_empty() {
            return Err(PompError::domain("the observation sequence is empty"));
        }
        let mut previous = t0;
        for (i, record) in records.iter().enumerate() {
            if !record.time.is_finite() || record.time < previous || (i > 0 && record.time == previous) {
                return Err(PompError::domain(format!(
                    "observation times must be increasing and not precede t0 = {}: record {} has time {}",
                    t0, i, record.time
                )));
            }
            previous = record.time;
        }
        Ok(Self { t0, records })
    }

    /// Univariate observations from `(time, value)` pairs
    pub fn from_pairs(t0: f64, pairs: &[(f64, f64)]) -> PompResult<Self> {
        let records = pairs
            .iter()
            .map(|&(time, value)| Observation::new(time, vec![value]))
            .collect();
        Self::new(t0, records)
    }

    pub fn t0(&self) -> f64 {
        self.t0
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Observation] {
        &self.records
    }

    pub fn times(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.time).collect()
    }

    /// Checks that every record has one value per declared observable
    pub fn check_dimension(&self, spec: &ModelSpec) -> PompResult<()> {
        let expected = spec.observables().len();
        match self.records.iter().find(|r| r.values.len() != expected) {
            Some(record) => Err(PompError::DimensionMismatch {
                what: "observation values",
                expected,
                found: record.values.len(),
            }),
            None => Ok(()),
        }
    }
}

/// The capabilities a partially observed Markov process model supplies
///
/// Implementations may draw random numbers only from the generator they are handed. Returning
/// [PompError::Domain] from any method marks a configuration error and stops the run.
pub trait Model: Sync + Send {
    fn spec(&self) -> &ModelSpec;

    /// Draws the state at time `t0`
    fn initialize<R: Rng + ?Sized>(
        &self,
        params: &ParameterVector,
        t0: f64,
        rng: &mut R,
    ) -> PompResult<State>;

    /// Advances `state` from `t_start` to `t_end`
    fn propagate<R: Rng + ?Sized>(
        &self,
        state: &mut State,
        params: &ParameterVector,
        t_start: f64,
        t_end: f64,
        rng: &mut R,
    ) -> PompResult<()>;

    /// Density (or mass) of `observation` given `state`, on the log scale when `log` is set
    fn measurement_density(
        &self,
        observation: &Observation,
        state: &State,
        params: &ParameterVector,
        log: bool,
    ) -> PompResult<f64>;

    /// Draws a synthetic observation at `time` given `state`
    fn measurement_sample<R: Rng + ?Sized>(
        &self,
        state: &State,
        params: &ParameterVector,
        time: f64,
        rng: &mut R,
    ) -> PompResult<Vec<f64>>;
}
