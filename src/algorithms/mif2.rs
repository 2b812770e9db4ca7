//! Iterated filtering (IF2)
//!
//! Each iteration runs one particle filter in which every particle carries its own parameter vector. Before
//! each propagation the parameters receive a Gaussian random-walk step on the estimation scale, with a
//! magnitude that shrinks with the [CoolingSchedule]. Resampling carries the parameters along with the
//! states, so perturbations that explain the data survive. The point estimate after an iteration is the
//! mean of the resampled parameter swarm on the estimation scale.
//!
//! The in-pass log-likelihoods recorded in the traces are computed under perturbation and overestimate the
//! likelihood of the final estimate; evaluate it separately with
//! [replicate_pfilter](crate::algorithms::replicate::replicate_pfilter).

use rand_distr::{Distribution, StandardNormal};
use serde_derive::Serialize;

use crate::algorithms::pfilter::{ParticleFilter, Perturb};
use crate::error::{PompError, PompResult};
use crate::model::Model;
use crate::routines::cooling::CoolingSchedule;
use crate::routines::rng::PompRng;
use crate::structs::parameters::{ParameterTransforms, ParameterVector};
use crate::structs::swarm::Swarm;

/// Random-walk standard deviations on the estimation scale, one per parameter
///
/// Parameters flagged as initial-value parameters are perturbed only before the first observation.
#[derive(Debug, Clone, PartialEq)]
pub struct RandomWalk {
    sd: Vec<f64>,
    ivp: Vec<bool>,
}

impl RandomWalk {
    /// No perturbation for any parameter of `layout`
    pub fn none(layout: &ParameterVector) -> Self {
        Self {
            sd: vec![0.0; layout.len()],
            ivp: vec![false; layout.len()],
        }
    }

    /// Sets the standard deviations by name: `(name, sd, is_initial_value_parameter)`
    pub fn from_names(layout: &ParameterVector, entries: &[(&str, f64, bool)]) -> PompResult<Self> {
        let mut rw = Self::none(layout);
        for (name, sd, ivp) in entries {
            let index = layout
                .index_of(name)
                .ok_or_else(|| PompError::domain(format!("unknown parameter '{}'", name)))?;
            rw.set(index, *sd, *ivp)?;
        }
        Ok(rw)
    }

    pub fn new(sd: Vec<f64>, ivp: Vec<bool>) -> PompResult<Self> {
        if sd.len() != ivp.len() {
            return Err(PompError::DimensionMismatch {
                what: "initial-value flags",
                expected: sd.len(),
                found: ivp.len(),
            });
        }
        let mut rw = Self {
            sd: vec![0.0; sd.len()],
            ivp: vec![false; sd.len()],
        };
        for (i, (s, flag)) in sd.into_iter().zip(ivp).enumerate() {
            rw.set(i, s, flag)?;
        }
        Ok(rw)
    }

    fn set(&mut self, index: usize, sd: f64, ivp: bool) -> PompResult<()> {
        if !(sd >= 0.0) || !sd.is_finite() {
            return Err(PompError::domain(format!(
                "random-walk standard deviations must be non-negative and finite, got {}",
                sd
            )));
        }
        self.sd[index] = sd;
        self.ivp[index] = ivp;
        Ok(())
    }

    pub fn sd(&self) -> &[f64] {
        &self.sd
    }

    pub fn ivp(&self) -> &[bool] {
        &self.ivp
    }

    pub fn len(&self) -> usize {
        self.sd.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sd.is_empty()
    }

    /// Standard deviation of parameter `index` at observation `step`, before cooling
    fn sd_at(&self, index: usize, step: usize) -> f64 {
        if self.ivp[index] && step > 0 {
            0.0
        } else {
            self.sd[index]
        }
    }
}

/// The perturbation applied during one IF2 iteration
struct CooledRandomWalk<'a> {
    iteration: usize,
    n_steps: usize,
    cooling: &'a CoolingSchedule,
    rw: &'a RandomWalk,
    transforms: &'a ParameterTransforms,
}

impl Perturb for CooledRandomWalk<'_> {
    fn perturb(
        &self,
        step: usize,
        params: &mut ParameterVector,
        rng: &mut PompRng,
    ) -> PompResult<()> {
        let factor = self.cooling.factor(self.iteration, step, self.n_steps);
        for index in 0..params.len() {
            let sd = self.rw.sd_at(index, step) * factor;
            if sd == 0.0 {
                continue;
            }
            let transform = self.transforms.get(index);
            let encoded = transform.encode(params[index]).map_err(|_| {
                PompError::domain(format!(
                    "parameter '{}' = {} is outside the support of its {:?} transform",
                    params.names()[index],
                    params[index],
                    transform
                ))
            })?;
            let z: f64 = StandardNormal.sample(rng);
            params.values_mut()[index] = transform.decode(encoded + sd * z);
        }
        Ok(())
    }
}

/// One row of the IF2 trace
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceRow {
    /// `0` for the starting point
    pub iteration: usize,
    /// In-pass log-likelihood of the iteration; NaN for the starting point
    pub loglik: f64,
    /// Random-walk magnitude factor at the start of the iteration; NaN for the starting point
    pub cooling: f64,
    #[serde(skip)]
    pub params: ParameterVector,
}

/// Iterated filtering configuration for one model and dataset
#[derive(Debug, Clone)]
pub struct Mif2<'a, M: Model> {
    filter: ParticleFilter<'a, M>,
    iterations: usize,
    cooling: CoolingSchedule,
    rw: RandomWalk,
    transforms: ParameterTransforms,
}

impl<'a, M: Model> Mif2<'a, M> {
    pub fn new(
        filter: ParticleFilter<'a, M>,
        iterations: usize,
        cooling: CoolingSchedule,
        rw: RandomWalk,
        transforms: ParameterTransforms,
    ) -> PompResult<Self> {
        let n_params = filter.model().spec().parameters().len();
        if rw.len() != n_params {
            return Err(PompError::DimensionMismatch {
                what: "random-walk standard deviations",
                expected: n_params,
                found: rw.len(),
            });
        }
        if transforms.len() != n_params {
            return Err(PompError::DimensionMismatch {
                what: "parameter transforms",
                expected: n_params,
                found: transforms.len(),
            });
        }
        Ok(Self {
            filter,
            iterations,
            cooling,
            rw,
            transforms,
        })
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn filter(&self) -> &ParticleFilter<'a, M> {
        &self.filter
    }

    pub fn transforms(&self) -> &ParameterTransforms {
        &self.transforms
    }

    pub fn cooling(&self) -> &CoolingSchedule {
        &self.cooling
    }

    /// Runs the configured number of iterations from `start`
    ///
    /// Fails immediately if `start` lies outside the support of its transforms.
    pub fn run(&self, start: &ParameterVector, rng: &mut PompRng) -> PompResult<Mif2Output> {
        self.filter.model().spec().check_parameters(start)?;
        self.transforms.encode(start)?;

        let swarm_params = vec![start.clone(); self.filter.particles()];
        let traces = vec![TraceRow {
            iteration: 0,
            loglik: f64::NAN,
            cooling: f64::NAN,
            params: start.clone(),
        }];
        self.iterate(swarm_params, start.clone(), traces, 0, rng)
    }

    /// Runs the configured number of further iterations, continuing the cooling schedule of `previous`
    pub fn continue_from(&self, previous: Mif2Output, rng: &mut PompRng) -> PompResult<Mif2Output> {
        let completed = previous.iterations();
        let Mif2Output {
            estimate,
            swarm,
            traces,
            ..
        } = previous;
        if swarm.len() != self.filter.particles() {
            return Err(PompError::DimensionMismatch {
                what: "parameter swarm",
                expected: self.filter.particles(),
                found: swarm.len(),
            });
        }
        self.iterate(swarm, estimate, traces, completed, rng)
    }

    fn iterate(
        &self,
        mut swarm_params: Vec<ParameterVector>,
        mut estimate: ParameterVector,
        mut traces: Vec<TraceRow>,
        completed: usize,
        rng: &mut PompRng,
    ) -> PompResult<Mif2Output> {
        let n_steps = self.filter.observations().len();
        let mut loglik = f64::NAN;

        for iteration in completed..completed + self.iterations {
            let span = tracing::info_span!("IF2", iteration = iteration + 1);
            let _enter = span.enter();

            let perturbation = CooledRandomWalk {
                iteration,
                n_steps,
                cooling: &self.cooling,
                rw: &self.rw,
                transforms: &self.transforms,
            };
            let swarm = Swarm::uninitialized(self.filter.observations().t0(), swarm_params)?;
            let output = self.filter.pass(swarm, &perturbation, rng)?;

            swarm_params = output.swarm().params();
            estimate = self.transforms.mean(&swarm_params)?;
            loglik = output.loglik();

            tracing::info!(
                "In-pass log-likelihood {:.4}, cooling factor {:.4}",
                loglik,
                self.cooling.magnitude(iteration)
            );
            tracing::debug!("Estimate: {}", estimate);

            traces.push(TraceRow {
                iteration: iteration + 1,
                loglik,
                cooling: self.cooling.magnitude(iteration),
                params: estimate.clone(),
            });
        }

        Ok(Mif2Output {
            estimate,
            loglik,
            swarm: swarm_params,
            traces,
        })
    }
}

/// The result of an IF2 run
#[derive(Debug, Clone)]
pub struct Mif2Output {
    estimate: ParameterVector,
    loglik: f64,
    swarm: Vec<ParameterVector>,
    traces: Vec<TraceRow>,
}

impl Mif2Output {
    /// The point estimate after the last iteration
    pub fn estimate(&self) -> &ParameterVector {
        &self.estimate
    }

    /// In-pass log-likelihood of the last iteration, biased upwards by the perturbations
    pub fn loglik(&self) -> f64 {
        self.loglik
    }

    /// The parameter swarm after the last iteration
    pub fn swarm(&self) -> &[ParameterVector] {
        &self.swarm
    }

    /// One row for the starting point, then one per iteration
    pub fn traces(&self) -> &[TraceRow] {
        &self.traces
    }

    /// Number of completed iterations
    pub fn iterations(&self) -> usize {
        self.traces.last().map(|r| r.iteration).unwrap_or(0)
    }
}
