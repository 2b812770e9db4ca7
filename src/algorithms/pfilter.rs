//! Sequential Monte Carlo (particle filter) likelihood estimation

use rand::Rng;
use rayon::prelude::*;

use crate::error::{PompError, PompResult};
use crate::model::{Model, Observation, Observations};
use crate::routines::math::effective_sample_size;
use crate::routines::resampling::systematic;
use crate::routines::rng::{particle_rng, PompRng};
use crate::structs::parameters::ParameterVector;
use crate::structs::swarm::{Particle, Swarm};

/// ESS, as a fraction of the swarm size, below which a step is reported as degenerate
const LOW_ESS_FRACTION: f64 = 0.01;

/// Per-particle parameter perturbation applied before each propagation
///
/// Step `0` is applied before the swarm is initialized, so perturbations made there reach the initial state.
pub trait Perturb: Sync {
    fn perturb(
        &self,
        step: usize,
        params: &mut ParameterVector,
        rng: &mut PompRng,
    ) -> PompResult<()>;
}

/// Leaves parameters untouched
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPerturbation;

impl Perturb for NoPerturbation {
    fn perturb(&self, _: usize, _: &mut ParameterVector, _: &mut PompRng) -> PompResult<()> {
        Ok(())
    }
}

/// Particle filter over a fixed model and observation sequence
#[derive(Debug)]
pub struct ParticleFilter<'a, M: Model> {
    model: &'a M,
    observations: &'a Observations,
    particles: usize,
    parallel: bool,
}

impl<'a, M: Model> Clone for ParticleFilter<'a, M> {
    fn clone(&self) -> Self {
        Self {
            model: self.model,
            observations: self.observations,
            particles: self.particles,
            parallel: self.parallel,
        }
    }
}

impl<'a, M: Model> ParticleFilter<'a, M> {
    pub fn new(model: &'a M, observations: &'a Observations, particles: usize) -> PompResult<Self> {
        if particles == 0 {
            return Err(PompError::domain("the number of particles must be at least 1"));
        }
        observations.check_dimension(model.spec())?;
        Ok(Self {
            model,
            observations,
            particles,
            parallel: true,
        })
    }

    /// Evaluate particles on the rayon thread pool (default) or sequentially; results are identical
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// The same filter with a different swarm size
    pub fn with_particles(&self, particles: usize) -> PompResult<Self> {
        Self::new(self.model, self.observations, particles).map(|f| f.parallel(self.parallel))
    }

    pub fn model(&self) -> &'a M {
        self.model
    }

    pub fn observations(&self) -> &'a Observations {
        self.observations
    }

    pub fn particles(&self) -> usize {
        self.particles
    }

    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    /// Filters the whole observation sequence at fixed parameters
    pub fn run(&self, params: &ParameterVector, rng: &mut PompRng) -> PompResult<PfilterOutput> {
        self.model.spec().check_parameters(params)?;
        let swarm = Swarm::uninitialized(self.observations.t0(), vec![params.clone(); self.particles])?;
        self.pass(swarm, &NoPerturbation, rng)
    }

    /// Continues filtering from a previously returned swarm
    ///
    /// Only the observations strictly after the swarm's time are assimilated.
    pub fn run_from(&self, swarm: Swarm, rng: &mut PompRng) -> PompResult<PfilterOutput> {
        if !swarm.is_initialized() {
            return self.pass(swarm, &NoPerturbation, rng);
        }
        if swarm.len() != self.particles {
            return Err(PompError::DimensionMismatch {
                what: "particle swarm",
                expected: self.particles,
                found: swarm.len(),
            });
        }
        self.pass(swarm, &NoPerturbation, rng)
    }

    /// One filtering pass, applying `perturbation` to every particle before each propagation
    pub(crate) fn pass<P: Perturb>(
        &self,
        mut swarm: Swarm,
        perturbation: &P,
        rng: &mut PompRng,
    ) -> PompResult<PfilterOutput> {
        let spec = self.model.spec();
        let start = swarm.time();
        let records: Vec<(usize, &Observation)> = self
            .observations
            .records()
            .iter()
            .enumerate()
            .filter(|(_, r)| if swarm.is_initialized() { r.time > start } else { r.time >= start })
            .collect();
        if records.is_empty() {
            return Err(PompError::domain(format!(
                "no observations after t = {} to filter",
                start
            )));
        }

        let np = swarm.len();
        let n_states = spec.states().len();
        let mut cond_loglik = Vec::with_capacity(records.len());
        let mut ess = Vec::with_capacity(records.len());
        let mut filter_mean = Vec::with_capacity(records.len());
        let mut times = Vec::with_capacity(records.len());

        for (local_step, &(step, observation)) in records.iter().enumerate() {
            let t_start = swarm.time();
            let t_end = observation.time;
            let initialize = !swarm.is_initialized();
            let step_seed: u64 = rng.random();

            let advance = |(i, particle): (usize, &mut Particle)| -> PompResult<f64> {
                let mut prng = particle_rng(step_seed, i);
                perturbation.perturb(local_step, &mut particle.params, &mut prng)?;
                if initialize {
                    let state = self.model.initialize(&particle.params, t_start, &mut prng)?;
                    if state.len() != n_states {
                        return Err(PompError::DimensionMismatch {
                            what: "initial state",
                            expected: n_states,
                            found: state.len(),
                        });
                    }
                    particle.state = state;
                }
                spec.reset_accumulators(&mut particle.state);
                self.model
                    .propagate(&mut particle.state, &particle.params, t_start, t_end, &mut prng)?;
                if particle.state.iter().any(|x| !x.is_finite()) {
                    return Err(PompError::NonFiniteState { step, particle: i });
                }
                let log_weight =
                    self.model
                        .measurement_density(observation, &particle.state, &particle.params, true)?;
                if log_weight.is_nan() || log_weight == f64::INFINITY {
                    return Err(PompError::InvalidDensity {
                        step,
                        particle: i,
                        value: log_weight,
                    });
                }
                Ok(log_weight)
            };

            let log_weights: Vec<f64> = if self.parallel {
                swarm
                    .particles_mut()
                    .par_iter_mut()
                    .enumerate()
                    .map(advance)
                    .collect::<PompResult<Vec<f64>>>()?
            } else {
                swarm
                    .particles_mut()
                    .iter_mut()
                    .enumerate()
                    .map(advance)
                    .collect::<PompResult<Vec<f64>>>()?
            };
            swarm.mark_initialized();

            let max_log_weight = log_weights.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            if max_log_weight == f64::NEG_INFINITY {
                tracing::warn!(
                    "Filtering failure at observation {} (t = {}): all {} particles have zero density",
                    step,
                    t_end,
                    np
                );
                return Err(PompError::FilterFailure { step, time: t_end });
            }

            let weights: Vec<f64> = log_weights
                .iter()
                .map(|lw| (lw - max_log_weight).exp())
                .collect();
            let total: f64 = weights.iter().sum();
            let normalized: Vec<f64> = weights.iter().map(|w| w / total).collect();

            let step_loglik = max_log_weight + (total / np as f64).ln();
            let step_ess = effective_sample_size(&normalized);

            let mut means = vec![0.0; n_states];
            for (particle, w) in swarm.particles().iter().zip(&normalized) {
                for (m, x) in means.iter_mut().zip(&particle.state) {
                    *m += w * x;
                }
            }

            if step_ess < LOW_ESS_FRACTION * np as f64 && np > 1 {
                tracing::debug!(
                    "Low effective sample size at observation {}: {:.2} of {} particles",
                    step,
                    step_ess,
                    np
                );
            }
            tracing::trace!(
                "Observation {} (t = {}): conditional log-likelihood {:.4}, ESS {:.1}",
                step,
                t_end,
                step_loglik,
                step_ess
            );

            let u: f64 = rng.random();
            let indices = systematic(&normalized, np, u)?;
            swarm.select(&indices, t_end);

            cond_loglik.push(step_loglik);
            ess.push(step_ess);
            filter_mean.push(means);
            times.push(t_end);
        }

        let loglik: f64 = cond_loglik.iter().sum();
        tracing::debug!(
            "Particle filter with {} particles over {} observations: log-likelihood {:.4}",
            np,
            times.len(),
            loglik
        );

        Ok(PfilterOutput {
            loglik,
            times,
            cond_loglik,
            ess,
            filter_mean,
            swarm,
        })
    }
}

/// The result of one particle filter run
#[derive(Debug, Clone)]
pub struct PfilterOutput {
    loglik: f64,
    times: Vec<f64>,
    cond_loglik: Vec<f64>,
    ess: Vec<f64>,
    filter_mean: Vec<Vec<f64>>,
    swarm: Swarm,
}

impl PfilterOutput {
    /// Sum of the conditional log-likelihoods
    pub fn loglik(&self) -> f64 {
        self.loglik
    }

    /// Times of the assimilated observations
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn cond_loglik(&self) -> &[f64] {
        &self.cond_loglik
    }

    /// Effective sample size at each observation, before resampling
    pub fn ess(&self) -> &[f64] {
        &self.ess
    }

    /// Weighted mean of each state variable at each observation, before resampling
    pub fn filter_mean(&self) -> &[Vec<f64>] {
        &self.filter_mean
    }

    /// The resampled swarm at the last observation
    pub fn swarm(&self) -> &Swarm {
        &self.swarm
    }

    pub fn into_swarm(self) -> Swarm {
        self.swarm
    }

    pub fn particles(&self) -> usize {
        self.swarm.len()
    }
}
