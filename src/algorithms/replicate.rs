use rayon::prelude::*;
use serde_derive::Serialize;

use crate::algorithms::pfilter::ParticleFilter;
use crate::error::{PompError, PompResult};
use crate::model::Model;
use crate::routines::math::{logmeanexp_se, LogMeanExp};
use crate::routines::rng::task_rng;
use crate::structs::parameters::ParameterVector;

/// Independent particle filter log-likelihoods at one parameter vector, and their combination
#[derive(Debug, Clone, Serialize)]
pub struct Replicates {
    logliks: Vec<f64>,
    failures: usize,
    combined: LogMeanExp,
}

impl Replicates {
    /// Combines a set of log-likelihood estimates; the order of `logliks` is irrelevant
    pub fn from_logliks(logliks: Vec<f64>) -> Self {
        let failures = logliks.iter().filter(|ll| **ll == f64::NEG_INFINITY).count();
        let combined = logmeanexp_se(&logliks);
        Self {
            logliks,
            failures,
            combined,
        }
    }

    /// One log-likelihood per replicate, in replicate order; failed runs are `-inf`
    pub fn logliks(&self) -> &[f64] {
        &self.logliks
    }

    /// Number of replicates that ended in a filtering failure
    pub fn failures(&self) -> usize {
        self.failures
    }

    /// log-mean-exp of the replicates
    pub fn loglik(&self) -> f64 {
        self.combined.estimate
    }

    /// Jackknife standard error of [Replicates::loglik]
    pub fn se(&self) -> f64 {
        self.combined.se
    }

    pub fn combined(&self) -> LogMeanExp {
        self.combined
    }
}

/// Runs `replicates` independent filters at `params`, replicate `k` drawing from stream `k` of `seed`
///
/// A filtering failure in one replicate enters the combination as `-inf`. Any other error is returned, after
/// all replicates have finished.
pub fn replicate_pfilter<M: Model>(
    filter: &ParticleFilter<'_, M>,
    params: &ParameterVector,
    replicates: usize,
    seed: u64,
) -> PompResult<Replicates> {
    if replicates == 0 {
        return Err(PompError::domain("the number of replicates must be at least 1"));
    }

    let run = |k: usize| {
        let mut rng = task_rng(seed, k as u64);
        filter.run(params, &mut rng).map(|out| out.loglik())
    };
    let outcomes: Vec<PompResult<f64>> = if filter.is_parallel() {
        (0..replicates).into_par_iter().map(run).collect()
    } else {
        (0..replicates).map(run).collect()
    };

    let mut logliks = Vec::with_capacity(replicates);
    for (k, outcome) in outcomes.into_iter().enumerate() {
        match outcome {
            Ok(ll) => logliks.push(ll),
            Err(err) if err.is_filter_failure() => {
                tracing::warn!("Replicate {} failed: {}", k, err);
                logliks.push(f64::NEG_INFINITY);
            }
            Err(err) => return Err(err),
        }
    }

    let result = Replicates::from_logliks(logliks);
    tracing::debug!(
        "{} replicates at {}: log-likelihood {:.4} (se {:.4})",
        replicates,
        params,
        result.loglik(),
        result.se()
    );
    Ok(result)
}
