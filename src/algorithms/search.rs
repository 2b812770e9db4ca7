//! Global and local likelihood searches
//!
//! Every starting point gets an independent IF2 run followed by a replicated clean likelihood evaluation of its
//! estimate. Starting points are independent tasks: each draws from its own random-number stream, and a failure
//! in one never affects the others.

use rand::Rng;
use rayon::prelude::*;

use crate::algorithms::mif2::{Mif2, TraceRow};
use crate::algorithms::pfilter::ParticleFilter;
use crate::algorithms::replicate::replicate_pfilter;
use crate::error::{PompError, PompResult};
use crate::model::Model;
use crate::routines::initialization::{design, ParameterBox, Sampler};
use crate::routines::output::records::{sort_by_loglik, ResultRecord};
use crate::routines::rng::task_rng;
use crate::structs::parameters::ParameterVector;

/// IF2 from many starting points, each followed by a replicated evaluation
#[derive(Debug, Clone)]
pub struct GlobalSearch<'a, M: Model> {
    mif2: Mif2<'a, M>,
    evaluation: ParticleFilter<'a, M>,
    replicates: usize,
    seed: u64,
    parallel: bool,
}

impl<'a, M: Model> GlobalSearch<'a, M> {
    /// `evaluation` is the filter used for the clean likelihood evaluation, run `replicates` times per estimate
    pub fn new(
        mif2: Mif2<'a, M>,
        evaluation: ParticleFilter<'a, M>,
        replicates: usize,
        seed: u64,
    ) -> PompResult<Self> {
        if replicates == 0 {
            return Err(PompError::domain("the number of replicates must be at least 1"));
        }
        Ok(Self {
            mif2,
            evaluation,
            replicates,
            seed,
            parallel: true,
        })
    }

    /// Run starting points on the rayon thread pool (default) or one after the other
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn mif2(&self) -> &Mif2<'a, M> {
        &self.mif2
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Draws `guesses` starting points from `bounds` and searches from each
    pub fn run(&self, bounds: &ParameterBox, sampler: Sampler, guesses: usize) -> PompResult<SearchResult> {
        let starts = design(bounds, sampler, guesses, self.seed)?;
        Ok(self.run_from_starts(starts))
    }

    /// Searches from explicit starting points
    ///
    /// Guess `g` draws from stream `g` of the master seed, so results do not depend on execution order.
    pub fn run_from_starts(&self, starts: Vec<ParameterVector>) -> SearchResult {
        tracing::info!(
            "Starting {} IF2 searches: {} iterations with {} particles, then {} replicates with {} particles",
            starts.len(),
            self.mif2.iterations(),
            self.mif2.filter().particles(),
            self.replicates,
            self.evaluation.particles()
        );

        let outcomes: Vec<SearchOutcome> = if self.parallel {
            starts
                .into_par_iter()
                .enumerate()
                .map(|(guess, start)| self.search_one(guess, start))
                .collect()
        } else {
            starts
                .into_iter()
                .enumerate()
                .map(|(guess, start)| self.search_one(guess, start))
                .collect()
        };

        let result = SearchResult { outcomes };
        match result.best() {
            Some(best) => tracing::info!(
                "Search finished: {} of {} guesses succeeded, best log-likelihood {:.4} (se {:.4})",
                result.records().len(),
                result.outcomes.len(),
                best.loglik,
                best.loglik_se
            ),
            None => tracing::warn!("Search finished without a successful guess"),
        }
        result
    }

    fn search_one(&self, guess: usize, start: ParameterVector) -> SearchOutcome {
        let span = tracing::info_span!("guess", guess);
        let _enter = span.enter();

        let mut rng = task_rng(self.seed, guess as u64);
        let fitted = match self.mif2.run(&start, &mut rng) {
            Ok(fitted) => fitted,
            Err(err) => {
                tracing::warn!("IF2 from guess {} failed: {}", guess, err);
                return SearchOutcome {
                    guess,
                    start,
                    traces: Vec::new(),
                    result: Err(err),
                };
            }
        };

        let evaluation_seed: u64 = rng.random();
        let result = replicate_pfilter(
            &self.evaluation,
            fitted.estimate(),
            self.replicates,
            evaluation_seed,
        )
        .map(|replicates| {
            ResultRecord::new(fitted.estimate().clone(), replicates.loglik(), replicates.se())
        });

        match &result {
            Ok(record) => tracing::info!(
                "Guess {}: log-likelihood {:.4} (se {:.4})",
                guess,
                record.loglik,
                record.loglik_se
            ),
            Err(err) => tracing::warn!("Evaluation of guess {} failed: {}", guess, err),
        }

        SearchOutcome {
            guess,
            start,
            traces: fitted.traces().to_vec(),
            result,
        }
    }
}

/// The outcome of the search from one starting point
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub guess: usize,
    pub start: ParameterVector,
    /// IF2 traces; empty if IF2 itself failed
    pub traces: Vec<TraceRow>,
    pub result: Result<ResultRecord, PompError>,
}

/// All outcomes of a search, in guess order
#[derive(Debug, Clone)]
pub struct SearchResult {
    outcomes: Vec<SearchOutcome>,
}

impl SearchResult {
    pub fn outcomes(&self) -> &[SearchOutcome] {
        &self.outcomes
    }

    /// Records of the successful guesses, in guess order
    pub fn records(&self) -> Vec<ResultRecord> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok().cloned())
            .collect()
    }

    /// Guesses that failed, with their errors
    pub fn failures(&self) -> Vec<(usize, &PompError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.guess, e)))
            .collect()
    }

    /// The record with the highest log-likelihood
    pub fn best(&self) -> Option<ResultRecord> {
        self.sorted().into_iter().find(|r| !r.loglik.is_nan())
    }

    /// Records of the successful guesses, highest log-likelihood first
    pub fn sorted(&self) -> Vec<ResultRecord> {
        let mut records = self.records();
        sort_by_loglik(&mut records);
        records
    }
}
