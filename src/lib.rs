//! Likelihood-based inference for partially observed Markov process (POMP) models
//!
//! A model implements [model::Model]. The [algorithms::pfilter::ParticleFilter] estimates its log-likelihood,
//! [algorithms::replicate::replicate_pfilter] combines independent estimates with a standard error,
//! [algorithms::mif2::Mif2] maximizes the likelihood by iterated filtering, and
//! [algorithms::search::GlobalSearch] runs IF2 from many starting points. [entrypoints] drives a full search from
//! [routines::settings::Settings].

/// Particle filtering, replication, IF2 and the search driver
pub mod algorithms;
/// Entry points for running searches and evaluations from settings
pub mod entrypoints;
pub mod error;
/// The model interface and discretization helpers
pub mod model;
/// Bundled reference models
pub mod models;
/// Supporting routines: settings, logging, output, designs and numerics
pub mod routines;
/// Parameter vectors, transforms and particle swarms
pub mod structs;

pub use crate::entrypoints::{evaluate, fit};

/// A collection of commonly used items
pub mod prelude {
    pub use crate::algorithms::mif2::{Mif2, Mif2Output, RandomWalk, TraceRow};
    pub use crate::algorithms::pfilter::{ParticleFilter, PfilterOutput};
    pub use crate::algorithms::replicate::{replicate_pfilter, Replicates};
    pub use crate::algorithms::search::{GlobalSearch, SearchOutcome, SearchResult};
    pub use crate::error::{PompError, PompResult};
    pub use crate::fetch_params;
    pub use crate::model::euler::{binomial, euler_steps, reulermultinom};
    pub use crate::model::{Model, ModelSpec, Observation, Observations};
    pub use crate::routines::cooling::{CoolingSchedule, CoolingType};
    pub use crate::routines::initialization::{design, profile_design, Bound, ParameterBox, Sampler};
    pub use crate::routines::math::{logmeanexp, logmeanexp_se, LogMeanExp};
    pub use crate::routines::output::{CsvStore, MemoryStore, ResultRecord, ResultStore};
    pub use crate::routines::rng::{task_rng, PompRng};
    pub use crate::routines::settings::{self, Settings};
    pub use crate::routines::simulation::{simulate, Simulation};
    pub use crate::structs::parameters::{ParameterTransforms, ParameterVector, Transform};
    pub use crate::structs::swarm::{Particle, State, Swarm};
}
