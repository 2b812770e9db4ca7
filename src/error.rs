use thiserror::Error;

/// Errors raised by the filtering and optimization routines
///
/// [PompError::FilterFailure] is the only variant that aggregating callers may absorb: the affected run
/// has a log-likelihood of negative infinity. Every other variant is a configuration or model error and
/// is surfaced to the caller of the run that produced it.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PompError {
    /// Every particle assigned zero density to the observation at `step`
    #[error("filtering failure at observation {step} (t = {time}): all particle weights are zero")]
    FilterFailure { step: usize, time: f64 },

    /// A value outside its admissible domain was supplied or produced
    #[error("domain violation: {0}")]
    Domain(String),

    /// The measurement density returned NaN or positive infinity
    #[error("measurement density for particle {particle} at observation {step} is {value}")]
    InvalidDensity {
        step: usize,
        particle: usize,
        value: f64,
    },

    /// Propagation produced a non-finite state component
    #[error("particle {particle} has a non-finite state after propagation to observation {step}")]
    NonFiniteState { step: usize, particle: usize },

    #[error("{what}: expected length {expected}, found {found}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    /// Reading from or writing to a result store failed
    #[error("result store: {0}")]
    Store(String),
}

impl PompError {
    pub fn domain(message: impl Into<String>) -> Self {
        PompError::Domain(message.into())
    }

    /// True for failures that leave the run with a log-likelihood of negative infinity
    pub fn is_filter_failure(&self) -> bool {
        matches!(self, PompError::FilterFailure { .. })
    }
}

impl From<csv::Error> for PompError {
    fn from(err: csv::Error) -> Self {
        PompError::Store(err.to_string())
    }
}

impl From<std::io::Error> for PompError {
    fn from(err: std::io::Error) -> Self {
        PompError::Store(err.to_string())
    }
}

pub type PompResult<T> = Result<T, PompError>;
