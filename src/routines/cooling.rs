use serde_derive::{Deserialize, Serialize};

use crate::error::{PompError, PompResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CoolingType {
    #[default]
    Geometric,
    Hyperbolic,
}

/// Shrinks the random-walk magnitude across IF2 iterations
///
/// The factor depends on the continuous position `x = iteration + step / n_steps`, with `iteration` counted
/// from zero, and equals `fraction` at `x = reference`:
///
/// - geometric: `fraction^(x / reference)`
/// - hyperbolic: `s / (s + x)` with `s = reference * fraction / (1 - fraction)`
///
/// Both start at `1` for `x = 0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoolingSchedule {
    kind: CoolingType,
    fraction: f64,
    reference: f64,
}

impl CoolingSchedule {
    pub fn new(kind: CoolingType, fraction: f64, reference: usize) -> PompResult<Self> {
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(PompError::domain(format!(
                "cooling fraction must lie in (0, 1], got {}",
                fraction
            )));
        }
        if reference == 0 {
            return Err(PompError::domain("cooling reference iteration must be positive"));
        }
        Ok(Self {
            kind,
            fraction,
            reference: reference as f64,
        })
    }

    pub fn geometric(fraction: f64, reference: usize) -> PompResult<Self> {
        Self::new(CoolingType::Geometric, fraction, reference)
    }

    pub fn hyperbolic(fraction: f64, reference: usize) -> PompResult<Self> {
        Self::new(CoolingType::Hyperbolic, fraction, reference)
    }

    pub fn kind(&self) -> CoolingType {
        self.kind
    }

    pub fn fraction(&self) -> f64 {
        self.fraction
    }

    /// Factor applied at observation `step` of iteration `iteration`
    pub fn factor(&self, iteration: usize, step: usize, n_steps: usize) -> f64 {
        let x = iteration as f64 + step as f64 / n_steps.max(1) as f64;
        if self.fraction == 1.0 {
            return 1.0;
        }
        match self.kind {
            CoolingType::Geometric => self.fraction.powf(x / self.reference),
            CoolingType::Hyperbolic => {
                let s = self.reference * self.fraction / (1.0 - self.fraction);
                s / (s + x)
            }
        }
    }

    /// Factor at the start of iteration `iteration`
    pub fn magnitude(&self, iteration: usize) -> f64 {
        self.factor(iteration, 0, 1)
    }
}

impl Default for CoolingSchedule {
    fn default() -> Self {
        Self {
            kind: CoolingType::Geometric,
            fraction: 0.5,
            reference: 50.0,
        }
    }
}
