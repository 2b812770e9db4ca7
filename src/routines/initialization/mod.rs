//! Starting designs for the global search
//!
//! A [ParameterBox] assigns every model parameter either a search range or a fixed value. Designs are drawn in the
//! unit hypercube spanned by the free parameters and scaled into the box; fixed parameters keep their value in
//! every starting point.

use ndarray::Array2;
use serde_derive::{Deserialize, Serialize};

use crate::error::{PompError, PompResult};
use crate::structs::parameters::ParameterVector;

pub mod latin;
pub mod sobol;
pub mod uniform;

/// The sampler used to generate starting points
///
/// - `Sobol`: an Owen-scrambled Sobol sequence
/// - `Latin`: a Latin hypercube
/// - `Uniform`: independent uniform draws
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Sampler {
    #[default]
    Sobol,
    Latin,
    Uniform,
}

impl Sampler {
    /// `points` rows of `dimensions` unit-interval coordinates
    pub fn unit_design(&self, points: usize, dimensions: usize, seed: u64) -> PompResult<Array2<f64>> {
        match self {
            Sampler::Sobol => sobol::generate(points, dimensions, seed),
            Sampler::Latin => Ok(latin::generate(points, dimensions, seed)),
            Sampler::Uniform => Ok(uniform::generate(points, dimensions, seed)),
        }
    }
}

/// How one parameter enters the search
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bound {
    /// Drawn from `[lower, upper]`
    Range { lower: f64, upper: f64 },
    /// Held at a constant value
    Fixed(f64),
}

/// Search ranges and fixed values for every parameter of a model, in declaration order
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterBox {
    names: Vec<String>,
    bounds: Vec<Option<Bound>>,
}

impl ParameterBox {
    /// A box over `names` with no bounds assigned yet
    pub fn new<S: AsRef<str>>(names: &[S]) -> Self {
        Self {
            names: names.iter().map(|n| n.as_ref().to_string()).collect(),
            bounds: vec![None; names.len()],
        }
    }

    /// Searches parameter `name` over `[lower, upper]`
    pub fn range(mut self, name: &str, lower: f64, upper: f64) -> PompResult<Self> {
        if !(lower.is_finite() && upper.is_finite()) || lower >= upper {
            return Err(PompError::domain(format!(
                "in parameter '{}', lower bound ({}) is not less than upper bound ({})",
                name, lower, upper
            )));
        }
        let index = self.index(name)?;
        self.bounds[index] = Some(Bound::Range { lower, upper });
        Ok(self)
    }

    /// Holds parameter `name` at `value`
    pub fn fixed(mut self, name: &str, value: f64) -> PompResult<Self> {
        if !value.is_finite() {
            return Err(PompError::domain(format!(
                "fixed value of parameter '{}' must be finite, got {}",
                name, value
            )));
        }
        let index = self.index(name)?;
        self.bounds[index] = Some(Bound::Fixed(value));
        Ok(self)
    }

    fn index(&self, name: &str) -> PompResult<usize> {
        self.names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| PompError::domain(format!("unknown parameter '{}'", name)))
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn bound(&self, name: &str) -> Option<Bound> {
        self.index(name).ok().and_then(|i| self.bounds[i])
    }

    /// Indices of the parameters with a search range
    pub fn free(&self) -> Vec<usize> {
        self.bounds
            .iter()
            .enumerate()
            .filter(|(_, b)| matches!(b, Some(Bound::Range { .. })))
            .map(|(i, _)| i)
            .collect()
    }

    /// Fails if any parameter has neither a range nor a fixed value
    pub fn check_complete(&self) -> PompResult<()> {
        let missing: Vec<&str> = self
            .names
            .iter()
            .zip(&self.bounds)
            .filter(|(_, b)| b.is_none())
            .map(|(n, _)| n.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(PompError::domain(format!(
                "no range or fixed value given for parameters {:?}",
                missing
            )));
        }
        Ok(())
    }

    /// Maps unit coordinates of the free parameters to a full parameter vector
    pub fn point(&self, unit: &[f64]) -> PompResult<ParameterVector> {
        self.check_complete()?;
        let free = self.free();
        if unit.len() != free.len() {
            return Err(PompError::DimensionMismatch {
                what: "design coordinates",
                expected: free.len(),
                found: unit.len(),
            });
        }
        let mut coordinates = unit.iter();
        let values = self
            .bounds
            .iter()
            .map(|bound| match bound {
                Some(Bound::Fixed(value)) => *value,
                Some(Bound::Range { lower, upper }) => {
                    let u = coordinates.next().copied().unwrap_or(0.5);
                    lower + u * (upper - lower)
                }
                None => f64::NAN,
            })
            .collect();
        ParameterVector::new(self.names.clone(), values)
    }

    /// Whether `params` lies inside the box
    pub fn contains(&self, params: &ParameterVector) -> bool {
        params.names() == self.names.as_slice()
            && params
                .values()
                .iter()
                .zip(&self.bounds)
                .all(|(value, bound)| match bound {
                    Some(Bound::Range { lower, upper }) => *value >= *lower && *value <= *upper,
                    Some(Bound::Fixed(fixed)) => value == fixed,
                    None => false,
                })
    }
}

/// Draws `points` starting vectors from `bounds` with the given sampler
pub fn design(
    bounds: &ParameterBox,
    sampler: Sampler,
    points: usize,
    seed: u64,
) -> PompResult<Vec<ParameterVector>> {
    bounds.check_complete()?;
    let unit = sampler.unit_design(points, bounds.free().len(), seed)?;
    let starts = unit
        .rows()
        .into_iter()
        .map(|row| bounds.point(&row.to_vec()))
        .collect::<PompResult<Vec<_>>>()?;
    tracing::debug!(
        "Generated {} starting points with the {:?} sampler over {} free parameters",
        starts.len(),
        sampler,
        bounds.free().len()
    );
    Ok(starts)
}

/// A profile design over parameter `name`
///
/// `levels` equally spaced values span the range of `name`; each is crossed with `draws` points for the other free
/// parameters. The profiled parameter should be given a zero random-walk standard deviation in the subsequent
/// searches so that it stays at its level.
pub fn profile_design(
    bounds: &ParameterBox,
    name: &str,
    levels: usize,
    draws: usize,
    sampler: Sampler,
    seed: u64,
) -> PompResult<Vec<ParameterVector>> {
    let (lower, upper) = match bounds.bound(name) {
        Some(Bound::Range { lower, upper }) => (lower, upper),
        _ => {
            return Err(PompError::domain(format!(
                "profiled parameter '{}' needs a search range",
                name
            )))
        }
    };
    if levels == 0 {
        return Err(PompError::domain("a profile needs at least one level"));
    }

    let mut starts = Vec::with_capacity(levels * draws);
    for level in 0..levels {
        let value = if levels == 1 {
            0.5 * (lower + upper)
        } else {
            lower + (upper - lower) * level as f64 / (levels - 1) as f64
        };
        let slice = bounds.clone().fixed(name, value)?;
        starts.extend(design(&slice, sampler, draws, seed.wrapping_add(level as u64))?);
    }
    Ok(starts)
}
