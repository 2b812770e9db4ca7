use std::ops::Index;
use std::sync::Arc;

use serde_derive::{Deserialize, Serialize};

use crate::error::{PompError, PompResult};

/// An ordered mapping from parameter name to value
///
/// The names are shared between clones, so copying a [ParameterVector] into every particle only copies the values.
/// Model code reads values by position with [fetch_params](crate::fetch_params) or by name with [ParameterVector::get].
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterVector {
    names: Arc<[String]>,
    values: Vec<f64>,
}

impl ParameterVector {
    pub fn new(names: Vec<String>, values: Vec<f64>) -> PompResult<Self> {
        if names.len() != values.len() {
            return Err(PompError::DimensionMismatch {
                what: "parameter values",
                expected: names.len(),
                found: values.len(),
            });
        }
        for (i, name) in names.iter().enumerate() {
            if names[..i].contains(name) {
                return Err(PompError::domain(format!(
                    "parameter '{}' is declared more than once",
                    name
                )));
            }
        }
        Ok(Self {
            names: names.into(),
            values,
        })
    }

    pub fn from_pairs(pairs: &[(&str, f64)]) -> PompResult<Self> {
        let names = pairs.iter().map(|(n, _)| n.to_string()).collect();
        let values = pairs.iter().map(|(_, v)| *v).collect();
        Self::new(names, values)
    }

    /// Same names, new values
    pub fn with_values(&self, values: Vec<f64>) -> PompResult<Self> {
        if values.len() != self.names.len() {
            return Err(PompError::DimensionMismatch {
                what: "parameter values",
                expected: self.names.len(),
                found: values.len(),
            });
        }
        Ok(Self {
            names: Arc::clone(&self.names),
            values,
        })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.index_of(name).map(|i| self.values[i])
    }

    pub fn set(&mut self, name: &str, value: f64) -> PompResult<()> {
        match self.index_of(name) {
            Some(i) => {
                self.values[i] = value;
                Ok(())
            }
            None => Err(PompError::domain(format!("unknown parameter '{}'", name))),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }

    /// True if both vectors share the same names in the same order
    pub fn same_layout(&self, other: &ParameterVector) -> bool {
        Arc::ptr_eq(&self.names, &other.names) || self.names == other.names
    }
}

impl Index<usize> for ParameterVector {
    type Output = f64;

    fn index(&self, index: usize) -> &f64 {
        &self.values[index]
    }
}

impl std::fmt::Display for ParameterVector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .iter()
            .map(|(name, value)| format!("{}={:.6}", name, value))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

/// Binds parameter values to local variables, in declaration order
///
/// ```ignore
/// fetch_params!(p, beta, mu_ir, rho);
/// ```
#[macro_export]
macro_rules! fetch_params {
    ($p:expr, $($name:ident),+ $(,)?) => {
        let mut __position = 0usize;
        $(
            #[allow(unused_variables)]
            let $name = $p[__position];
            __position += 1;
        )+
        let _ = __position;
    };
}

/// The monotonic map between the natural scale of a parameter and the scale it is perturbed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Transform {
    #[default]
    Identity,
    /// Strictly positive parameters
    Log,
    /// Parameters in the open unit interval
    Logit,
}

/// Smallest probability a logit-scale parameter decodes to
const LOGIT_FLOOR: f64 = f64::MIN_POSITIVE;
/// Largest probability a logit-scale parameter decodes to
const LOGIT_CEILING: f64 = 1.0 - f64::EPSILON;

impl Transform {
    /// Whether `value` lies in the support of the transform
    pub fn admits(&self, value: f64) -> bool {
        match self {
            Transform::Identity => value.is_finite(),
            Transform::Log => value.is_finite() && value > 0.0,
            Transform::Logit => value > 0.0 && value < 1.0,
        }
    }

    /// Natural scale to estimation scale
    pub fn encode(&self, value: f64) -> PompResult<f64> {
        if !self.admits(value) {
            return Err(PompError::domain(format!(
                "value {} is outside the support of the {:?} transform",
                value, self
            )));
        }
        Ok(match self {
            Transform::Identity => value,
            Transform::Log => value.ln(),
            Transform::Logit => (value / (1.0 - value)).ln(),
        })
    }

    /// Estimation scale to natural scale
    ///
    /// The result is always inside the support: extreme inputs are clamped to the nearest representable
    /// admissible value instead of underflowing to the boundary.
    pub fn decode(&self, value: f64) -> f64 {
        match self {
            Transform::Identity => value,
            Transform::Log => value.exp().clamp(f64::MIN_POSITIVE, f64::MAX),
            Transform::Logit => (1.0 / (1.0 + (-value).exp())).clamp(LOGIT_FLOOR, LOGIT_CEILING),
        }
    }
}

/// One [Transform] per parameter, aligned with a [ParameterVector] layout
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterTransforms {
    transforms: Vec<Transform>,
}

impl ParameterTransforms {
    /// Identity for every parameter
    pub fn identity(n: usize) -> Self {
        Self {
            transforms: vec![Transform::Identity; n],
        }
    }

    /// Assigns transforms by name; parameters not listed keep the identity
    pub fn from_names(layout: &ParameterVector, assignments: &[(&str, Transform)]) -> PompResult<Self> {
        let mut transforms = vec![Transform::Identity; layout.len()];
        for (name, transform) in assignments {
            let index = layout
                .index_of(name)
                .ok_or_else(|| PompError::domain(format!("unknown parameter '{}'", name)))?;
            transforms[index] = *transform;
        }
        Ok(Self { transforms })
    }

    pub fn new(transforms: Vec<Transform>) -> Self {
        Self { transforms }
    }

    pub fn get(&self, index: usize) -> Transform {
        self.transforms[index]
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    pub fn encode(&self, params: &ParameterVector) -> PompResult<Vec<f64>> {
        self.check_len(params.len())?;
        params
            .values()
            .iter()
            .zip(&self.transforms)
            .zip(params.names())
            .map(|((value, transform), name)| {
                transform.encode(*value).map_err(|_| {
                    PompError::domain(format!(
                        "parameter '{}' = {} is outside the support of its {:?} transform",
                        name, value, transform
                    ))
                })
            })
            .collect()
    }

    pub fn decode(&self, layout: &ParameterVector, encoded: &[f64]) -> PompResult<ParameterVector> {
        self.check_len(encoded.len())?;
        let values = encoded
            .iter()
            .zip(&self.transforms)
            .map(|(value, transform)| transform.decode(*value))
            .collect();
        layout.with_values(values)
    }

    /// Mean of a set of parameter vectors, taken on the estimation scale
    pub fn mean(&self, members: &[ParameterVector]) -> PompResult<ParameterVector> {
        let first = members
            .first()
            .ok_or_else(|| PompError::domain("cannot average an empty set of parameter vectors"))?;
        let mut sums = vec![0.0; first.len()];
        for member in members {
            for (sum, value) in sums.iter_mut().zip(self.encode(member)?) {
                *sum += value;
            }
        }
        let n = members.len() as f64;
        let means: Vec<f64> = sums.into_iter().map(|s| s / n).collect();
        self.decode(first, &means)
    }

    fn check_len(&self, found: usize) -> PompResult<()> {
        if found != self.transforms.len() {
            return Err(PompError::DimensionMismatch {
                what: "parameter transforms",
                expected: self.transforms.len(),
                found,
            });
        }
        Ok(())
    }
}
