use ndarray::Array2;
use sobol_burley::{sample, NUM_DIMENSIONS};

use crate::error::{PompError, PompResult};

/// Generates a 2-dimensional array containing an Owen-scrambled Sobol sequence in the unit hypercube.
///
/// Each row is a point, each column a dimension. The scramble is determined by `seed`, so the same seed always
/// reproduces the same design.
///
/// # Arguments
///
/// * `points` - The number of points in the sequence.
/// * `dimensions` - The number of free parameters.
/// * `seed` - The seed for the scramble.
pub fn generate(points: usize, dimensions: usize, seed: u64) -> PompResult<Array2<f64>> {
    if dimensions > NUM_DIMENSIONS as usize {
        return Err(PompError::domain(format!(
            "Sobol designs support at most {} dimensions, got {}",
            NUM_DIMENSIONS, dimensions
        )));
    }
    let index_limit = u32::MAX as usize;
    if points > index_limit {
        return Err(PompError::domain(format!("too many Sobol points: {}", points)));
    }

    // The scramble takes 32 bits; fold the high half in so no part of the master seed is ignored
    let seed = (seed ^ (seed >> 32)) as u32;
    Ok(Array2::from_shape_fn((points, dimensions), |(i, j)| {
        sample(i as u32, j as u32, seed) as f64
    }))
}
