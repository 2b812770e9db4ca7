use ndarray::Array2;
use rand::prelude::*;

use crate::routines::rng::design_rng;

/// Generates a 2-dimensional array containing a Latin hypercube design in the unit hypercube.
///
/// Every column splits `[0, 1)` into `points` equal intervals and places exactly one point in each, at a uniform
/// position within the interval. The interval order is shuffled independently per column.
pub fn generate(points: usize, dimensions: usize, seed: u64) -> Array2<f64> {
    let mut seq = Array2::<f64>::zeros((points, dimensions));
    let mut rng = design_rng(seed);

    for j in 0..dimensions {
        let mut intervals: Vec<f64> = (0..points).map(|i| i as f64).collect();
        intervals.shuffle(&mut rng);

        for i in 0..points {
            let value = rng.random::<f64>();
            seq[[i, j]] = (intervals[i] + value) / points as f64;
        }
    }
    seq
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_lhs() {
        let result = generate(5, 3, 42);
        assert_eq!(result.shape(), &[5, 3]);
        assert!(result.iter().all(|&u| (0.0..1.0).contains(&u)));

        // One point per interval in every column
        for j in 0..3 {
            let mut bins: Vec<usize> = (0..5).map(|i| (result[[i, j]] * 5.0) as usize).collect();
            bins.sort();
            assert_eq!(bins, vec![0, 1, 2, 3, 4]);
        }
    }

    #[test]
    fn test_lhs_reproducible() {
        assert_eq!(generate(8, 2, 1), generate(8, 2, 1));
    }
}
