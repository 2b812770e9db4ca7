use ndarray::Array2;
use rand::Rng;

use crate::routines::rng::design_rng;

/// Independent uniform draws in the unit hypercube, row by row
pub fn generate(points: usize, dimensions: usize, seed: u64) -> Array2<f64> {
    let mut rng = design_rng(seed);
    let mut seq = Array2::<f64>::zeros((points, dimensions));
    for value in seq.iter_mut() {
        *value = rng.random::<f64>();
    }
    seq
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_shape_and_range() {
        let seq = generate(100, 4, 9);
        assert_eq!(seq.shape(), &[100, 4]);
        assert!(seq.iter().all(|&u| (0.0..1.0).contains(&u)));
        let mean = seq.iter().sum::<f64>() / 400.0;
        assert!((mean - 0.5).abs() < 0.05);
    }
}
