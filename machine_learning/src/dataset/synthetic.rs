use ndarray::Array2;
use rand::Rng;
use rand_distr::{Distribution, Normal, Uniform};

use super::Dataset;
use crate::{MlErr, Result};

/// Generates isotropic gaussian blobs, one per class, with centers drawn uniformly from
/// `[-center_box, center_box]` on every feature.
///
/// Labels are assigned round robin so every class gets `samples / classes` samples, give
/// or take one.
pub fn make_blobs<R: Rng + ?Sized>(
    samples: usize,
    features: usize,
    classes: usize,
    std_dev: f32,
    rng: &mut R,
) -> Result<Dataset> {
    const CENTER_BOX: f32 = 10.;

    if classes == 0 {
        return Err(MlErr::InvalidDistribution(
            "at least one class is needed".into(),
        ));
    }

    if !(std_dev.is_finite() && std_dev >= 0.) {
        return Err(MlErr::InvalidDistribution(format!(
            "the standard deviation must be finite and non negative, got {std_dev}"
        )));
    }

    let noise =
        Normal::new(0., std_dev).map_err(|e| MlErr::InvalidDistribution(e.to_string()))?;
    let center = Uniform::new_inclusive(-CENTER_BOX, CENTER_BOX)
        .map_err(|e| MlErr::InvalidDistribution(e.to_string()))?;

    let centers = Array2::from_shape_simple_fn((classes, features), || center.sample(rng));
    let y: Vec<usize> = (0..samples).map(|i| i % classes).collect();
    let x = Array2::from_shape_fn((samples, features), |(i, j)| {
        centers[[y[i], j]] + noise.sample(rng)
    });

    Dataset::new(x, y)
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn shape_and_balance() {
        let mut rng = StdRng::seed_from_u64(42);
        let ds = make_blobs(101, 3, 2, 1., &mut rng).unwrap();

        assert_eq!(ds.len(), 101);
        assert_eq!(ds.x_size(), 3);
        assert_eq!(ds.num_classes(), 2);
        assert_eq!(ds.y().iter().filter(|&&c| c == 1).count(), 50);
    }

    #[test]
    fn seeded() {
        let a = make_blobs(10, 2, 3, 0.5, &mut StdRng::seed_from_u64(1)).unwrap();
        let b = make_blobs(10, 2, 3, 0.5, &mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn invalid_parameters() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(make_blobs(10, 2, 0, 1., &mut rng).is_err());
        assert!(make_blobs(10, 2, 2, -1., &mut rng).is_err());
        assert!(make_blobs(10, 2, 2, f32::INFINITY, &mut rng).is_err());
    }

    #[test]
    fn zero_std_dev_puts_every_sample_on_its_center() {
        let mut rng = StdRng::seed_from_u64(3);
        let ds = make_blobs(6, 2, 2, 0., &mut rng).unwrap();

        assert_eq!(ds.x().row(0), ds.x().row(2));
        assert_eq!(ds.x().row(1), ds.x().row(5));
    }
}
