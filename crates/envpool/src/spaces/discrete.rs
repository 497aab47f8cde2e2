//! Discrete action/observation space

use super::Space;
use rand::Rng;

/// Discrete space with n possible values: {0, 1, ..., n-1}
///
/// Values travel through `f32` tensors; [`Discrete::index_of`] maps them back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Discrete {
    /// Number of possible values
    pub n: usize,
    /// Cached shape
    shape: Vec<usize>,
}

impl Discrete {
    /// Create a new discrete space with n values
    pub fn new(n: usize) -> Self {
        assert!(n > 0, "Discrete space must have at least 1 element");
        Self { n, shape: vec![1] }
    }

    /// Decode an `f32`-encoded value, `None` unless it is an integer in `[0, n)`
    pub fn index_of(&self, value: f32) -> Option<usize> {
        if !value.is_finite() || value < 0.0 || value.fract() != 0.0 {
            return None;
        }
        let idx = value as usize;
        self.contains(&idx).then_some(idx)
    }
}

impl Space for Discrete {
    type Sample = usize;

    fn sample<R: Rng>(&self, rng: &mut R) -> Self::Sample {
        rng.gen_range(0..self.n)
    }

    fn contains(&self, value: &Self::Sample) -> bool {
        *value < self.n
    }

    fn shape(&self) -> &[usize] {
        &self.shape
    }

    fn num_elements(&self) -> usize {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_discrete_sample() {
        let space = Discrete::new(4);
        let mut rng = rand::rngs::StdRng::seed_from_u64(42);

        for _ in 0..100 {
            let sample = space.sample(&mut rng);
            assert!(space.contains(&sample));
        }
    }

    #[test]
    fn test_discrete_index_of() {
        let space = Discrete::new(3);
        assert_eq!(space.index_of(0.0), Some(0));
        assert_eq!(space.index_of(2.0), Some(2));
        assert_eq!(space.index_of(3.0), None);
        assert_eq!(space.index_of(-1.0), None);
        assert_eq!(space.index_of(1.5), None);
        assert_eq!(space.index_of(f32::NAN), None);
    }
}
