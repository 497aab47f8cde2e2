//! Observation and action spaces.
//!
//! A space describes the shape and bounds of one tensor. Every slot buffer
//! stores `f32`; a [`Discrete`] space marks integer-valued content.

mod r#box;
mod discrete;

pub use discrete::Discrete;
pub use r#box::Box;

use crate::{PoolError, Result};
use ndarray::{ArrayD, ArrayViewD, IxDyn};
use rand::Rng;

/// Trait for observation and action spaces
pub trait Space: Clone + Send + Sync {
    /// The type of samples from this space
    type Sample;

    /// Sample a random element from this space
    fn sample<R: Rng>(&self, rng: &mut R) -> Self::Sample;

    /// Check if a value is contained in this space
    fn contains(&self, value: &Self::Sample) -> bool;

    /// Get the shape of samples from this space
    fn shape(&self) -> &[usize];

    /// Get the total number of elements in a sample
    fn num_elements(&self) -> usize {
        self.shape().iter().product()
    }
}

/// Enum for dynamic space types
#[derive(Clone, Debug)]
pub enum DynSpace {
    Discrete(Discrete),
    Box(Box),
}

impl DynSpace {
    /// Get the shape of this space
    pub fn shape(&self) -> &[usize] {
        match self {
            DynSpace::Discrete(s) => s.shape(),
            DynSpace::Box(s) => s.shape(),
        }
    }

    /// Number of `f32` elements one sample occupies
    pub fn num_elements(&self) -> usize {
        match self {
            DynSpace::Discrete(s) => s.num_elements(),
            DynSpace::Box(s) => s.num_elements(),
        }
    }

    /// Sample from this space
    pub fn sample<R: Rng>(&self, rng: &mut R) -> ArrayD<f32> {
        match self {
            DynSpace::Discrete(s) => ArrayD::from_elem(IxDyn(&[1]), s.sample(rng) as f32),
            DynSpace::Box(s) => s.sample(rng),
        }
    }

    /// Check if this space contains the value
    pub fn contains(&self, value: &ArrayD<f32>) -> bool {
        self.validate(value.view()).is_ok()
    }

    /// Check that `value` can be fed to an environment declaring this space.
    ///
    /// Box actions are checked for shape only; out-of-bound continuous values
    /// are left to the environment to clip. Discrete actions must be a single
    /// integral value in `[0, n)`.
    pub fn validate(&self, value: ArrayViewD<'_, f32>) -> Result<()> {
        match self {
            DynSpace::Discrete(s) => {
                if value.len() != 1 {
                    return Err(PoolError::ShapeMismatch {
                        expected: s.shape().to_vec(),
                        actual: value.shape().to_vec(),
                    });
                }
                let v = value.iter().next().copied().unwrap_or(f32::NAN);
                match s.index_of(v) {
                    Some(_) => Ok(()),
                    None => Err(PoolError::InvalidAction(format!(
                        "{} is not in Discrete({})",
                        v, s.n
                    ))),
                }
            }
            DynSpace::Box(s) => {
                if value.shape() != s.shape() {
                    return Err(PoolError::ShapeMismatch {
                        expected: s.shape().to_vec(),
                        actual: value.shape().to_vec(),
                    });
                }
                if value.iter().any(|v| v.is_nan()) {
                    return Err(PoolError::InvalidAction("action contains NaN".into()));
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_discrete_validate() {
        let space = DynSpace::Discrete(Discrete::new(3));
        assert!(space.validate(ArrayD::from_elem(IxDyn(&[1]), 2.0).view()).is_ok());
        assert!(matches!(
            space.validate(ArrayD::from_elem(IxDyn(&[1]), 3.0).view()),
            Err(PoolError::InvalidAction(_))
        ));
        assert!(matches!(
            space.validate(ArrayD::from_elem(IxDyn(&[1]), 0.5).view()),
            Err(PoolError::InvalidAction(_))
        ));
        assert!(matches!(
            space.validate(ArrayD::from_elem(IxDyn(&[2]), 1.0).view()),
            Err(PoolError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_box_validate_checks_shape_only() {
        let space = DynSpace::Box(Box::symmetric(&[2]));
        assert!(space.validate(ArrayD::from_elem(IxDyn(&[2]), 5.0).view()).is_ok());
        assert!(matches!(
            space.validate(ArrayD::from_elem(IxDyn(&[3]), 0.0).view()),
            Err(PoolError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_samples_validate() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let spaces = [
            DynSpace::Discrete(Discrete::new(5)),
            DynSpace::Box(Box::uniform(&[2, 3], -2.0, 2.0)),
            DynSpace::Box(Box::unbounded(&[4])),
        ];
        for space in &spaces {
            for _ in 0..20 {
                let sample = space.sample(&mut rng);
                assert!(space.contains(&sample));
                assert_eq!(sample.len(), space.num_elements());
            }
        }
    }
}
