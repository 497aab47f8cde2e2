//! Per-environment-type declarations shared by every instance in a pool.

use crate::spaces::DynSpace;
use crate::{PoolError, Result};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Scalar configuration applied by the pool to every instance of a type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnvConfig {
    /// Episode length cap; reaching it truncates the episode
    pub max_episode_steps: Option<u32>,
    /// Multiplier applied to every emitted reward
    pub reward_scale: f32,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            max_episode_steps: None,
            reward_scale: 1.0,
        }
    }
}

impl EnvConfig {
    /// Set the episode length cap
    pub fn with_max_episode_steps(mut self, steps: u32) -> Self {
        self.max_episode_steps = Some(steps);
        self
    }

    /// Set the reward multiplier
    pub fn with_reward_scale(mut self, scale: f32) -> Self {
        self.reward_scale = scale;
        self
    }
}

/// Shapes, bounds and configuration of one environment type.
///
/// Immutable once a pool is built; every instance sees the same spec.
#[derive(Clone, Debug)]
pub struct EnvSpec {
    /// Human readable name, used in logs
    pub name: String,
    /// Observation tensor layout
    pub observation_space: DynSpace,
    /// Action tensor layout
    pub action_space: DynSpace,
    /// Names of the scalar info fields each slot carries
    pub info_keys: SmallVec<[&'static str; 4]>,
    /// Pool-enforced scalar configuration
    pub config: EnvConfig,
}

impl EnvSpec {
    /// Create a spec without info fields and with the default config
    pub fn new(name: impl Into<String>, observation_space: DynSpace, action_space: DynSpace) -> Self {
        Self {
            name: name.into(),
            observation_space,
            action_space,
            info_keys: SmallVec::new(),
            config: EnvConfig::default(),
        }
    }

    /// Declare a scalar info field
    pub fn with_info_key(mut self, key: &'static str) -> Self {
        self.info_keys.push(key);
        self
    }

    /// Replace the scalar configuration
    pub fn with_config(mut self, config: EnvConfig) -> Self {
        self.config = config;
        self
    }

    /// Observation shape (single instance)
    pub fn obs_shape(&self) -> &[usize] {
        self.observation_space.shape()
    }

    /// Number of `f32` elements in one observation
    pub fn obs_size(&self) -> usize {
        self.observation_space.num_elements()
    }

    /// Reject specs a pool cannot lay out
    pub fn validate(&self) -> Result<()> {
        if self.obs_size() == 0 {
            return Err(PoolError::InvalidConfig(format!(
                "{}: observation space is empty",
                self.name
            )));
        }
        if self.config.max_episode_steps == Some(0) {
            return Err(PoolError::InvalidConfig(format!(
                "{}: max_episode_steps must be positive",
                self.name
            )));
        }
        if !self.config.reward_scale.is_finite() {
            return Err(PoolError::InvalidConfig(format!(
                "{}: reward_scale must be finite",
                self.name
            )));
        }
        for (i, key) in self.info_keys.iter().enumerate() {
            if self.info_keys[..i].contains(key) {
                return Err(PoolError::InvalidConfig(format!(
                    "{}: info key {key:?} declared twice",
                    self.name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spaces::{Box as BoxSpace, Discrete};

    fn spec() -> EnvSpec {
        EnvSpec::new(
            "test",
            DynSpace::Box(BoxSpace::unit(&[2, 3])),
            DynSpace::Discrete(Discrete::new(2)),
        )
    }

    #[test]
    fn test_layout() {
        let spec = spec().with_info_key("a").with_info_key("b");
        assert_eq!(spec.obs_shape(), &[2, 3]);
        assert_eq!(spec.obs_size(), 6);
        assert_eq!(spec.info_keys.as_slice(), &["a", "b"]);
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_duplicate_info_keys() {
        let spec = spec().with_info_key("a").with_info_key("a");
        assert!(matches!(spec.validate(), Err(PoolError::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_zero_episode_cap() {
        let spec = spec().with_config(EnvConfig::default().with_max_episode_steps(0));
        assert!(matches!(spec.validate(), Err(PoolError::InvalidConfig(_))));
    }

    #[test]
    fn test_env_config_serde() {
        let config = EnvConfig::default().with_max_episode_steps(3).with_reward_scale(0.5);
        let json = serde_json::to_string(&config).unwrap();
        let back: EnvConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
