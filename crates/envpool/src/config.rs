//! Pool construction parameters.

use crate::{PoolError, Result};
use serde::{Deserialize, Serialize};

/// Configuration for an [`EnvPool`](crate::EnvPool)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of environment instances
    pub num_envs: usize,
    /// Worker threads; 0 picks the available parallelism
    pub num_threads: usize,
    /// Results returned by `recv`; 0 means `num_envs`
    pub batch_size: usize,
    /// Base seed; instance `i` is seeded with `seed + i`
    pub seed: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            num_envs: 1,
            num_threads: 0,
            batch_size: 0,
            seed: 42,
        }
    }
}

impl PoolConfig {
    /// Create a new config with specified number of environments
    pub fn new(num_envs: usize) -> Self {
        Self {
            num_envs,
            ..Default::default()
        }
    }

    /// Set the number of worker threads
    pub fn with_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads;
        self
    }

    /// Set the default `recv` batch size
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Worker count after resolving the 0 default, never above `num_envs`
    pub fn resolved_threads(&self) -> usize {
        let wanted = if self.num_threads == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        } else {
            self.num_threads
        };
        wanted.clamp(1, self.num_envs.max(1))
    }

    /// Batch size after resolving the 0 default
    pub fn resolved_batch_size(&self) -> usize {
        if self.batch_size == 0 {
            self.num_envs
        } else {
            self.batch_size
        }
    }

    /// Check the configuration is usable
    pub fn validate(&self) -> Result<()> {
        if self.num_envs == 0 {
            return Err(PoolError::InvalidConfig("num_envs must be > 0".into()));
        }
        if self.batch_size > self.num_envs {
            return Err(PoolError::InvalidConfig(format!(
                "batch_size ({}) must not exceed num_envs ({})",
                self.batch_size, self.num_envs
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_resolve() {
        let config = PoolConfig::new(8);
        assert_eq!(config.resolved_batch_size(), 8);
        let threads = config.resolved_threads();
        assert!((1..=8).contains(&threads));
    }

    #[test]
    fn test_threads_capped_by_envs() {
        let config = PoolConfig::new(2).with_threads(16);
        assert_eq!(config.resolved_threads(), 2);
    }

    #[test]
    fn test_validate() {
        assert!(PoolConfig::new(4).with_batch_size(2).validate().is_ok());
        assert!(PoolConfig::new(0).validate().is_err());
        assert!(PoolConfig::new(4).with_batch_size(5).validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: PoolConfig = serde_json::from_str(r#"{"num_envs": 16, "batch_size": 4}"#).unwrap();
        assert_eq!(config.num_envs, 16);
        assert_eq!(config.batch_size, 4);
        assert_eq!(config.seed, 42);
        assert_eq!(config.num_threads, 0);
    }
}
