//! Multi-armed bandit environment.

use crate::discrete_action;
use envpool::spaces::{Box as BoxSpace, Discrete, DynSpace};
use envpool::{EnvError, EnvRng, EnvSpec, PoolEnv, SlotWriter};
use ndarray::ArrayViewD;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Bandit configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BanditConfig {
    /// Number of arms
    pub num_actions: usize,
    /// Reward noise amplitude
    pub reward_noise: f32,
    /// Seed choosing the solution arm, shared by all instances
    pub hard_fixed_seed: u64,
}

impl Default for BanditConfig {
    fn default() -> Self {
        Self {
            num_actions: 4,
            reward_noise: 0.0,
            hard_fixed_seed: 42,
        }
    }
}

impl BanditConfig {
    pub fn with_num_actions(mut self, num_actions: usize) -> Self {
        self.num_actions = num_actions;
        self
    }

    pub fn with_reward_noise(mut self, reward_noise: f32) -> Self {
        self.reward_noise = reward_noise;
        self
    }
}

/// Multi-armed bandit environment
///
/// The agent must learn which arm gives the highest reward.
/// Rewards are determined by a fixed random seed, so all
/// instances have the same optimal arm. Every episode is one step long.
pub struct Bandit {
    reward_noise: f32,
    /// Optimal arm index
    solution_idx: usize,
    reward: f32,
    score: f32,
    done: bool,
}

impl Bandit {
    pub fn new(config: &BanditConfig) -> Self {
        // Use fixed seed to determine solution
        let mut seed_rng = EnvRng::seed_from_u64(config.hard_fixed_seed);
        let solution_idx = seed_rng.gen_range(0..config.num_actions);

        Self {
            reward_noise: config.reward_noise,
            solution_idx,
            reward: 0.0,
            score: 0.0,
            done: false,
        }
    }

    pub fn spec(config: &BanditConfig) -> EnvSpec {
        EnvSpec::new(
            "bandit",
            DynSpace::Box(BoxSpace::uniform(&[1], -1.0, 1.0)),
            DynSpace::Discrete(Discrete::new(config.num_actions)),
        )
        .with_info_key("score")
    }

    /// The arm paying reward 1
    pub fn solution(&self) -> usize {
        self.solution_idx
    }
}

impl PoolEnv for Bandit {
    fn reset(&mut self, _rng: &mut EnvRng) -> Result<(), EnvError> {
        self.reward = 0.0;
        self.score = 0.0;
        self.done = false;
        Ok(())
    }

    fn step(&mut self, rng: &mut EnvRng, action: ArrayViewD<'_, f32>) -> Result<(), EnvError> {
        let correct = discrete_action(action)? == self.solution_idx;
        self.reward = if correct { 1.0 } else { 0.0 };
        self.score = self.reward;

        if self.reward_noise > 0.0 {
            let noise: f32 = rng.gen::<f32>() * 2.0 - 1.0;
            self.reward += noise * self.reward_noise;
        }
        self.done = true; // Episode ends after one step
        Ok(())
    }

    fn is_done(&self) -> bool {
        self.done
    }

    fn emit_state(&self, slot: &mut SlotWriter<'_>) {
        slot.obs_mut()[0] = 1.0;
        slot.set_reward(self.reward);
        slot.set_info("score", self.score);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{ArrayD, IxDyn};

    fn pull(env: &mut Bandit, rng: &mut EnvRng, arm: usize) {
        let action = ArrayD::from_elem(IxDyn(&[1]), arm as f32);
        env.step(rng, action.view()).unwrap();
    }

    #[test]
    fn test_only_solution_arm_pays() {
        let config = BanditConfig::default();
        let mut env = Bandit::new(&config);
        let mut rng = EnvRng::seed_from_u64(0);

        for arm in 0..config.num_actions {
            env.reset(&mut rng).unwrap();
            pull(&mut env, &mut rng, arm);
            assert!(env.is_done());
            let expected = if arm == env.solution() { 1.0 } else { 0.0 };
            assert_eq!(env.reward, expected);
            assert_eq!(env.score, expected);
        }
    }

    #[test]
    fn test_solution_shared_across_instances() {
        let config = BanditConfig::default().with_num_actions(10);
        assert_eq!(Bandit::new(&config).solution(), Bandit::new(&config).solution());
    }

    #[test]
    fn test_noise_keeps_score_clean() {
        let config = BanditConfig::default().with_reward_noise(0.5);
        let mut env = Bandit::new(&config);
        let mut rng = EnvRng::seed_from_u64(1);
        env.reset(&mut rng).unwrap();
        let arm = env.solution();
        pull(&mut env, &mut rng, arm);

        assert_eq!(env.score, 1.0);
        assert!((env.reward - 1.0).abs() <= 0.5);
    }
}
