//! Catch: a ball falls down a grid and a paddle on the bottom row catches it.

use crate::discrete_action;
use envpool::spaces::{Box as BoxSpace, Discrete, DynSpace};
use envpool::{EnvError, EnvRng, EnvSpec, PoolEnv, SlotWriter};
use ndarray::ArrayViewD;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Catch configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatchConfig {
    /// Grid rows; the paddle lives on the last one
    pub height: usize,
    /// Grid columns
    pub width: usize,
}

impl Default for CatchConfig {
    fn default() -> Self {
        Self {
            height: 10,
            width: 5,
        }
    }
}

impl CatchConfig {
    pub fn with_height(mut self, height: usize) -> Self {
        self.height = height;
        self
    }

    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width;
        self
    }
}

/// Catch environment
///
/// Observation: `[height, width]` grid with a 1 at the ball and at the paddle
/// Action: 0 = left, 1 = stay, 2 = right
///
/// The ball starts in a random column of the top row and falls one row per
/// step. When it reaches the bottom row the episode ends with reward +1 if the
/// paddle is under it, -1 otherwise.
pub struct Catch {
    config: CatchConfig,
    ball_row: usize,
    ball_col: usize,
    paddle: usize,
    reward: f32,
    done: bool,
}

impl Catch {
    pub fn new(config: CatchConfig) -> Self {
        let paddle = config.width / 2;
        Self {
            config,
            ball_row: 0,
            ball_col: 0,
            paddle,
            reward: 0.0,
            done: true,
        }
    }

    pub fn spec(config: &CatchConfig) -> EnvSpec {
        EnvSpec::new(
            "catch",
            DynSpace::Box(BoxSpace::unit(&[config.height, config.width])),
            DynSpace::Discrete(Discrete::new(3)),
        )
    }

    /// Column of the paddle
    pub fn paddle(&self) -> usize {
        self.paddle
    }

    /// Column of the ball
    pub fn ball(&self) -> usize {
        self.ball_col
    }
}

impl Default for Catch {
    fn default() -> Self {
        Self::new(CatchConfig::default())
    }
}

impl PoolEnv for Catch {
    fn reset(&mut self, rng: &mut EnvRng) -> Result<(), EnvError> {
        self.ball_row = 0;
        self.ball_col = rng.gen_range(0..self.config.width);
        self.paddle = self.config.width / 2;
        self.reward = 0.0;
        self.done = false;
        Ok(())
    }

    fn step(&mut self, _rng: &mut EnvRng, action: ArrayViewD<'_, f32>) -> Result<(), EnvError> {
        let shift = discrete_action(action)?.min(2);
        self.paddle = (self.paddle + shift)
            .saturating_sub(1)
            .min(self.config.width - 1);

        self.reward = 0.0;
        self.ball_row += 1;
        if self.ball_row + 1 >= self.config.height {
            self.done = true;
            self.reward = if self.ball_col == self.paddle { 1.0 } else { -1.0 };
        }
        Ok(())
    }

    fn is_done(&self) -> bool {
        self.done
    }

    fn emit_state(&self, slot: &mut SlotWriter<'_>) {
        let mut obs = slot.observation_mut();
        obs[[self.ball_row, self.ball_col]] = 1.0;
        obs[[self.config.height - 1, self.paddle]] = 1.0;
        slot.set_reward(self.reward);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{ArrayD, IxDyn};
    use rand::SeedableRng;

    fn act(a: usize) -> ArrayD<f32> {
        ArrayD::from_elem(IxDyn(&[1]), a as f32)
    }

    #[test]
    fn test_catch_episode_length() {
        let mut env = Catch::default();
        let mut rng = EnvRng::seed_from_u64(0);
        env.reset(&mut rng).unwrap();
        assert!(!env.is_done());

        for _ in 0..8 {
            env.step(&mut rng, act(1).view()).unwrap();
            assert!(!env.is_done());
            assert_eq!(env.reward, 0.0);
        }
        env.step(&mut rng, act(1).view()).unwrap();
        assert!(env.is_done());
        assert_eq!(env.ball_row, 9);
    }

    #[test]
    fn test_paddle_clamped_to_grid() {
        let mut env = Catch::default();
        let mut rng = EnvRng::seed_from_u64(0);
        env.reset(&mut rng).unwrap();
        assert_eq!(env.paddle(), 2);

        for _ in 0..4 {
            env.step(&mut rng, act(0).view()).unwrap();
        }
        assert_eq!(env.paddle(), 0);
        for _ in 0..4 {
            env.step(&mut rng, act(2).view()).unwrap();
        }
        assert_eq!(env.paddle(), 4);
    }

    #[test]
    fn test_following_the_ball_catches_it() {
        let mut rng = EnvRng::seed_from_u64(3);
        for _ in 0..10 {
            let mut env = Catch::default();
            env.reset(&mut rng).unwrap();
            while !env.is_done() {
                let a = match env.ball().cmp(&env.paddle()) {
                    std::cmp::Ordering::Less => 0,
                    std::cmp::Ordering::Equal => 1,
                    std::cmp::Ordering::Greater => 2,
                };
                env.step(&mut rng, act(a).view()).unwrap();
            }
            assert_eq!(env.reward, 1.0);
        }
    }

    #[test]
    fn test_spec_matches_config() {
        let config = CatchConfig::default().with_height(6).with_width(7);
        let spec = Catch::spec(&config);
        assert_eq!(spec.obs_shape(), &[6, 7]);
        assert_eq!(spec.action_space.num_elements(), 1);
    }
}
