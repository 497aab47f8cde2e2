//! CartPole classic control environment.

use crate::discrete_action;
use envpool::spaces::{Box as BoxSpace, Discrete, DynSpace};
use envpool::{EnvConfig, EnvError, EnvRng, EnvSpec, PoolEnv, SlotWriter};
use ndarray::ArrayViewD;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// CartPole configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CartPoleConfig {
    /// Episode length cap enforced by the pool
    pub max_episode_steps: u32,
    /// Push strength in newtons
    pub force_mag: f32,
}

impl Default for CartPoleConfig {
    fn default() -> Self {
        Self {
            max_episode_steps: 500,
            force_mag: 10.0,
        }
    }
}

impl CartPoleConfig {
    pub fn with_max_episode_steps(mut self, steps: u32) -> Self {
        self.max_episode_steps = steps;
        self
    }

    pub fn with_force_mag(mut self, force_mag: f32) -> Self {
        self.force_mag = force_mag;
        self
    }
}

/// CartPole environment
///
/// A pole is attached to a cart on a frictionless track. The goal
/// is to balance the pole by applying forces to the cart.
///
/// Observation: [cart_pos, cart_vel, pole_angle, pole_vel]
/// Action: 0 = push left, 1 = push right
pub struct CartPole {
    // Physics constants
    gravity: f32,
    mass_pole: f32,
    total_mass: f32,
    length: f32, // half-pole length
    pole_mass_length: f32,
    force_mag: f32,
    tau: f32, // timestep

    // Thresholds
    theta_threshold: f32,
    x_threshold: f32,

    // State
    state: [f32; 4], // x, x_dot, theta, theta_dot
    reward: f32,
    terminated: bool,
}

impl CartPole {
    /// Create a new CartPole environment
    pub fn new(config: &CartPoleConfig) -> Self {
        let mass_cart = 1.0;
        let mass_pole = 0.1;
        let length = 0.5;

        Self {
            gravity: 9.8,
            mass_pole,
            total_mass: mass_cart + mass_pole,
            length,
            pole_mass_length: mass_pole * length,
            force_mag: config.force_mag,
            tau: 0.02,
            theta_threshold: 12.0 * 2.0 * PI / 360.0, // 12 degrees
            x_threshold: 2.4,
            state: [0.0; 4],
            reward: 0.0,
            terminated: false,
        }
    }

    pub fn spec(config: &CartPoleConfig) -> EnvSpec {
        EnvSpec::new(
            "cartpole",
            // Observation bounds (loosely)
            DynSpace::Box(BoxSpace::uniform(&[4], -4.8, 4.8)),
            DynSpace::Discrete(Discrete::new(2)),
        )
        .with_config(EnvConfig::default().with_max_episode_steps(config.max_episode_steps))
    }

    /// Current `[x, x_dot, theta, theta_dot]`
    pub fn state(&self) -> [f32; 4] {
        self.state
    }

    fn is_terminal(&self) -> bool {
        let x = self.state[0];
        let theta = self.state[2];

        x.abs() > self.x_threshold || theta.abs() > self.theta_threshold
    }
}

impl Default for CartPole {
    fn default() -> Self {
        Self::new(&CartPoleConfig::default())
    }
}

impl PoolEnv for CartPole {
    fn reset(&mut self, rng: &mut EnvRng) -> Result<(), EnvError> {
        // Initialize state randomly in [-0.05, 0.05]
        for v in self.state.iter_mut() {
            *v = rng.gen_range(-0.05..0.05);
        }
        self.reward = 0.0;
        self.terminated = false;
        Ok(())
    }

    fn step(&mut self, _rng: &mut EnvRng, action: ArrayViewD<'_, f32>) -> Result<(), EnvError> {
        let [x, x_dot, theta, theta_dot] = self.state;

        // Apply force
        let force = if discrete_action(action)? == 1 {
            self.force_mag
        } else {
            -self.force_mag
        };

        // Physics simulation
        let cos_theta = theta.cos();
        let sin_theta = theta.sin();

        let temp = (force + self.pole_mass_length * theta_dot * theta_dot * sin_theta) / self.total_mass;
        let theta_acc = (self.gravity * sin_theta - cos_theta * temp)
            / (self.length * (4.0 / 3.0 - self.mass_pole * cos_theta * cos_theta / self.total_mass));
        let x_acc = temp - self.pole_mass_length * theta_acc * cos_theta / self.total_mass;

        // Euler integration
        self.state = [
            x + self.tau * x_dot,
            x_dot + self.tau * x_acc,
            theta + self.tau * theta_dot,
            theta_dot + self.tau * theta_acc,
        ];
        if self.state.iter().any(|v| !v.is_finite()) {
            return Err(EnvError::Diverged(format!("cartpole state {:?}", self.state)));
        }

        self.terminated = self.is_terminal();
        self.reward = if self.terminated { 0.0 } else { 1.0 };
        Ok(())
    }

    fn is_done(&self) -> bool {
        self.terminated
    }

    fn emit_state(&self, slot: &mut SlotWriter<'_>) {
        slot.obs_mut().copy_from_slice(&self.state);
        slot.set_reward(self.reward);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{ArrayD, IxDyn};
    use rand::SeedableRng;

    fn push(env: &mut CartPole, rng: &mut EnvRng, a: usize) {
        let action = ArrayD::from_elem(IxDyn(&[1]), a as f32);
        env.step(rng, action.view()).unwrap();
    }

    #[test]
    fn test_cartpole_reset() {
        let mut env = CartPole::default();
        let mut rng = EnvRng::seed_from_u64(42);
        env.reset(&mut rng).unwrap();

        assert!(env.state().iter().all(|v| v.abs() <= 0.05));
        assert!(!env.is_done());
    }

    #[test]
    fn test_cartpole_step() {
        let mut env = CartPole::default();
        let mut rng = EnvRng::seed_from_u64(42);
        env.reset(&mut rng).unwrap();

        push(&mut env, &mut rng, 1);
        assert_eq!(env.reward, 1.0); // Should get reward if not terminated
        assert!(env.state()[1] > 0.0);
    }

    #[test]
    fn test_constant_push_terminates() {
        let mut env = CartPole::default();
        let mut rng = EnvRng::seed_from_u64(0);
        env.reset(&mut rng).unwrap();

        let mut steps = 0;
        while !env.is_done() {
            push(&mut env, &mut rng, 1);
            steps += 1;
            assert!(steps < 200, "pole never fell");
        }
        assert_eq!(env.reward, 0.0);
    }

    #[test]
    fn test_cartpole_determinism() {
        let mut env1 = CartPole::default();
        let mut env2 = CartPole::default();
        let mut rng1 = EnvRng::seed_from_u64(42);
        let mut rng2 = EnvRng::seed_from_u64(42);

        env1.reset(&mut rng1).unwrap();
        env2.reset(&mut rng2).unwrap();

        for _ in 0..10 {
            push(&mut env1, &mut rng1, 1);
            push(&mut env2, &mut rng2, 1);
            assert_eq!(env1.state(), env2.state());
        }
    }

    #[test]
    fn test_spec_carries_episode_cap() {
        let spec = CartPole::spec(&CartPoleConfig::default().with_max_episode_steps(200));
        assert_eq!(spec.config.max_episode_steps, Some(200));
        assert_eq!(spec.obs_size(), 4);
    }
}
