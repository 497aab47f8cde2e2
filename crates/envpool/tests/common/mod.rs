//! Environments shared by the pool integration tests.

#![allow(dead_code)]

use envpool::prelude::*;
use ndarray::ArrayViewD;
use rand::Rng;
use std::thread;
use std::time::Duration;

/// Action meanings for [`Ticker`]
pub const STEP: usize = 0;
pub const FAIL: usize = 1;
pub const PANIC: usize = 2;
pub const SLOW: usize = 3;

/// How long a `SLOW` step takes
pub const SLOW_STEP: Duration = Duration::from_millis(300);

/// Counts steps until `horizon`.
///
/// Observation is `[env_id, count, noise]` where `noise` is drawn from the
/// instance RNG on every reset; reward is the step count.
pub struct Ticker {
    env_id: usize,
    count: u32,
    horizon: u32,
    noise: f32,
}

impl Ticker {
    pub fn new(env_id: usize, horizon: u32) -> Self {
        Self {
            env_id,
            count: 0,
            horizon,
            noise: 0.0,
        }
    }
}

impl PoolEnv for Ticker {
    fn reset(&mut self, rng: &mut EnvRng) -> std::result::Result<(), EnvError> {
        self.count = 0;
        self.noise = rng.gen();
        Ok(())
    }

    fn step(&mut self, rng: &mut EnvRng, action: ArrayViewD<'_, f32>) -> std::result::Result<(), EnvError> {
        match action[[0]] as usize {
            FAIL => return Err(EnvError::Diverged(format!("ticker {} diverged", self.env_id))),
            PANIC => panic!("ticker {} panicked", self.env_id),
            SLOW => thread::sleep(SLOW_STEP),
            _ => {}
        }
        self.count += 1;
        self.noise += rng.gen_range(0.0..0.01);
        Ok(())
    }

    fn is_done(&self) -> bool {
        self.count >= self.horizon
    }

    fn emit_state(&self, slot: &mut SlotWriter<'_>) {
        let obs = slot.obs_mut();
        obs[0] = self.env_id as f32;
        obs[1] = self.count as f32;
        obs[2] = self.noise;
        slot.set_reward(self.count as f32);
        slot.set_info("count", self.count as f32);
    }
}

pub fn ticker_spec() -> EnvSpec {
    EnvSpec::new(
        "ticker",
        DynSpace::Box(BoxSpace::unbounded(&[3])),
        DynSpace::Discrete(Discrete::new(4)),
    )
    .with_info_key("count")
}

pub fn ticker_pool(config: PoolConfig, horizon: u32) -> EnvPool<Ticker> {
    ticker_pool_with(config, ticker_spec(), horizon)
}

pub fn ticker_pool_with(config: PoolConfig, spec: EnvSpec, horizon: u32) -> EnvPool<Ticker> {
    EnvPool::new(config, spec, move |_, env_id| Ticker::new(env_id, horizon)).unwrap()
}

pub fn steps(env_ids: &[usize], action: usize) -> Vec<ActionRecord> {
    env_ids
        .iter()
        .map(|&id| ActionRecord::discrete(id, action))
        .collect()
}
