//! Slot buffers.
//!
//! Every environment instance owns one slot: a fixed region of the pool's
//! observation and info buffers plus a small header. The worker executing the
//! instance writes it through a [`SlotWriter`]; after `recv` the consumer
//! reads it in place through a [`SlotView`], without copying.

mod buffer;

use crate::spec::EnvSpec;
use buffer::HeapBuffer;
use ndarray::{ArrayViewD, ArrayViewMutD, IxDyn};
use std::cell::UnsafeCell;

/// Scalar part of a slot, written by the pool around `emit_state`.
#[derive(Clone, Debug, Default)]
pub(crate) struct SlotHeader {
    pub(crate) env_id: usize,
    pub(crate) reward: f32,
    pub(crate) terminated: bool,
    pub(crate) truncated: bool,
    pub(crate) elapsed_step: u32,
    pub(crate) generation: u64,
    pub(crate) episode_return: f32,
    pub(crate) error: Option<String>,
}

/// Storage for all slots of a pool.
pub(crate) struct SlotArena {
    obs: HeapBuffer,
    info: HeapBuffer,
    headers: Box<[UnsafeCell<SlotHeader>]>,
    obs_shape: Vec<usize>,
    obs_size: usize,
    info_keys: Vec<&'static str>,
}

// SAFETY: a slot is only touched by the worker holding its instance in
// `Running`, or read by the consumer while the instance is `Idle`.
unsafe impl Sync for SlotArena {}

impl SlotArena {
    pub(crate) fn new(num_envs: usize, spec: &EnvSpec) -> Self {
        let obs_size = spec.obs_size();
        let info_len = spec.info_keys.len();
        let headers = (0..num_envs)
            .map(|env_id| {
                UnsafeCell::new(SlotHeader {
                    env_id,
                    ..Default::default()
                })
            })
            .collect();
        Self {
            obs: HeapBuffer::new(num_envs * obs_size),
            info: HeapBuffer::new(num_envs * info_len),
            headers,
            obs_shape: spec.obs_shape().to_vec(),
            obs_size,
            info_keys: spec.info_keys.to_vec(),
        }
    }

    pub(crate) fn num_slots(&self) -> usize {
        self.headers.len()
    }

    /// # Safety
    /// The caller must have exclusive access to slot `env_id` while the
    /// writer is alive.
    pub(crate) unsafe fn writer(&self, env_id: usize) -> SlotWriter<'_> {
        let info_len = self.info_keys.len();
        SlotWriter {
            obs: self.obs.slice_mut(env_id * self.obs_size, self.obs_size),
            obs_shape: &self.obs_shape,
            info: self.info.slice_mut(env_id * info_len, info_len),
            info_keys: &self.info_keys,
            header: &mut *self.headers[env_id].get(),
        }
    }

    /// # Safety
    /// Slot `env_id` must not be written while the view is alive.
    pub(crate) unsafe fn view(&self, env_id: usize) -> SlotView<'_> {
        let info_len = self.info_keys.len();
        SlotView {
            obs: self.obs.slice(env_id * self.obs_size, self.obs_size),
            obs_shape: &self.obs_shape,
            info: self.info.slice(env_id * info_len, info_len),
            info_keys: &self.info_keys,
            header: &*self.headers[env_id].get(),
        }
    }
}

/// Write access to one slot, handed to [`PoolEnv::emit_state`](crate::PoolEnv::emit_state).
///
/// Observation and info fields arrive zero-filled.
#[derive(Debug)]
pub struct SlotWriter<'a> {
    obs: &'a mut [f32],
    obs_shape: &'a [usize],
    info: &'a mut [f32],
    info_keys: &'a [&'static str],
    header: &'a mut SlotHeader,
}

impl<'a> SlotWriter<'a> {
    /// Id of the instance owning this slot
    pub fn env_id(&self) -> usize {
        self.header.env_id
    }

    /// Observation tensor, shaped like the observation space
    pub fn observation_mut(&mut self) -> ArrayViewMutD<'_, f32> {
        ArrayViewMutD::from_shape(IxDyn(self.obs_shape), &mut *self.obs)
            .expect("slot length matches observation shape")
    }

    /// Observation as a flat slice
    pub fn obs_mut(&mut self) -> &mut [f32] {
        &mut *self.obs
    }

    /// Set the (unscaled) reward for this result
    pub fn set_reward(&mut self, reward: f32) {
        self.header.reward = reward;
    }

    /// Set a declared info field; returns false if `key` was not declared
    pub fn set_info(&mut self, key: &str, value: f32) -> bool {
        match self.info_keys.iter().position(|k| *k == key) {
            Some(idx) => {
                self.info[idx] = value;
                true
            }
            None => {
                tracing::debug!(key, "ignoring undeclared info field");
                false
            }
        }
    }

    pub(crate) fn clear(&mut self) {
        self.obs.fill(0.0);
        self.info.fill(0.0);
        self.header.reward = 0.0;
        self.header.terminated = false;
        self.header.truncated = false;
        self.header.error = None;
    }

    pub(crate) fn header_mut(&mut self) -> &mut SlotHeader {
        &mut *self.header
    }
}

/// Read-only snapshot of one instance's latest result.
///
/// Borrowed from the pool through a [`Batch`](crate::Batch); it stays valid
/// until the pool is sent new actions.
#[derive(Clone, Copy, Debug)]
pub struct SlotView<'a> {
    obs: &'a [f32],
    obs_shape: &'a [usize],
    info: &'a [f32],
    info_keys: &'a [&'static str],
    header: &'a SlotHeader,
}

impl<'a> SlotView<'a> {
    /// Id of the instance this result belongs to
    pub fn env_id(&self) -> usize {
        self.header.env_id
    }

    /// Observation tensor, zero-copy
    pub fn observation(&self) -> ArrayViewD<'a, f32> {
        ArrayViewD::from_shape(IxDyn(self.obs_shape), self.obs)
            .expect("slot length matches observation shape")
    }

    /// Observation as a flat slice
    pub fn obs(&self) -> &'a [f32] {
        self.obs
    }

    /// Reward after the environment's reward scale
    pub fn reward(&self) -> f32 {
        self.header.reward
    }

    /// Episode ended by the environment
    pub fn terminated(&self) -> bool {
        self.header.terminated
    }

    /// Episode cut by the episode length cap
    pub fn truncated(&self) -> bool {
        self.header.truncated
    }

    /// Episode is over; the next action for this id starts a new one
    pub fn done(&self) -> bool {
        self.header.terminated || self.header.truncated || self.header.error.is_some()
    }

    /// Steps taken in the current episode; 0 right after a reset
    pub fn elapsed_step(&self) -> u32 {
        self.header.elapsed_step
    }

    /// Number of results this instance has produced so far
    pub fn generation(&self) -> u64 {
        self.header.generation
    }

    /// Sum of rewards in the current episode
    pub fn episode_return(&self) -> f32 {
        self.header.episode_return
    }

    /// Value of a declared info field
    pub fn info(&self, key: &str) -> Option<f32> {
        self.info_keys
            .iter()
            .position(|k| *k == key)
            .map(|idx| self.info[idx])
    }

    /// All info fields in declaration order
    pub fn infos(&self) -> &'a [f32] {
        self.info
    }

    /// Fault raised by the environment while producing this result
    pub fn error(&self) -> Option<&'a str> {
        self.header.error.as_deref()
    }
}
