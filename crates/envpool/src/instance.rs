//! Per-instance state: lifecycle, episode bookkeeping and auto-reset.

use crate::env::{EnvError, EnvRng, PoolEnv};
use crate::slot::SlotWriter;
use crate::spec::EnvConfig;
use ndarray::ArrayViewD;
use rand::SeedableRng;
use std::any::Any;
use std::cell::UnsafeCell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};

/// Where an instance is in its `Idle → Running → Ready → Idle` cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum EnvState {
    /// Result consumed (or never produced); waiting for an action
    Idle = 0,
    /// Action queued or being executed by a worker
    Running = 1,
    /// Result written, waiting in the ready queue
    Ready = 2,
}

impl EnvState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => EnvState::Idle,
            1 => EnvState::Running,
            _ => EnvState::Ready,
        }
    }
}

pub(crate) struct AtomicEnvState(AtomicU8);

impl AtomicEnvState {
    fn new(state: EnvState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub(crate) fn load(&self) -> EnvState {
        EnvState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Move `from → to`; on failure returns the state actually found
    pub(crate) fn transition(&self, from: EnvState, to: EnvState) -> Result<(), EnvState> {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(EnvState::from_u8)
    }
}

/// What a worker did with one work item.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Outcome {
    Step,
    Reset,
    Fault,
}

pub(crate) struct Instance<E> {
    env: E,
    rng: EnvRng,
    elapsed_step: u32,
    needs_reset: bool,
    generation: u64,
    episode_return: f32,
}

impl<E: PoolEnv> Instance<E> {
    pub(crate) fn new(env: E, seed: u64) -> Self {
        Self {
            env,
            rng: EnvRng::seed_from_u64(seed),
            elapsed_step: 0,
            // Instances start without an episode; the first action resets.
            needs_reset: true,
            generation: 0,
            episode_return: 0.0,
        }
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    /// Run one work item and fill the slot.
    ///
    /// `action == None` is an explicit reset request. An instance whose
    /// episode is over resets regardless of the action it was sent.
    ///
    /// Panics are caught here, after the process panic hook has already
    /// reported them.
    pub(crate) fn execute(
        &mut self,
        action: Option<ArrayViewD<'_, f32>>,
        slot: &mut SlotWriter<'_>,
        config: &EnvConfig,
    ) -> Outcome {
        let action = if self.needs_reset { None } else { action };
        let is_reset = action.is_none();

        let env = &mut self.env;
        let rng = &mut self.rng;
        let result = catch_unwind(AssertUnwindSafe(|| -> Result<bool, EnvError> {
            match action {
                Some(action) => env.step(rng, action)?,
                None => env.reset(rng)?,
            }
            slot.clear();
            env.emit_state(slot);
            Ok(env.is_done())
        }));

        self.generation += 1;
        let fault = match result {
            Ok(Ok(terminated)) => {
                self.record(is_reset, terminated, slot, config);
                return if is_reset { Outcome::Reset } else { Outcome::Step };
            }
            Ok(Err(err)) => err.to_string(),
            Err(payload) => format!("panic: {}", panic_message(payload.as_ref())),
        };

        slot.clear();
        let header = slot.header_mut();
        header.elapsed_step = self.elapsed_step;
        header.generation = self.generation;
        header.episode_return = self.episode_return;
        header.error = Some(fault);
        self.needs_reset = true;
        Outcome::Fault
    }

    fn record(&mut self, is_reset: bool, terminated: bool, slot: &mut SlotWriter<'_>, config: &EnvConfig) {
        if is_reset {
            self.elapsed_step = 0;
            self.episode_return = 0.0;
        } else {
            self.elapsed_step += 1;
        }

        let header = slot.header_mut();
        header.reward *= config.reward_scale;
        self.episode_return += header.reward;

        let truncated = !terminated
            && config
                .max_episode_steps
                .is_some_and(|cap| self.elapsed_step >= cap);
        self.needs_reset = terminated || truncated;

        header.terminated = terminated;
        header.truncated = truncated;
        header.elapsed_step = self.elapsed_step;
        header.generation = self.generation;
        header.episode_return = self.episode_return;
        header.error = None;
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic payload"
    }
}

/// An instance plus its lifecycle state.
///
/// The instance is only touched by the worker that moved the state to
/// `Running`, so it needs no lock of its own.
pub(crate) struct InstanceCell<E> {
    pub(crate) state: AtomicEnvState,
    inner: UnsafeCell<Instance<E>>,
}

// SAFETY: `inner` is accessed by at most one thread at a time, the one that
// owns the `Running` state; the state's acquire/release ordering publishes
// the writes.
unsafe impl<E: Send> Sync for InstanceCell<E> {}

impl<E: PoolEnv> InstanceCell<E> {
    pub(crate) fn new(instance: Instance<E>) -> Self {
        Self {
            state: AtomicEnvState::new(EnvState::Idle),
            inner: UnsafeCell::new(instance),
        }
    }

    /// # Safety
    /// The caller must be the worker executing this instance's `Running`
    /// work item.
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn get_mut(&self) -> &mut Instance<E> {
        &mut *self.inner.get()
    }

    /// # Safety
    /// The instance must not be `Running`.
    pub(crate) unsafe fn get(&self) -> &Instance<E> {
        &*self.inner.get()
    }
}
