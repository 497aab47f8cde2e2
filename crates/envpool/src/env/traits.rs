//! Core environment trait definitions.

use crate::slot::SlotWriter;
use ndarray::ArrayViewD;

/// Per-instance random generator.
///
/// ChaCha keeps trajectories identical across platforms and `rand` releases.
pub type EnvRng = rand_chacha::ChaCha8Rng;

/// A fault raised by an environment while resetting or stepping.
///
/// Faults never cross the worker boundary: the pool flags the instance's
/// next result and resets it.
#[derive(Debug, thiserror::Error)]
pub enum EnvError {
    #[error("Simulation diverged: {0}")]
    Diverged(String),

    #[error("Invalid internal state: {0}")]
    InvalidState(String),

    #[error("Environment error: {0}")]
    Other(String),
}

/// Core trait for pooled environments.
///
/// The pool owns each instance and calls these methods from whichever worker
/// thread is executing it, never from two threads at once.
///
/// # Faults
///
/// An `Err` from `reset`/`step` or a panic anywhere in the four methods is
/// contained to the instance: its next result carries the error and it is
/// reset on the following work item. Panics are caught after the process
/// panic hook has run, so the default hook still prints its
/// `thread '...' panicked` line to stderr next to the pool's `warn!` event.
/// Applications that want faults reported only through `tracing` should
/// install their own hook with [`std::panic::set_hook`].
///
/// # Example
///
/// ```rust,ignore
/// use envpool::prelude::*;
///
/// struct Counter {
///     count: u32,
/// }
///
/// impl PoolEnv for Counter {
///     fn reset(&mut self, _rng: &mut EnvRng) -> Result<(), EnvError> {
///         self.count = 0;
///         Ok(())
///     }
///
///     fn step(&mut self, _rng: &mut EnvRng, _action: ArrayViewD<'_, f32>) -> Result<(), EnvError> {
///         self.count += 1;
///         Ok(())
///     }
///
///     fn is_done(&self) -> bool {
///         self.count >= 10
///     }
///
///     fn emit_state(&self, slot: &mut SlotWriter<'_>) {
///         slot.observation_mut()[0] = self.count as f32;
///         slot.set_reward(1.0);
///     }
/// }
/// ```
pub trait PoolEnv: Send {
    /// Reinitialize internal state for a new episode
    fn reset(&mut self, rng: &mut EnvRng) -> Result<(), EnvError>;

    /// Advance one tick with an action matching the declared action space
    fn step(&mut self, rng: &mut EnvRng, action: ArrayViewD<'_, f32>) -> Result<(), EnvError>;

    /// Whether the last step ended the episode
    fn is_done(&self) -> bool;

    /// Write observation, reward and info fields into a zero-filled slot
    fn emit_state(&self, slot: &mut SlotWriter<'_>);
}

impl<E: PoolEnv + ?Sized> PoolEnv for Box<E> {
    fn reset(&mut self, rng: &mut EnvRng) -> Result<(), EnvError> {
        (**self).reset(rng)
    }

    fn step(&mut self, rng: &mut EnvRng, action: ArrayViewD<'_, f32>) -> Result<(), EnvError> {
        (**self).step(rng, action)
    }

    fn is_done(&self) -> bool {
        (**self).is_done()
    }

    fn emit_state(&self, slot: &mut SlotWriter<'_>) {
        (**self).emit_state(slot)
    }
}
