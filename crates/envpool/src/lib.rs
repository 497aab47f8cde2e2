//! # envpool
//!
//! An asynchronous environment pool for reinforcement learning in Rust.
//!
//! ## Overview
//!
//! envpool runs many independent environment instances on a fixed budget of
//! worker threads and hands their results to the consumer in batches:
//! - Environments implement the four-method [`PoolEnv`](env::PoolEnv) contract
//! - [`EnvPool::send`] queues actions, [`EnvPool::recv`] returns the first
//!   `batch_size` environments to finish, oldest first
//! - Results are read in place from pre-allocated slot buffers
//! - Finished episodes are reset automatically on the next action
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use envpool::prelude::*;
//!
//! let config = PoolConfig::new(8).with_threads(2).with_batch_size(4);
//! let mut pool = EnvPool::new(config, spec, |spec, env_id| MyEnv::new(spec, env_id))?;
//!
//! pool.async_reset()?;
//! loop {
//!     let batch = pool.recv()?;
//!     let ids = batch.env_ids();
//!     let obs = batch.observations();
//!     drop(batch);
//!     pool.send_batch(&ids, actions_for(&obs).view())?;
//! }
//! ```

pub mod config;
pub mod env;
pub mod pool;
pub mod slot;
pub mod spaces;
pub mod spec;

mod instance;
mod queue;
mod worker;

pub use config::PoolConfig;
pub use env::{EnvError, EnvRng, PoolEnv};
pub use instance::EnvState;
pub use pool::{ActionRecord, Batch, BatchIter, EnvPool, PoolStats};
pub use slot::{SlotView, SlotWriter};
pub use spec::{EnvConfig, EnvSpec};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::PoolConfig;
    pub use crate::env::{EnvError, EnvRng, PoolEnv};
    pub use crate::pool::{ActionRecord, Batch, EnvPool};
    pub use crate::slot::{SlotView, SlotWriter};
    pub use crate::spaces::{Box as BoxSpace, Discrete, DynSpace, Space};
    pub use crate::spec::{EnvConfig, EnvSpec};
    pub use crate::{PoolError, Result};
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Errors reported to the pool's consumer.
///
/// Environment faults are not in this list: they stay local to the faulting
/// instance and arrive as a flagged result (see [`SlotView::error`]).
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("Environment id {env_id} out of range (num_envs = {num_envs})")]
    EnvIdOutOfRange { env_id: usize, num_envs: usize },

    #[error("Environment {0} appears more than once in the same batch")]
    DuplicateEnvId(usize),

    #[error("Environment {env_id} is {state:?}, expected Idle")]
    NotIdle { env_id: usize, state: EnvState },

    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("Invalid action: {0}")]
    InvalidAction(String),

    #[error("Invalid batch size {requested} (num_envs = {num_envs})")]
    InvalidBatchSize { requested: usize, num_envs: usize },

    #[error("Requested {requested} results but only {pending} running or ready environments are unclaimed")]
    NotEnoughPending { requested: usize, pending: usize },

    #[error("Timed out with {ready} results ready")]
    Timeout { ready: usize },

    #[error("Pool is closed")]
    Closed,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PoolError>;
