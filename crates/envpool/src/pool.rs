//! The pool controller.
//!
//! `EnvPool` owns the instances, their slots and the worker threads. The
//! consumer drives it with two calls:
//! - [`EnvPool::send`] queues one action per environment and returns at once
//! - [`EnvPool::recv`] waits for the first `batch_size` environments to
//!   finish and lends their slots out as a [`Batch`]
//!
//! `send` takes `&mut self` and a `Batch` borrows the pool, so a result can
//! never be overwritten while the consumer is still reading it.

use crate::config::PoolConfig;
use crate::env::PoolEnv;
use crate::instance::{EnvState, Instance, InstanceCell};
use crate::queue::{action_queue, ActionQueue, PopResult, ReadyEntry, ReadyQueue, WorkItem};
use crate::slot::{SlotArena, SlotView};
use crate::spec::EnvSpec;
use crate::worker::{spawn_workers, Counters, Shared};
use crate::{PoolError, Result};
use ndarray::{Array2, ArrayD, ArrayView1, ArrayView2, IxDyn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// One action addressed to one environment
#[derive(Clone, Debug)]
pub struct ActionRecord {
    pub env_id: usize,
    pub action: ArrayD<f32>,
}

impl ActionRecord {
    pub fn new(env_id: usize, action: ArrayD<f32>) -> Self {
        Self { env_id, action }
    }

    /// Action for a `Discrete` action space
    pub fn discrete(env_id: usize, action: usize) -> Self {
        Self::new(env_id, ArrayD::from_elem(IxDyn(&[1]), action as f32))
    }
}

/// Counters accumulated since the pool was built
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Completed `Step` calls
    pub steps: u64,
    /// Completed `Reset` calls, automatic or requested
    pub resets: u64,
    /// Work items that ended in an environment fault
    pub faults: u64,
    /// Ready entries discarded because they no longer matched their instance
    pub stale: u64,
}

/// Asynchronous pool of environment instances.
///
/// Instances are stepped by `num_threads` worker threads, independent of
/// `num_envs`. Results come back in the order they finish.
pub struct EnvPool<E: PoolEnv + 'static> {
    shared: Arc<Shared<E>>,
    actions: ActionQueue,
    workers: Vec<JoinHandle<()>>,
    config: PoolConfig,
    num_threads: usize,
    batch_size: usize,
    /// `Running` or `Ready` instances not yet reserved by a waiting `recv`
    pending: AtomicUsize,
    closed: AtomicBool,
}

impl<E: PoolEnv + 'static> EnvPool<E> {
    /// Build `config.num_envs` instances with `factory` and start the workers.
    ///
    /// Instance `i` is created by `factory(&spec, i)` and seeded with
    /// `config.seed + i`. Instances start without an episode: the first
    /// action sent to each one (or [`EnvPool::async_reset`]) resets it.
    pub fn new<F>(config: PoolConfig, spec: EnvSpec, factory: F) -> Result<Self>
    where
        F: Fn(&EnvSpec, usize) -> E + Send + Sync,
    {
        config.validate()?;
        spec.validate()?;
        let num_envs = config.num_envs;
        let num_threads = config.resolved_threads();
        let batch_size = config.resolved_batch_size();

        let envs: Vec<E> = (0..num_envs)
            .into_par_iter()
            .map(|env_id| factory(&spec, env_id))
            .collect();
        let instances = envs
            .into_iter()
            .enumerate()
            .map(|(env_id, env)| {
                InstanceCell::new(Instance::new(env, config.seed.wrapping_add(env_id as u64)))
            })
            .collect();

        let shared = Arc::new(Shared {
            slots: SlotArena::new(num_envs, &spec),
            spec,
            instances,
            ready: ReadyQueue::with_capacity(num_envs),
            counters: Counters::default(),
        });
        let (actions, rx) = action_queue();
        let workers = spawn_workers(&shared, rx, num_threads)?;

        tracing::debug!(
            env = %shared.spec.name,
            num_envs,
            num_threads,
            batch_size,
            seed = config.seed,
            "environment pool started"
        );

        Ok(Self {
            shared,
            actions,
            workers,
            config,
            num_threads,
            batch_size,
            pending: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        })
    }

    /// Number of environment instances
    pub fn num_envs(&self) -> usize {
        self.config.num_envs
    }

    /// Number of worker threads
    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// Results returned by [`EnvPool::recv`]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn spec(&self) -> &EnvSpec {
        &self.shared.spec
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Lifecycle state of one instance
    pub fn state(&self, env_id: usize) -> Option<EnvState> {
        self.shared.instances.get(env_id).map(|cell| cell.state.load())
    }

    /// Results queued and not yet claimed by `recv`
    pub fn num_ready(&self) -> usize {
        self.shared.ready.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> PoolStats {
        let c = &self.shared.counters;
        PoolStats {
            steps: c.steps.load(Ordering::Relaxed),
            resets: c.resets.load(Ordering::Relaxed),
            faults: c.faults.load(Ordering::Relaxed),
            stale: c.stale.load(Ordering::Relaxed),
        }
    }

    /// Queue one action per listed environment.
    ///
    /// The whole batch is validated before anything is queued: ids must be in
    /// range, distinct and `Idle`, and every action must fit the action space.
    /// Environments whose episode has ended reset instead of stepping.
    pub fn send(&mut self, actions: Vec<ActionRecord>) -> Result<()> {
        self.ensure_open()?;
        self.check_targets(actions.iter().map(|a| a.env_id))?;
        for record in &actions {
            self.shared.spec.action_space.validate(record.action.view())?;
        }
        for record in actions {
            self.dispatch(record.env_id, Some(record.action))?;
        }
        Ok(())
    }

    /// Queue actions given as rows of a matrix, row `i` for `env_ids[i]`.
    pub fn send_batch(&mut self, env_ids: &[usize], actions: ArrayView2<'_, f32>) -> Result<()> {
        let action_shape = self.shared.spec.action_space.shape().to_vec();
        let width = self.shared.spec.action_space.num_elements();
        if actions.nrows() != env_ids.len() || actions.ncols() != width {
            return Err(PoolError::ShapeMismatch {
                expected: vec![env_ids.len(), width],
                actual: actions.shape().to_vec(),
            });
        }
        let records = env_ids
            .iter()
            .zip(actions.outer_iter())
            .map(|(&env_id, row)| {
                row.to_owned()
                    .into_shape(IxDyn(&action_shape))
                    .map(|action| ActionRecord::new(env_id, action))
                    .map_err(|_| PoolError::ShapeMismatch {
                        expected: action_shape.clone(),
                        actual: vec![width],
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        self.send(records)
    }

    /// Queue an explicit reset for each listed `Idle` environment
    pub fn reset(&mut self, env_ids: &[usize]) -> Result<()> {
        self.ensure_open()?;
        self.check_targets(env_ids.iter().copied())?;
        for &env_id in env_ids {
            self.dispatch(env_id, None)?;
        }
        Ok(())
    }

    /// Queue a reset for every environment; all must be `Idle`
    pub fn async_reset(&mut self) -> Result<()> {
        let ids: Vec<usize> = (0..self.num_envs()).collect();
        self.reset(&ids)
    }

    /// Send, then wait for as many results as actions were sent.
    ///
    /// With every environment driven through `step` this behaves like a
    /// synchronous vectorized environment, although results may come back
    /// in a different order than the actions. No actions gives an empty batch.
    pub fn step(&mut self, actions: Vec<ActionRecord>) -> Result<Batch<'_>> {
        let n = actions.len();
        if n == 0 {
            self.ensure_open()?;
            return Ok(Batch {
                slots: &self.shared.slots,
                entries: Vec::new(),
            });
        }
        self.send(actions)?;
        self.recv_n(n)
    }

    /// Wait for `batch_size` results
    pub fn recv(&self) -> Result<Batch<'_>> {
        self.claim(self.batch_size, None)
    }

    /// Wait for `n` results
    pub fn recv_n(&self, n: usize) -> Result<Batch<'_>> {
        self.claim(n, None)
    }

    /// Wait at most `timeout` for `n` results; on timeout nothing is claimed
    pub fn recv_timeout(&self, n: usize, timeout: Duration) -> Result<Batch<'_>> {
        self.claim(n, Some(Instant::now() + timeout))
    }

    /// Stop the pool.
    ///
    /// No further actions are accepted, idle workers exit, steps already
    /// running finish, and any `recv` blocked in another thread returns with
    /// the results that are ready. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.actions.shutdown();
        self.shared.ready.close();
        tracing::debug!(env = %self.shared.spec.name, "environment pool closing");
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(PoolError::Closed)
        } else {
            Ok(())
        }
    }

    fn check_targets(&self, env_ids: impl Iterator<Item = usize>) -> Result<()> {
        let num_envs = self.num_envs();
        let mut seen = vec![false; num_envs];
        for env_id in env_ids {
            if env_id >= num_envs {
                return Err(PoolError::EnvIdOutOfRange { env_id, num_envs });
            }
            if std::mem::replace(&mut seen[env_id], true) {
                return Err(PoolError::DuplicateEnvId(env_id));
            }
            let state = self.shared.instances[env_id].state.load();
            if state != EnvState::Idle {
                return Err(PoolError::NotIdle { env_id, state });
            }
        }
        Ok(())
    }

    fn dispatch(&self, env_id: usize, action: Option<ArrayD<f32>>) -> Result<()> {
        self.shared.instances[env_id]
            .state
            .transition(EnvState::Idle, EnvState::Running)
            .map_err(|state| PoolError::NotIdle { env_id, state })?;
        self.pending.fetch_add(1, Ordering::AcqRel);
        if !self.actions.push(WorkItem { env_id, action }) {
            return Err(PoolError::Closed);
        }
        Ok(())
    }

    fn claim(&self, n: usize, deadline: Option<Instant>) -> Result<Batch<'_>> {
        self.ensure_open()?;
        let num_envs = self.num_envs();
        if n == 0 || n > num_envs {
            return Err(PoolError::InvalidBatchSize {
                requested: n,
                num_envs,
            });
        }
        // Reserve before waiting so concurrent callers never wait on the
        // same outstanding results.
        self.pending
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |p| p.checked_sub(n))
            .map_err(|pending| PoolError::NotEnoughPending {
                requested: n,
                pending,
            })?;

        let entries = match self.shared.ready.pop_batch(n, deadline) {
            PopResult::Full(entries) => entries,
            PopResult::Closed(entries) => {
                tracing::debug!(requested = n, got = entries.len(), "recv cut short by close");
                entries
            }
            PopResult::TimedOut { ready } => {
                self.pending.fetch_add(n, Ordering::AcqRel);
                return Err(PoolError::Timeout { ready });
            }
        };

        let mut claimed = Vec::with_capacity(entries.len());
        for entry in entries {
            if self.take_ready(entry) {
                claimed.push(entry);
            } else {
                self.shared.counters.stale.fetch_add(1, Ordering::Relaxed);
            }
        }
        if claimed.len() < n {
            self.pending.fetch_add(n - claimed.len(), Ordering::AcqRel);
        }

        Ok(Batch {
            slots: &self.shared.slots,
            entries: claimed,
        })
    }

    /// Move a popped instance from `Ready` to `Idle` if the entry is current
    fn take_ready(&self, entry: ReadyEntry) -> bool {
        let cell = &self.shared.instances[entry.env_id];
        if cell.state.load() != EnvState::Ready {
            tracing::warn!(env_id = entry.env_id, "discarding ready entry for an instance not in Ready");
            return false;
        }
        // SAFETY: a `Ready` instance is not touched by any worker.
        let generation = unsafe { cell.get() }.generation();
        if generation != entry.generation {
            tracing::warn!(
                env_id = entry.env_id,
                expected = generation,
                found = entry.generation,
                "discarding stale ready entry"
            );
            return false;
        }
        cell.state.transition(EnvState::Ready, EnvState::Idle).is_ok()
    }
}

impl<E: PoolEnv + 'static> Drop for EnvPool<E> {
    fn drop(&mut self) {
        self.close();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                tracing::error!("worker thread panicked");
            }
        }
    }
}

/// Results claimed by one `recv`, oldest first.
///
/// Views read the pool's slot buffers directly.
pub struct Batch<'a> {
    slots: &'a SlotArena,
    entries: Vec<ReadyEntry>,
}

impl<'a> Batch<'a> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Result at position `idx`
    pub fn get(&self, idx: usize) -> Option<SlotView<'a>> {
        self.entries.get(idx).map(|e| self.view(e.env_id))
    }

    pub fn iter(&self) -> BatchIter<'a, '_> {
        BatchIter {
            slots: self.slots,
            entries: self.entries.iter(),
        }
    }

    /// Environment ids, in batch order
    pub fn env_ids(&self) -> Vec<usize> {
        self.entries.iter().map(|e| e.env_id).collect()
    }

    /// Observations stacked into one `[len, obs_size]` matrix (copies)
    pub fn observations(&self) -> Array2<f32> {
        let width = self.iter().next().map_or(0, |v| v.obs().len());
        let mut out = Array2::zeros((self.len(), width));
        for (mut row, view) in out.outer_iter_mut().zip(self.iter()) {
            row.assign(&ArrayView1::from(view.obs()));
        }
        out
    }

    pub fn rewards(&self) -> Vec<f32> {
        self.iter().map(|v| v.reward()).collect()
    }

    pub fn dones(&self) -> Vec<bool> {
        self.iter().map(|v| v.done()).collect()
    }

    fn view(&self, env_id: usize) -> SlotView<'a> {
        // SAFETY: every id in the batch is `Idle` and stays so while the batch
        // borrows the pool, since only `&mut EnvPool` can queue work.
        unsafe { self.slots.view(env_id) }
    }
}

/// Iterator over the views of a [`Batch`]
pub struct BatchIter<'a, 'b> {
    slots: &'a SlotArena,
    entries: std::slice::Iter<'b, ReadyEntry>,
}

impl<'a> Iterator for BatchIter<'a, '_> {
    type Item = SlotView<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.entries.next()?;
        // SAFETY: see `Batch::view`.
        Some(unsafe { self.slots.view(entry.env_id) })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

impl ExactSizeIterator for BatchIter<'_, '_> {}

impl<'a, 'b> IntoIterator for &'b Batch<'a> {
    type Item = SlotView<'a>;
    type IntoIter = BatchIter<'a, 'b>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl std::fmt::Debug for Batch<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Batch").field("env_ids", &self.env_ids()).finish()
    }
}
