//! Worker threads.
//!
//! Each worker pops one work item at a time, runs it against the instance it
//! names, publishes the instance as `Ready` and pushes it to the ready queue.

use crate::env::PoolEnv;
use crate::instance::{EnvState, InstanceCell, Outcome};
use crate::queue::{ReadyEntry, ReadyQueue, WorkReceiver};
use crate::slot::SlotArena;
use crate::spec::EnvSpec;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

#[derive(Default)]
pub(crate) struct Counters {
    pub(crate) steps: AtomicU64,
    pub(crate) resets: AtomicU64,
    pub(crate) faults: AtomicU64,
    pub(crate) stale: AtomicU64,
}

/// State shared by the controller and all workers.
pub(crate) struct Shared<E> {
    pub(crate) spec: EnvSpec,
    pub(crate) instances: Box<[InstanceCell<E>]>,
    pub(crate) slots: SlotArena,
    pub(crate) ready: ReadyQueue,
    pub(crate) counters: Counters,
}

pub(crate) fn spawn_workers<E: PoolEnv + 'static>(
    shared: &Arc<Shared<E>>,
    rx: WorkReceiver,
    num_threads: usize,
) -> std::io::Result<Vec<JoinHandle<()>>> {
    (0..num_threads)
        .map(|worker_id| {
            let shared = Arc::clone(shared);
            let rx = rx.clone();
            thread::Builder::new()
                .name(format!("envpool-worker-{worker_id}"))
                .spawn(move || run_worker(worker_id, &shared, &rx))
        })
        .collect()
}

fn run_worker<E: PoolEnv>(worker_id: usize, shared: &Shared<E>, rx: &WorkReceiver) {
    tracing::debug!(worker_id, "worker started");

    while let Some(item) = rx.next() {
        let env_id = item.env_id;
        debug_assert!(env_id < shared.slots.num_slots());
        let cell = &shared.instances[env_id];

        // SAFETY: the controller moved this instance to `Running` before
        // queueing it, and only one work item per instance is ever queued.
        let instance = unsafe { cell.get_mut() };
        let mut slot = unsafe { shared.slots.writer(env_id) };

        let outcome = instance.execute(
            item.action.as_ref().map(|a| a.view()),
            &mut slot,
            &shared.spec.config,
        );
        match outcome {
            Outcome::Step => shared.counters.steps.fetch_add(1, Ordering::Relaxed),
            Outcome::Reset => shared.counters.resets.fetch_add(1, Ordering::Relaxed),
            Outcome::Fault => {
                tracing::warn!(
                    env = %shared.spec.name,
                    env_id,
                    error = slot.header_mut().error.as_deref().unwrap_or_default(),
                    "environment fault, instance will be reset"
                );
                shared.counters.faults.fetch_add(1, Ordering::Relaxed)
            }
        };
        let generation = instance.generation();

        if let Err(found) = cell.state.transition(EnvState::Running, EnvState::Ready) {
            tracing::error!(env_id, ?found, "instance left Running while executing");
        }
        shared.ready.push(ReadyEntry { env_id, generation });
    }

    tracing::debug!(worker_id, "worker stopped");
}
