//! The two synchronization points between the controller and the workers.
//!
//! - Inbound: work items, FIFO across all environments, on a crossbeam
//!   channel. A second channel carries the shutdown signal.
//! - Outbound: ids whose slot was just written, in a mutex-guarded deque that
//!   `recv` drains `n` at a time.

use crossbeam_channel::{select, unbounded, Receiver, Sender};
use ndarray::ArrayD;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::Instant;

/// One unit of work for a worker.
pub(crate) struct WorkItem {
    pub(crate) env_id: usize,
    /// `None` requests a reset
    pub(crate) action: Option<ArrayD<f32>>,
}

/// Sending half of the inbound queue, owned by the controller.
pub(crate) struct ActionQueue {
    tx: Sender<WorkItem>,
    shutdown_tx: Mutex<Option<Sender<()>>>,
}

/// Receiving half, cloned into every worker.
#[derive(Clone)]
pub(crate) struct WorkReceiver {
    rx: Receiver<WorkItem>,
    shutdown_rx: Receiver<()>,
}

pub(crate) fn action_queue() -> (ActionQueue, WorkReceiver) {
    let (tx, rx) = unbounded();
    let (shutdown_tx, shutdown_rx) = unbounded();
    (
        ActionQueue {
            tx,
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
        },
        WorkReceiver { rx, shutdown_rx },
    )
}

impl ActionQueue {
    /// Enqueue a work item; fails once every worker has exited
    pub(crate) fn push(&self, item: WorkItem) -> bool {
        self.tx.send(item).is_ok()
    }

    /// Disconnect the shutdown channel, waking every idle worker
    pub(crate) fn shutdown(&self) {
        self.shutdown_tx.lock().take();
    }
}

impl WorkReceiver {
    /// Block until work arrives; `None` once shutdown has begun
    pub(crate) fn next(&self) -> Option<WorkItem> {
        select! {
            recv(self.shutdown_rx) -> _ => None,
            recv(self.rx) -> item => item.ok(),
        }
    }
}

/// Entry of the outbound queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct ReadyEntry {
    pub(crate) env_id: usize,
    /// Instance generation when the result was written
    pub(crate) generation: u64,
}

/// Result of waiting on the ready queue.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum PopResult {
    /// Exactly the requested number of entries, oldest first
    Full(Vec<ReadyEntry>),
    /// The queue was closed; whatever was there, up to the request
    Closed(Vec<ReadyEntry>),
    /// Deadline passed; nothing taken
    TimedOut { ready: usize },
}

struct ReadyState {
    entries: VecDeque<ReadyEntry>,
    closed: bool,
}

/// Outbound queue of finished environments.
pub(crate) struct ReadyQueue {
    state: Mutex<ReadyState>,
    available: Condvar,
}

impl ReadyQueue {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Mutex::new(ReadyState {
                entries: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            available: Condvar::new(),
        }
    }

    /// Append an entry and wake waiters
    pub(crate) fn push(&self, entry: ReadyEntry) {
        self.state.lock().entries.push_back(entry);
        // Waiters may want different counts; each rechecks its own.
        self.available.notify_all();
    }

    /// Wait for `n` entries and take them in one step.
    ///
    /// Waiters are served as their condition becomes true; two concurrent
    /// callers never receive the same entry.
    pub(crate) fn pop_batch(&self, n: usize, deadline: Option<Instant>) -> PopResult {
        let mut state = self.state.lock();
        loop {
            if state.entries.len() >= n {
                return PopResult::Full(state.entries.drain(..n).collect());
            }
            if state.closed {
                let take = n.min(state.entries.len());
                return PopResult::Closed(state.entries.drain(..take).collect());
            }
            match deadline {
                Some(deadline) => {
                    if self.available.wait_until(&mut state, deadline).timed_out()
                        && state.entries.len() < n
                        && !state.closed
                    {
                        return PopResult::TimedOut {
                            ready: state.entries.len(),
                        };
                    }
                }
                None => self.available.wait(&mut state),
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Wake all waiters for good
    pub(crate) fn close(&self) {
        self.state.lock().closed = true;
        self.available.notify_all();
    }
}
