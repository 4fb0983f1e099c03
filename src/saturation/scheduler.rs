//! Shared work queue and worker pool.
//!
//! Both concurrent phases (saturation over contexts, taxonomy linking over
//! nodes) use the same shape: a fixed set of workers on a `rayon` pool
//! draining one [`WorkQueue`]. The queue tracks how many items are in flight,
//! so "empty and nobody busy" is a reliable end-of-work signal; idle workers
//! sleep on a condition variable instead of polling.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};

use rayon::ThreadPool;

use crate::error::{ReasonResult, ReasonerError};
use crate::progress::ProgressHandle;

struct QueueState<T> {
    items: VecDeque<T>,
    busy: usize,
    halted: bool,
}

/// FIFO shared by all workers of one phase.
pub struct WorkQueue<T> {
    state: Mutex<QueueState<T>>,
    ready: Condvar,
}

impl<T> WorkQueue<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                busy: 0,
                halted: false,
            }),
            ready: Condvar::new(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, QueueState<T>> {
        self.state.lock().expect("work queue lock poisoned")
    }

    pub fn push(&self, item: T) {
        let mut state = self.lock();
        if state.halted {
            return;
        }
        state.items.push_back(item);
        self.ready.notify_one();
    }

    /// Block until an item is available or all work is finished.
    ///
    /// A returned item counts as in flight until [`WorkQueue::done`] is called.
    pub fn next(&self) -> Option<T> {
        let mut state = self.lock();
        loop {
            if state.halted {
                return None;
            }
            if let Some(item) = state.items.pop_front() {
                state.busy += 1;
                return Some(item);
            }
            if state.busy == 0 {
                self.ready.notify_all();
                return None;
            }
            state = self.ready.wait(state).expect("work queue lock poisoned");
        }
    }

    /// Mark one in-flight item finished. Items it produced must be pushed first.
    pub fn done(&self) {
        let mut state = self.lock();
        state.busy -= 1;
        if state.busy == 0 && state.items.is_empty() {
            self.ready.notify_all();
        }
    }

    /// Stop handing out items and wake every waiting worker.
    pub fn halt(&self) {
        self.lock().halted = true;
        self.ready.notify_all();
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }
}

impl<T> Default for WorkQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Run one worker per pool thread over `queue` until it drains.
///
/// Cancellation is checked after each dequeue, before the item is worked on,
/// so an item is either fully processed or not touched. The first error
/// halts the queue and is returned once every worker has exited.
pub fn run_workers<T, F>(
    pool: &ThreadPool,
    queue: &WorkQueue<T>,
    progress: &ProgressHandle,
    work: F,
) -> ReasonResult<()>
where
    T: Send,
    F: Fn(T) -> ReasonResult<()> + Sync,
{
    let failure: Mutex<Option<ReasonerError>> = Mutex::new(None);
    let cancelled = AtomicBool::new(false);
    let workers = pool.current_num_threads().max(1);

    pool.scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|_| {
                while let Some(item) = queue.next() {
                    if progress.is_cancelled() {
                        cancelled.store(true, Ordering::SeqCst);
                        queue.done();
                        queue.halt();
                        break;
                    }
                    let outcome = work(item);
                    queue.done();
                    if let Err(err) = outcome {
                        failure
                            .lock()
                            .expect("failure slot lock poisoned")
                            .get_or_insert(err);
                        queue.halt();
                        break;
                    }
                }
            });
        }
    });

    if let Some(err) = failure.into_inner().expect("failure slot lock poisoned") {
        return Err(err);
    }
    if cancelled.load(Ordering::SeqCst) {
        return Err(ReasonerError::Cancelled);
    }
    Ok(())
}

/// Build the worker pool. `threads == 0` means available parallelism.
pub fn build_pool(threads: usize) -> ReasonResult<ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("subsume-worker-{i}"))
        .build()
        .map_err(|e| ReasonerError::ThreadPool {
            message: e.to_string(),
        })
}
