//! Deferred-callback scheduler
//!
//! One lazily spawned worker thread runs submitted closures in expiration
//! order. The worker waits on a condvar bounded by the next expiration, so
//! an idle scheduler never polls and an earlier submission wakes it at once.

use crate::config::SchedulerConfig;
use crate::error::{SchedulerError, SchedulerResult};
use crate::task::DeferredTask;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::any::Any;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, trace};

/// Scheduler statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Tasks accepted into the queue
    pub tasks_scheduled: u64,

    /// Tasks the worker has finished running
    pub tasks_executed: u64,

    /// Tasks still waiting in the queue
    pub pending: usize,
}

/// State protected by the scheduler mutex
struct State {
    /// Pending tasks, earliest expiration on top (min-heap)
    queue: BinaryHeap<Reverse<DeferredTask>>,
    /// Set once shutdown begins, never cleared
    shutdown: bool,
    /// Worker handle, present from the first successful spawn until shutdown
    worker: Option<JoinHandle<()>>,
    /// Whether a worker was ever spawned
    started: bool,
    /// Next insertion sequence number
    next_seq: u64,
}

/// State shared between the scheduler handle and its worker
struct Shared {
    state: Mutex<State>,
    /// Wakes the worker on new submissions and on shutdown
    notify: Condvar,
    tasks_scheduled: AtomicU64,
    tasks_executed: AtomicU64,
}

impl Shared {
    /// Worker thread main loop
    fn run_loop(&self) {
        let mut state = self.state.lock();

        loop {
            if state.shutdown {
                break;
            }

            // Drain every expired task. The lock is released while a task
            // runs so the task can itself call `schedule`.
            while !state.shutdown
                && state
                    .queue
                    .peek()
                    .is_some_and(|Reverse(task)| task.is_expired())
            {
                let Some(Reverse(task)) = state.queue.pop() else {
                    break;
                };
                trace!(expiration = ?task.expiration(), "Running deferred task");
                MutexGuard::unlocked(&mut state, || task.run());
                self.tasks_executed.fetch_add(1, Ordering::Relaxed);
            }

            if state.shutdown {
                break;
            }

            // Sleep until the next expiration or a new submission. Whatever
            // woke us, the loop re-checks shutdown and the queue head.
            let timeout = state
                .queue
                .peek()
                .map(|Reverse(next)| next.time_until_expiration());
            match timeout {
                Some(timeout) => {
                    self.notify.wait_for(&mut state, timeout);
                }
                None => self.notify.wait(&mut state),
            }
        }

        debug!(pending = state.queue.len(), "Scheduler worker exiting");
    }
}

/// Runs deferred callbacks, one at a time, on a single background thread.
///
/// Construction does no background work; the worker is spawned by the first
/// submission. Dropping the scheduler shuts it down: tasks still queued are
/// dropped without running, a task already running finishes first.
///
/// A callback that panics terminates the worker. The panic is not caught;
/// every task queued after it will never run, and the panic is reported when
/// the scheduler shuts down. A callback that never returns blocks every later
/// task.
pub struct Scheduler {
    shared: Arc<Shared>,
    config: SchedulerConfig,
}

impl Scheduler {
    /// Create a scheduler with the default configuration
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    /// Create a scheduler with a custom configuration
    pub fn with_config(config: SchedulerConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    queue: BinaryHeap::new(),
                    shutdown: false,
                    worker: None,
                    started: false,
                    next_seq: 0,
                }),
                notify: Condvar::new(),
                tasks_scheduled: AtomicU64::new(0),
                tasks_executed: AtomicU64::new(0),
            }),
            config,
        }
    }

    /// Schedule `work` to run once `delay` has elapsed.
    ///
    /// Never blocks on task execution and never fails. A submission made
    /// after shutdown has begun is accepted but will not run.
    pub fn schedule<F>(&self, work: F, delay: Duration)
    where
        F: FnOnce() + Send + 'static,
    {
        self.enqueue(DeferredTask::new(work, delay));
    }

    /// Schedule `work` to run at or after `expiration`.
    ///
    /// An instant in the past makes the task eligible immediately.
    pub fn schedule_at<F>(&self, work: F, expiration: Instant)
    where
        F: FnOnce() + Send + 'static,
    {
        self.enqueue(DeferredTask::at(work, expiration));
    }

    /// Like [`schedule`](Self::schedule), but rejects the task when it could
    /// never run: once shutdown has begun, when the worker thread cannot be
    /// spawned, or after a panicking callback has stopped the worker.
    pub fn try_schedule<F>(&self, work: F, delay: Duration) -> SchedulerResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let task = DeferredTask::new(work, delay);
        {
            let mut state = self.shared.state.lock();

            if state.shutdown {
                return Err(SchedulerError::ShutDown);
            }
            // Only a panic ends the worker before shutdown takes its handle
            let finished = state.worker.as_ref().map(JoinHandle::is_finished);
            match finished {
                Some(true) => return Err(SchedulerError::WorkerStopped),
                Some(false) => {}
                None => {
                    state.worker = Some(self.spawn_worker()?);
                    state.started = true;
                }
            }

            self.push_locked(&mut state, task);
        }

        self.shared.notify.notify_one();
        Ok(())
    }

    /// Queue a task and wake the worker. Never fails: after shutdown, or if
    /// the worker cannot be spawned, the task simply stays queued.
    fn enqueue(&self, task: DeferredTask) {
        {
            let mut state = self.shared.state.lock();

            if state.shutdown {
                trace!("Deferred task submitted after shutdown; it will not run");
            } else if state.worker.is_none() {
                match self.spawn_worker() {
                    Ok(handle) => {
                        state.worker = Some(handle);
                        state.started = true;
                    }
                    // The task stays queued; the next submission retries the spawn
                    Err(e) => {
                        error!(
                            error = %e,
                            thread = %self.config.thread_name,
                            "Failed to spawn scheduler worker"
                        );
                    }
                }
            }

            self.push_locked(&mut state, task);
        }

        // Wake the worker; the new task may expire before the one it sleeps on
        self.shared.notify.notify_one();
    }

    fn push_locked(&self, state: &mut State, task: DeferredTask) {
        let seq = state.next_seq;
        state.next_seq += 1;
        let task = task.with_sequence(seq);
        trace!(seq, expiration = ?task.expiration(), "Deferred task scheduled");
        state.queue.push(Reverse(task));
        self.shared.tasks_scheduled.fetch_add(1, Ordering::Relaxed);
    }

    fn spawn_worker(&self) -> std::io::Result<JoinHandle<()>> {
        let shared = Arc::clone(&self.shared);
        let handle = self.config.thread_builder().spawn(move || {
            shared.run_loop();
        })?;
        debug!(thread = %self.config.thread_name, "Scheduler worker started");
        Ok(handle)
    }

    /// Shut the scheduler down and wait for the worker to exit.
    ///
    /// Tasks still queued are dropped without running. Idempotent, and safe
    /// to call when no task was ever scheduled. When called from inside a
    /// running callback the worker is not joined; it exits once the callback
    /// returns.
    pub fn shutdown(&self) {
        let (worker, abandoned) = {
            let mut state = self.shared.state.lock();
            state.shutdown = true;
            (state.worker.take(), std::mem::take(&mut state.queue))
        };
        self.shared.notify.notify_all();

        if !abandoned.is_empty() {
            debug!(abandoned = abandoned.len(), "Dropping pending deferred tasks");
        }
        // Dropped outside the lock: a task's captures may run arbitrary Drop code
        drop(abandoned);

        let Some(handle) = worker else {
            return;
        };

        if handle.thread().id() == thread::current().id() {
            debug!("Scheduler shut down from its own worker; not joining");
            return;
        }

        if let Err(payload) = handle.join() {
            error!(panic = panic_message(&*payload), "Scheduler worker panicked");
        }
    }

    /// Number of tasks waiting in the queue
    pub fn pending_count(&self) -> usize {
        self.shared.state.lock().queue.len()
    }

    /// Whether the worker thread has been spawned
    pub fn is_started(&self) -> bool {
        self.shared.state.lock().started
    }

    /// Whether shutdown has begun
    pub fn is_shut_down(&self) -> bool {
        self.shared.state.lock().shutdown
    }

    /// Configuration this scheduler was created with
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Get scheduler statistics
    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            tasks_scheduled: self.shared.tasks_scheduled.load(Ordering::Relaxed),
            tasks_executed: self.shared.tasks_executed.load(Ordering::Relaxed),
            pending: self.pending_count(),
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}
