//! Deferred work that must not run within the current call.
//!
//! After a request settles, its UI handles are released on the next scheduling
//! opportunity instead of synchronously, so observers reacting to the settlement in
//! the same turn can still read them. A [`Scheduler`] decides what "next" means.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;

use tracing::warn;

use crate::utils::lock;

pub type Task = Box<dyn FnOnce() + Send + 'static>;

pub trait Scheduler: Send + Sync {
    /// Runs `task` later, never before `defer` returned.
    fn defer(&self, task: Task);
}

/// Spawns deferred tasks onto the current tokio runtime.
///
/// Outside of a runtime there is no later tick to spawn onto. Such tasks are kept and
/// spawned by the next `defer` that finds a runtime, or run by [`TokioScheduler::run_pending`].
#[derive(Debug, Default)]
pub struct TokioScheduler {
    backlog: ManualScheduler,
}

impl TokioScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs the tasks that were deferred outside of a runtime.
    pub fn run_pending(&self) -> usize {
        self.backlog.run_pending()
    }
}

impl Scheduler for TokioScheduler {
    fn defer(&self, task: Task) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(pending = self.backlog.pending() + 1, "no tokio runtime to defer task, keeping it for later");
            self.backlog.defer(task);
            return;
        };

        let backlog = std::mem::take(&mut *lock(&self.backlog.tasks));
        handle.spawn(async move {
            for task in backlog {
                task();
            }
            task();
        });
    }
}

/// Queues deferred tasks until [`ManualScheduler::run_pending`] is called.
///
/// Useful for driving requests from a custom event loop and for tests that need to
/// observe a request between settlement and eviction.
#[derive(Default)]
pub struct ManualScheduler {
    tasks: Mutex<VecDeque<Task>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        lock(&self.tasks).len()
    }

    /// Runs the tasks queued so far and returns how many ran.
    ///
    /// Tasks deferred while running are kept for the next call.
    pub fn run_pending(&self) -> usize {
        let tasks = std::mem::take(&mut *lock(&self.tasks));
        let count = tasks.len();
        for task in tasks {
            task();
        }
        count
    }
}

impl Scheduler for ManualScheduler {
    fn defer(&self, task: Task) {
        lock(&self.tasks).push_back(task);
    }
}

impl fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualScheduler").field("pending", &self.pending()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn manual_scheduler_runs_in_order() {
        let scheduler = Arc::new(ManualScheduler::new());
        let log = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let log = Arc::clone(&log);
            scheduler.defer(Box::new(move || lock(&log).push(i)));
        }

        assert_eq!(scheduler.pending(), 3);
        assert!(lock(&log).is_empty());

        assert_eq!(scheduler.run_pending(), 3);
        assert_eq!(*lock(&log), vec![0, 1, 2]);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn tasks_deferred_while_running_wait_for_next_run() {
        let scheduler = Arc::new(ManualScheduler::new());
        let counter = Arc::new(AtomicUsize::new(0));

        let inner_scheduler = Arc::clone(&scheduler);
        let inner_counter = Arc::clone(&counter);
        scheduler.defer(Box::new(move || {
            let counter = Arc::clone(&inner_counter);
            inner_scheduler.defer(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }));

        assert_eq!(scheduler.run_pending(), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.run_pending(), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn tokio_scheduler_runs_after_defer_returns() {
        let (sender, receiver) = futures::channel::oneshot::channel();
        let flag = Arc::new(AtomicUsize::new(0));

        let task_flag = Arc::clone(&flag);
        TokioScheduler::new().defer(Box::new(move || {
            task_flag.store(1, Ordering::SeqCst);
            let _ = sender.send(());
        }));

        assert_eq!(flag.load(Ordering::SeqCst), 0);
        receiver.await.unwrap();
        assert_eq!(flag.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn tokio_scheduler_without_runtime_never_runs_inline() {
        let scheduler = TokioScheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let task_counter = Arc::clone(&counter);
        scheduler.defer(Box::new(move || {
            task_counter.fetch_add(1, Ordering::SeqCst);
        }));

        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.run_pending(), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn tokio_scheduler_spawns_backlog_once_a_runtime_appears() {
        let scheduler = TokioScheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let early = Arc::clone(&counter);
        scheduler.defer(Box::new(move || {
            early.fetch_add(1, Ordering::SeqCst);
        }));

        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let (sender, receiver) = futures::channel::oneshot::channel();
        runtime.block_on(async {
            let late = Arc::clone(&counter);
            scheduler.defer(Box::new(move || {
                late.fetch_add(1, Ordering::SeqCst);
                let _ = sender.send(());
            }));
            receiver.await.unwrap();
        });

        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert_eq!(scheduler.run_pending(), 0);
    }
}
