//! Deferred work and the build-end barrier.
//!
//! Image conversions are started on the rayon pool the moment their asset
//! ids are handed out. Each started job is represented by a [`PendingTask`]
//! whose result arrives over its own channel. Tasks are collected into a
//! [`TaskQueue`] and joined once, at build end.

use crate::loader::LoadError;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver};

/// Handle to one job running on the worker pool.
#[derive(Debug)]
pub struct PendingTask {
    label: String,
    rx: Receiver<Result<(), LoadError>>,
}

impl PendingTask {
    /// Start `job` on the global rayon pool.
    ///
    /// A panicking job sends nothing, so [`wait`](Self::wait) reports it as
    /// abandoned instead of the panic taking down the pool.
    pub fn spawn<F>(label: impl Into<String>, job: F) -> Self
    where
        F: FnOnce() -> Result<(), LoadError> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        rayon::spawn(move || {
            if let Ok(result) = panic::catch_unwind(AssertUnwindSafe(job)) {
                // The receiver may already be gone if the build was abandoned.
                let _ = tx.send(result);
            }
        });
        Self {
            label: label.into(),
            rx,
        }
    }

    /// Block until the job has finished.
    pub fn wait(self) -> Result<(), LoadError> {
        match self.rx.recv() {
            Ok(result) => result,
            Err(_) => Err(LoadError::TaskAbandoned(self.label)),
        }
    }
}

/// Ordered collection of outstanding tasks.
#[derive(Debug, Default)]
pub struct TaskQueue {
    tasks: Vec<PendingTask>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, task: PendingTask) {
        self.tasks.push(task);
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Wait for every task, then report the first failure in queue order.
    ///
    /// Returns the number of tasks drained.
    pub fn join_all(&mut self) -> Result<usize, LoadError> {
        let tasks = std::mem::take(&mut self.tasks);
        let count = tasks.len();
        let mut first_error = None;
        for task in tasks {
            if let Err(e) = task.wait() {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(count),
        }
    }
}

impl Extend<PendingTask> for TaskQueue {
    fn extend<I: IntoIterator<Item = PendingTask>>(&mut self, iter: I) {
        self.tasks.extend(iter);
    }
}
