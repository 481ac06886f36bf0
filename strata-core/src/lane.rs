//! Execution lanes.
//!
//! A lane is the single thread a context is confined to: a dedicated OS
//! thread draining a single-consumer job queue. All reads and mutations of
//! a context's entities execute as jobs on its lane. Submitting from the
//! lane's own thread runs the job inline, which is what makes transactions
//! reentrant without ever re-entering the queue.

use crate::{StackError, StackResult};
use parking_lot::Mutex;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::mpsc;
use std::thread::{self, JoinHandle, ThreadId};
use tracing::{debug, warn};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A single-consumer task queue pinned to one thread.
pub(crate) struct Lane {
    name: String,
    sender: Mutex<Option<mpsc::Sender<Job>>>,
    thread_id: ThreadId,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Lane {
    /// Spawns the lane thread and returns the handle used to submit work.
    pub(crate) fn spawn(name: impl Into<String>) -> StackResult<Self> {
        let name = name.into();
        let (sender, receiver) = mpsc::channel::<Job>();

        let thread_name = name.clone();
        let handle = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                debug!(lane = %thread_name, "lane started");
                for job in receiver {
                    // A panicking job must not take the lane down with it;
                    // the submitter observes the aborted reply channel.
                    if catch_unwind(AssertUnwindSafe(job)).is_err() {
                        warn!(lane = %thread_name, "job panicked on lane");
                    }
                }
                debug!(lane = %thread_name, "lane stopped");
            })
            .map_err(|source| StackError::LaneStart {
                name: name.clone(),
                source,
            })?;

        Ok(Self {
            name,
            thread_id: handle.thread().id(),
            sender: Mutex::new(Some(sender)),
            handle: Mutex::new(Some(handle)),
        })
    }

    /// The lane's name, used in diagnostics.
    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// Whether the calling thread is this lane's thread.
    pub(crate) fn is_current(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    /// Runs `job` on the lane and blocks until it completes.
    ///
    /// When called from the lane's own thread the job executes inline:
    /// never enqueued a second time, never deadlocked.
    pub(crate) fn run_sync<R, F>(&self, job: F) -> StackResult<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.is_current() {
            return Ok(job());
        }

        let (reply_tx, reply_rx) = mpsc::channel();
        self.submit(Box::new(move || {
            let _ = reply_tx.send(job());
        }))?;

        reply_rx
            .recv()
            .map_err(|_| StackError::LaneClosed(self.name.clone()))
    }

    /// Enqueues `job` without waiting for it.
    pub(crate) fn run_async<F>(&self, job: F) -> StackResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit(Box::new(job))
    }

    fn submit(&self, job: Job) -> StackResult<()> {
        let sender = self.sender.lock();
        match sender.as_ref() {
            Some(tx) => tx
                .send(job)
                .map_err(|_| StackError::LaneClosed(self.name.clone())),
            None => Err(StackError::LaneClosed(self.name.clone())),
        }
    }
}

impl Drop for Lane {
    fn drop(&mut self) {
        // Closing the queue lets the worker drain and exit.
        self.sender.lock().take();
        if let Some(handle) = self.handle.lock().take() {
            if !self.is_current() {
                let _ = handle.join();
            }
        }
    }
}

impl std::fmt::Debug for Lane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lane").field("name", &self.name).finish()
    }
}
