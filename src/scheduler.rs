//! Bounded worker pool with a drain barrier.
//!
//! The [`Scheduler`] runs boxed jobs on a fixed-size rayon pool. Jobs may
//! submit further jobs (a directory job fans out into one job per file), so
//! completion is tracked with a pending-job counter rather than by joining
//! the initially submitted batch:
//!
//! - [`Scheduler::submit`] increments the counter *before* handing the job
//!   to the pool, so a parent job's children are always counted before the
//!   parent itself finishes.
//! - Each job decrements the counter when it ends, whether it returned `Ok`,
//!   returned `Err` or panicked.
//! - [`Scheduler::drain`] blocks until the counter reaches zero.
//!
//! Failures are isolated: an `Err` or a panic is logged and counted and never
//! reaches sibling jobs, the pool or the caller of `drain`.
//!
//! # Example
//!
//! ```no_run
//! use reddit_split::scheduler::Scheduler;
//!
//! let scheduler = Scheduler::new(4)?;
//! let s = scheduler.clone();
//! scheduler.submit("parent", move || {
//!     for i in 0..10 {
//!         s.submit(format!("child-{i}"), move || Ok(()));
//!     }
//!     Ok(())
//! });
//! scheduler.drain();
//! # Ok::<(), anyhow::Error>(())
//! ```

use crate::error::ConfigError;
use anyhow::Result;
use log::{debug, error};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

struct Inner {
    pool: ThreadPool,
    pending: Mutex<usize>,
    idle: Condvar,
    completed: AtomicU64,
    failed: AtomicU64,
}

impl Inner {
    fn pending(&self) -> MutexGuard<'_, usize> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Decrements the pending count when a job ends, on every exit path.
struct Completion<'a>(&'a Inner);

impl Drop for Completion<'_> {
    fn drop(&mut self) {
        self.0.completed.fetch_add(1, Ordering::Relaxed);
        let mut pending = self.0.pending();
        *pending -= 1;
        if *pending == 0 {
            self.0.idle.notify_all();
        }
    }
}

/// Cheaply cloneable handle to a shared worker pool.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    /// Build a pool with exactly `pool_size` worker threads.
    ///
    /// # Errors
    /// [`ConfigError::ZeroPoolSize`] for an empty pool, or
    /// [`ConfigError::Pool`] if the threads cannot be spawned.
    pub fn new(pool_size: usize) -> Result<Self, ConfigError> {
        if pool_size == 0 {
            return Err(ConfigError::ZeroPoolSize);
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(pool_size)
            .thread_name(|i| format!("reddit-split-{i}"))
            .build()
            .map_err(|e| ConfigError::Pool(e.to_string()))?;
        Ok(Self {
            inner: Arc::new(Inner {
                pool,
                pending: Mutex::new(0),
                idle: Condvar::new(),
                completed: AtomicU64::new(0),
                failed: AtomicU64::new(0),
            }),
        })
    }

    /// Number of worker threads.
    #[must_use]
    pub fn pool_size(&self) -> usize {
        self.inner.pool.current_num_threads()
    }

    /// Enqueue `job`. Never blocks.
    ///
    /// Jobs start in submission order; with a single worker they also finish
    /// in that order. `name` is only used in log lines.
    pub fn submit<F>(&self, name: impl Into<String>, job: F)
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        let name = name.into();
        *self.inner.pending() += 1;
        let inner = Arc::clone(&self.inner);
        self.inner.pool.spawn_fifo(move || {
            let _done = Completion(&inner);
            debug!("job `{name}` started");
            match catch_unwind(AssertUnwindSafe(job)) {
                Ok(Ok(())) => debug!("job `{name}` finished"),
                Ok(Err(e)) => {
                    inner.failed.fetch_add(1, Ordering::Relaxed);
                    error!("job `{name}` failed: {e:#}");
                }
                Err(panic) => {
                    inner.failed.fetch_add(1, Ordering::Relaxed);
                    error!("job `{name}` panicked: {}", panic_message(panic.as_ref()));
                }
            }
        });
    }

    /// Block until every submitted job, including jobs submitted by other
    /// jobs while this call waits, has finished.
    ///
    /// Must not be called from inside a job: the calling worker would wait
    /// on itself.
    pub fn drain(&self) {
        let mut pending = self.inner.pending();
        while *pending > 0 {
            pending = self
                .inner
                .idle
                .wait(pending)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Jobs currently queued or running.
    #[must_use]
    pub fn pending(&self) -> usize {
        *self.inner.pending()
    }

    /// Jobs that have ended (successfully or not).
    #[must_use]
    pub fn completed(&self) -> u64 {
        self.inner.completed.load(Ordering::Relaxed)
    }

    /// Jobs that returned an error or panicked.
    #[must_use]
    pub fn failed(&self) -> u64 {
        self.inner.failed.load(Ordering::Relaxed)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
