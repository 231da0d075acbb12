//! Counted join-group for work that must finish before shutdown.
//!
//! [`PersistTracker`] counts live [`TaskGuard`]s. A guard is taken when work
//! starts and released when it is dropped, including when a spawned task
//! panics or is cancelled, so the count can never leak upward. Waiters are
//! woken through a [`Notify`] each time the count reaches zero.

use crate::{Error, Result};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::debug;

#[derive(Debug, Default)]
struct Counter {
    count: AtomicUsize,
    notify: Notify,
}

/// Tracks outstanding units of work and waits for them to drain
#[derive(Debug, Clone, Default)]
pub struct PersistTracker {
    inner: Arc<Counter>,
}

/// Keeps one unit of work counted until dropped
#[derive(Debug)]
#[must_use = "the unit of work is released as soon as the guard is dropped"]
pub struct TaskGuard {
    inner: Arc<Counter>,
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        if self.inner.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.inner.notify.notify_waiters();
        }
    }
}

impl PersistTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one unit of work until the returned guard is dropped
    pub fn enter(&self) -> TaskGuard {
        self.inner.count.fetch_add(1, Ordering::SeqCst);
        TaskGuard {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Run `task` on the tokio runtime, counted until it completes
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let guard = self.enter();
        tokio::spawn(async move {
            task.await;
            drop(guard);
        });
    }

    /// Units of work currently counted
    pub fn outstanding(&self) -> usize {
        self.inner.count.load(Ordering::SeqCst)
    }

    /// Resolve once the count is zero.
    pub async fn wait_idle(&self) {
        loop {
            // Register before checking so a release between the check and the
            // await is not missed.
            let notified = self.inner.notify.notified();
            if self.outstanding() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Wait for the count to reach zero, for at most `limit`.
    ///
    /// Returns [`Error::Timeout`] naming how many units were still running.
    pub async fn wait(&self, limit: Duration) -> Result<()> {
        let pending = self.outstanding();
        if pending == 0 {
            return Ok(());
        }
        debug!(pending, ?limit, "waiting for outstanding work");

        match tokio::time::timeout(limit, self.wait_idle()).await {
            Ok(()) => Ok(()),
            Err(_) => Err(Error::Timeout(format!(
                "{} outstanding task(s) after {}ms",
                self.outstanding(),
                limit.as_millis()
            ))),
        }
    }
}
