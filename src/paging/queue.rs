//! Bounded background pool for paging work
//!
//! Jobs are blocking closures. Each one waits for a semaphore permit and
//! then runs on tokio's blocking thread pool, so at most `max_workers`
//! books are being laid out at any time.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::{Notify, Semaphore};

use super::error::{PagingError, PagingResult};

/// Default number of concurrent paging workers
pub const DEFAULT_MAX_WORKERS: usize = 2;

/// Handle to the paging worker pool
#[derive(Clone)]
pub struct TaskQueue {
    handle: Handle,
    inner: Arc<TaskQueueInner>,
}

struct TaskQueueInner {
    permits: Arc<Semaphore>,
    max_workers: usize,
    /// Submitted jobs that have not finished yet
    pending: AtomicUsize,
    idle: Notify,
}

impl TaskQueue {
    /// Create a pool that runs on the given runtime
    pub fn new(handle: Handle, max_workers: usize) -> Self {
        let max_workers = max_workers.max(1);
        Self {
            handle,
            inner: Arc::new(TaskQueueInner {
                permits: Arc::new(Semaphore::new(max_workers)),
                max_workers,
                pending: AtomicUsize::new(0),
                idle: Notify::new(),
            }),
        }
    }

    /// Create a pool on the runtime the caller is running in
    pub fn current(max_workers: usize) -> PagingResult<Self> {
        let handle = Handle::try_current().map_err(|e| PagingError::Runtime(e.to_string()))?;
        Ok(Self::new(handle, max_workers))
    }

    pub fn max_workers(&self) -> usize {
        self.inner.max_workers
    }

    /// Jobs submitted and not yet finished (running or waiting for a permit)
    pub fn pending(&self) -> usize {
        self.inner.pending.load(Ordering::SeqCst)
    }

    /// Queue a blocking job
    pub fn submit<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.pending.fetch_add(1, Ordering::SeqCst);
        let inner = Arc::clone(&self.inner);

        self.handle.spawn(async move {
            match Arc::clone(&inner.permits).acquire_owned().await {
                Ok(permit) => {
                    let result = tokio::task::spawn_blocking(move || {
                        let _permit = permit;
                        job();
                    })
                    .await;
                    if let Err(e) = result {
                        tracing::error!("Paging job failed: {}", e);
                    }
                }
                Err(e) => tracing::warn!("Paging pool closed: {}", e),
            }

            if inner.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
                inner.idle.notify_waiters();
            }
        });
    }

    /// Wait until every submitted job has finished
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }
}
