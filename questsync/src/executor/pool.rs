//! Background execution of blocking download work.
//!
//! Event handlers must return quickly, so anything that touches the network
//! or storage is handed to a [`BackgroundExecutor`]. Production code uses
//! [`BlockingPoolExecutor`]; tests inject [`InlineExecutor`] to make every
//! job run synchronously and deterministically.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::{Notify, Semaphore};
use tracing::warn;

/// Default number of background jobs allowed to run at once.
pub const DEFAULT_MAX_CONCURRENT_JOBS: usize = 2;

/// A unit of blocking background work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs jobs off the caller's thread.
pub trait BackgroundExecutor: Send + Sync {
    /// Submit a job. Must not block the caller.
    fn submit(&self, job: Job);
}

/// Counts submitted jobs that have not completed yet.
#[derive(Debug, Default)]
struct Outstanding {
    count: AtomicUsize,
    idle: Notify,
}

/// Decrements the outstanding count when the job is done or dropped.
struct OutstandingGuard(Arc<Outstanding>);

impl Drop for OutstandingGuard {
    fn drop(&mut self) {
        if self.0.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

/// Runs jobs on tokio's blocking pool, at most `max_concurrent` at a time.
///
/// Jobs beyond the limit wait for a permit in submission order.
#[derive(Debug, Clone)]
pub struct BlockingPoolExecutor {
    handle: Handle,
    permits: Arc<Semaphore>,
    max_concurrent: usize,
    outstanding: Arc<Outstanding>,
}

impl BlockingPoolExecutor {
    /// Create an executor on the given runtime. `max_concurrent` is at least 1.
    pub fn new(handle: Handle, max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            handle,
            permits: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            outstanding: Arc::new(Outstanding::default()),
        }
    }

    /// Create an executor on the runtime of the current context, if any.
    pub fn current(max_concurrent: usize) -> Option<Self> {
        Handle::try_current()
            .ok()
            .map(|handle| Self::new(handle, max_concurrent))
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Number of jobs currently holding a permit.
    pub fn running(&self) -> usize {
        self.max_concurrent - self.permits.available_permits()
    }

    /// Jobs submitted but not yet completed, waiting ones included.
    pub fn outstanding(&self) -> usize {
        self.outstanding.count.load(Ordering::Acquire)
    }

    /// Wait until every submitted job has completed.
    pub async fn wait_idle(&self) {
        loop {
            let idle = self.outstanding.idle.notified();
            if self.outstanding() == 0 {
                return;
            }
            idle.await;
        }
    }
}

impl BackgroundExecutor for BlockingPoolExecutor {
    fn submit(&self, job: Job) {
        let permits = Arc::clone(&self.permits);
        self.outstanding.count.fetch_add(1, Ordering::AcqRel);
        let guard = OutstandingGuard(Arc::clone(&self.outstanding));
        self.handle.spawn(async move {
            let _guard = guard;
            let _permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    warn!("Background executor closed, dropping job");
                    return;
                }
            };
            if let Err(e) = tokio::task::spawn_blocking(job).await {
                warn!(error = %e, "Background job panicked");
            }
        });
    }
}

/// Runs every job immediately on the submitting thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineExecutor;

impl BackgroundExecutor for InlineExecutor {
    fn submit(&self, job: Job) {
        job();
    }
}
