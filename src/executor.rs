//! Blocking task executor
//!
//! Platform operations are synchronous, so each one runs on tokio's blocking
//! pool. A semaphore caps how many run at once; callers beyond the cap wait
//! for a permit in FIFO order. There is no per-requester fairness and no
//! cancellation: a timed-out job keeps its permit until it returns.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{info, warn};

/// Errors produced by the executor itself (not by the job)
#[derive(Error, Debug)]
pub enum ExecutorError {
    /// The runtime is shutting down and cannot accept or finish jobs
    #[error("worker pool is shut down")]
    Shutdown,
    /// The job panicked on its worker
    #[error("worker task panicked: {0}")]
    Panicked(String),
    /// The configured wait limit elapsed; the job keeps running on its worker
    #[error("operation timed out after {0:?}")]
    TimedOut(Duration),
}

/// Bounded runner for blocking platform operations
pub struct BlockingExecutor {
    permits: Arc<Semaphore>,
    timeout: Option<Duration>,
}

impl BlockingExecutor {
    /// Allow up to `workers` concurrent jobs (at least one).
    #[must_use]
    pub fn new(workers: usize, timeout: Option<Duration>) -> Self {
        let workers = workers.max(1);
        info!(workers, timeout = ?timeout, "Blocking executor ready");
        Self {
            permits: Arc::new(Semaphore::new(workers)),
            timeout,
        }
    }

    /// Run `operation` on the blocking pool and suspend until it finishes.
    ///
    /// The timeout, when configured, covers both the wait for a permit and
    /// the job itself.
    ///
    /// # Errors
    ///
    /// Returns an `ExecutorError` if the runtime is shutting down, the job
    /// panics or the configured timeout elapses.
    pub async fn run<F, T>(&self, operation: F) -> Result<T, ExecutorError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.spawn(operation))
                .await
                .map_err(|_| {
                    warn!(?limit, "Blocking operation timed out");
                    ExecutorError::TimedOut(limit)
                })?,
            None => self.spawn(operation).await,
        }
    }

    async fn spawn<F, T>(&self, operation: F) -> Result<T, ExecutorError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| ExecutorError::Shutdown)?;

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            operation()
        })
        .await
        .map_err(|e| {
            if e.is_panic() {
                ExecutorError::Panicked(panic_message(e.into_panic().as_ref()))
            } else {
                ExecutorError::Shutdown
            }
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
