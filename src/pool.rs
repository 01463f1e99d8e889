//! Bounded worker pool for blocking jobs

use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, warn};

use crate::error::{Result, ServiceError};

/// Runs blocking jobs on the runtime's blocking threads, at most `size` at a time.
///
/// Waiters are admitted in FIFO order. A job owns its permit, so dropping the
/// awaiting future neither cancels the job nor frees its slot early.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(ServiceError::Validation(
                "worker pool size must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Free slots right now
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub async fn run<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ServiceError::Internal("worker pool is closed".to_string()))?;

        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job()
        });

        match handle.await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                warn!(kind = %err.kind(), error = %err, "worker job failed");
                Err(err)
            }
            Err(join_err) => {
                error!(error = %join_err, "worker job panicked");
                Err(ServiceError::Internal(format!("worker job aborted: {}", join_err)))
            }
        }
    }
}

/// Run a short blocking call (store reads) off the async threads, outside the pool
pub(crate) async fn run_blocking<F, T>(job: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|e| ServiceError::Internal(format!("blocking task aborted: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_zero_size_rejected() {
        assert!(WorkerPool::new(0).is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrency_never_exceeds_size() {
        let pool = WorkerPool::new(2).unwrap();
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let pool = pool.clone();
            let running = running.clone();
            let peak = peak.clone();
            handles.push(tokio::spawn(async move {
                pool.run(move || {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(20));
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                })
                .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(pool.available(), 2);
    }

    #[tokio::test]
    async fn test_job_error_is_returned() {
        let pool = WorkerPool::new(1).unwrap();
        let err = pool
            .run(|| -> Result<()> { Err(ServiceError::NotFound("gone".to_string())) })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_panicking_job_is_internal_error() {
        let pool = WorkerPool::new(1).unwrap();
        let err = pool
            .run(|| -> Result<()> { panic!("boom") })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Internal(_)));
        assert_eq!(pool.available(), 1);
    }

    #[tokio::test]
    async fn test_dropped_caller_does_not_cancel_job() {
        let pool = WorkerPool::new(1).unwrap();
        let done = Arc::new(AtomicUsize::new(0));
        let flag = done.clone();

        let fut = pool.run(move || {
            std::thread::sleep(Duration::from_millis(50));
            flag.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let _ = tokio::time::timeout(Duration::from_millis(5), fut).await;

        // next job waits for the slot the first one still holds
        pool.run(|| Ok(())).await.unwrap();
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }
}
