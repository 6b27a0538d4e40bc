//! Derivation queue: in-process worker pool with timeout, retry and job dedup.
//!
//! Shutdown: [`DerivationQueue::shutdown`] stops the pool from starting new jobs and
//! drops the ones still waiting; jobs already running continue until they finish or
//! time out. Use [`DerivationQueue::wait_idle`] first for a graceful stop.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, Notify, Semaphore};
use tokio::time::sleep;
use uuid::Uuid;

use mediahub_core::{
    AppError, DerivationDispatcher, DerivationJob, ErrorMetadata, MediaHubConfig,
};

use crate::context::JobHandler;

/// Maximum delay in seconds before retrying a failed job. Caps exponential backoff
/// so that high retry counts do not produce excessively long delays.
pub const MAX_RETRY_BACKOFF_SECS: u64 = 300;

/// Computes backoff in seconds for a given retry count (exponential with cap).
#[inline]
pub(crate) fn compute_retry_backoff_seconds(retry_count: u32) -> u64 {
    2_u64
        .checked_pow(retry_count)
        .unwrap_or(u64::MAX)
        .min(MAX_RETRY_BACKOFF_SECS)
}

#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub max_workers: usize,
    pub job_timeout: Duration,
    pub max_retries: u32,
    /// Jobs that can wait in the channel before `dispatch` applies backpressure
    pub capacity: usize,
}

impl QueueConfig {
    pub fn from_config(config: &MediaHubConfig) -> Self {
        Self {
            max_workers: config.job_max_workers.max(1),
            job_timeout: config.job_timeout(),
            max_retries: config.job_max_retries,
            ..Default::default()
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_workers: 2,
            job_timeout: Duration::from_secs(180),
            max_retries: 3,
            capacity: 1024,
        }
    }
}

/// Bookkeeping shared between the queue handle and the pool.
#[derive(Default)]
struct QueueState {
    /// Assets with a job waiting to start
    pending: Mutex<HashSet<Uuid>>,
    /// Jobs accepted and not yet finished
    in_flight: AtomicUsize,
    idle: Notify,
}

impl QueueState {
    fn pending(&self) -> std::sync::MutexGuard<'_, HashSet<Uuid>> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn started(&self, asset_id: Uuid) {
        self.pending().remove(&asset_id);
    }

    fn finished(&self) {
        if self.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }
}

/// In-process [`DerivationDispatcher`] running jobs on a bounded worker pool.
#[derive(Clone)]
pub struct DerivationQueue {
    job_tx: mpsc::Sender<DerivationJob>,
    shutdown_tx: mpsc::Sender<()>,
    state: Arc<QueueState>,
}

impl DerivationQueue {
    /// Start the worker pool. The handler is held weakly; jobs fail once it is dropped.
    pub fn new(config: QueueConfig, handler: Weak<dyn JobHandler>) -> Self {
        let (job_tx, job_rx) = mpsc::channel(config.capacity.max(1));
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let state = Arc::new(QueueState::default());

        let pool_state = state.clone();
        tokio::spawn(async move {
            Self::worker_pool(config, handler, job_rx, shutdown_rx, pool_state).await;
        });

        Self {
            job_tx,
            shutdown_tx,
            state,
        }
    }

    /// Number of jobs accepted and not yet finished.
    pub fn in_flight(&self) -> usize {
        self.state.in_flight.load(Ordering::SeqCst)
    }

    /// Resolves once no job is waiting or running.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.state.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Signals the worker pool to stop; returns without waiting for running jobs.
    pub async fn shutdown(&self) {
        tracing::info!("Initiating derivation queue shutdown");
        let _ = self.shutdown_tx.send(()).await;
    }

    async fn worker_pool(
        config: QueueConfig,
        handler: Weak<dyn JobHandler>,
        mut job_rx: mpsc::Receiver<DerivationJob>,
        mut shutdown_rx: mpsc::Receiver<()>,
        state: Arc<QueueState>,
    ) {
        tracing::info!(
            max_workers = config.max_workers,
            job_timeout_secs = config.job_timeout.as_secs(),
            max_retries = config.max_retries,
            "Derivation worker pool started"
        );

        let semaphore = Arc::new(Semaphore::new(config.max_workers));

        loop {
            let job = tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Derivation worker pool shutting down");
                    break;
                }
                job = job_rx.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
            };

            let permit = tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Derivation worker pool shutting down");
                    state.started(job.asset_id);
                    state.finished();
                    break;
                }
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            state.started(job.asset_id);
            let handler = handler.clone();
            let config = config.clone();
            let job_state = state.clone();
            tokio::spawn(async move {
                let _permit = permit;
                if let Err(e) = Self::process_job_with_retry(&job, &handler, &config).await {
                    tracing::error!(
                        asset_id = %job.asset_id,
                        error = %e,
                        "Derivation job failed"
                    );
                }
                job_state.finished();
            });
        }

        // Jobs still queued will never run.
        job_rx.close();
        while let Ok(job) = job_rx.try_recv() {
            state.started(job.asset_id);
            state.finished();
        }

        tracing::info!("Derivation worker pool stopped");
    }

    #[tracing::instrument(skip(handler, config), fields(asset_id = %job.asset_id, queue = %job.queue))]
    async fn process_job_with_retry(
        job: &DerivationJob,
        handler: &Weak<dyn JobHandler>,
        config: &QueueConfig,
    ) -> Result<(), AppError> {
        let mut retry_count: u32 = 0;

        loop {
            let handler = handler.upgrade().ok_or_else(|| {
                AppError::Internal("Job handler was dropped, cannot process job".to_string())
            })?;

            let error = match tokio::time::timeout(config.job_timeout, handler.handle(job)).await {
                Ok(Ok(())) => {
                    tracing::debug!(retry_count, "Derivation job completed");
                    return Ok(());
                }
                Ok(Err(e)) if !e.is_recoverable() => {
                    tracing::error!(
                        error = %e,
                        "Derivation job failed with unrecoverable error, will not retry"
                    );
                    return Err(e);
                }
                Ok(Err(e)) => e,
                Err(_) => {
                    tracing::error!(
                        timeout_secs = config.job_timeout.as_secs(),
                        "Derivation job timed out"
                    );
                    AppError::Internal("Derivation job timed out".to_string())
                }
            };
            drop(handler);

            if retry_count >= config.max_retries {
                tracing::error!(error = %error, retry_count, "Derivation job failed after max retries");
                return Err(error);
            }

            let backoff_seconds = compute_retry_backoff_seconds(retry_count);
            retry_count += 1;
            tracing::info!(
                error = %error,
                retry_count,
                backoff_seconds,
                "Scheduling derivation retry"
            );
            sleep(Duration::from_secs(backoff_seconds)).await;
        }
    }
}

#[async_trait]
impl DerivationDispatcher for DerivationQueue {
    async fn dispatch(&self, job: DerivationJob) -> Result<(), AppError> {
        if !self.state.pending().insert(job.asset_id) {
            tracing::debug!(asset_id = %job.asset_id, "Derivation already pending, skipping");
            return Ok(());
        }
        self.state.in_flight.fetch_add(1, Ordering::SeqCst);

        let asset_id = job.asset_id;
        if self.job_tx.send(job).await.is_err() {
            self.state.started(asset_id);
            self.state.finished();
            return Err(AppError::Internal(
                "Derivation queue is shut down".to_string(),
            ));
        }

        tracing::debug!(asset_id = %asset_id, "Derivation job queued");
        Ok(())
    }
}
