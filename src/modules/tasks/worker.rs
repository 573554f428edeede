/// Background workers for processing queued row tasks
///
/// Each worker continuously polls the task queue and runs one attempt at a
/// time. An attempt runs in its own tokio task so a panic or a timeout is
/// contained and counted as a failed attempt instead of killing the worker.
use crate::config::ImportConfig;
use crate::modules::tasks::domain::entities::{
    FailureDisposition, ImportTask, QueueStatistics, TaskRecord,
};
use crate::modules::tasks::domain::repository::TaskQueue;
use crate::shared::errors::{AppError, AppResult};
use crate::{log_debug, log_error, log_info, log_warn};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Work performed for one dequeued task
#[async_trait]
pub trait TaskHandler: Send + Sync + 'static {
    /// Run one attempt. Errors for which `AppError::is_retryable` holds are
    /// redelivered while attempts remain.
    async fn handle(&self, task: &ImportTask) -> AppResult<()>;

    /// Account for a task that will never run again without having succeeded.
    ///
    /// Must be idempotent: an `Err` leaves the failure unrecorded and the
    /// reaper calls it again on a later pass.
    async fn on_terminal_failure(&self, task: &ImportTask, error: &str) -> AppResult<()>;
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub concurrency: usize,
    pub poll_interval: Duration,
    pub attempt_timeout: Duration,
    pub reaper_interval: Duration,
}

impl WorkerConfig {
    /// Running attempts older than this are presumed abandoned
    pub fn stale_after(&self) -> Duration {
        self.attempt_timeout + self.reaper_interval
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self::from(&ImportConfig::default())
    }
}

impl From<&ImportConfig> for WorkerConfig {
    fn from(config: &ImportConfig) -> Self {
        Self {
            concurrency: config.worker_concurrency.max(1),
            poll_interval: config.poll_interval,
            attempt_timeout: config.attempt_timeout,
            reaper_interval: config.reaper_interval,
        }
    }
}

enum AttemptOutcome {
    Succeeded,
    Failed { error: String, retryable: bool },
}

/// Background worker that processes tasks from the queue
pub struct BackgroundWorker {
    id: usize,
    queue: Arc<dyn TaskQueue>,
    handler: Arc<dyn TaskHandler>,
    config: WorkerConfig,
    shutdown: CancellationToken,
    processed: Arc<AtomicU64>,
}

impl BackgroundWorker {
    pub fn new(
        id: usize,
        queue: Arc<dyn TaskQueue>,
        handler: Arc<dyn TaskHandler>,
        config: WorkerConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            id,
            queue,
            handler,
            config,
            shutdown,
            processed: Arc::new(AtomicU64::new(0)),
        }
    }

    fn with_counter(mut self, processed: Arc<AtomicU64>) -> Self {
        self.processed = processed;
        self
    }

    /// Run the worker loop until the shutdown token is cancelled
    pub async fn run(self: Arc<Self>) {
        log_info!("Worker {} started", self.id);

        while !self.shutdown.is_cancelled() {
            match self.process_next_task().await {
                // Task processed, immediately try to get the next one
                Ok(true) => {}
                Ok(false) => {
                    tokio::select! {
                        _ = self.shutdown.cancelled() => break,
                        _ = self.queue.wait_for_work(self.config.poll_interval) => {}
                    }
                }
                Err(e) => {
                    log_error!("Worker {}: error in worker loop: {}", self.id, e);
                    tokio::select! {
                        _ = self.shutdown.cancelled() => break,
                        _ = tokio::time::sleep(self.config.poll_interval) => {}
                    }
                }
            }
        }

        log_info!("Worker {} stopped", self.id);
    }

    /// Process the next task in the queue
    ///
    /// Returns true if a task was processed, false if the queue was empty
    pub async fn process_next_task(&self) -> AppResult<bool> {
        let record = match self.queue.dequeue().await? {
            Some(record) => record,
            None => return Ok(false),
        };

        log_debug!(
            "Worker {}: task {} (job {}, row {}, attempt {}/{})",
            self.id,
            record.id,
            record.task.job_id,
            record.task.row_index,
            record.attempts,
            record.max_attempts
        );

        match self.run_attempt(&record).await {
            AttemptOutcome::Succeeded => {
                if !self.queue.mark_completed(record.id, record.attempts).await? {
                    log_warn!(
                        "Task {} attempt {} finished after it was reclaimed",
                        record.id,
                        record.attempts
                    );
                }
            }
            AttemptOutcome::Failed { error, retryable } => {
                self.resolve_failure(&record, &error, retryable).await?;
            }
        }

        self.processed.fetch_add(1, Ordering::Relaxed);
        Ok(true)
    }

    async fn run_attempt(&self, record: &TaskRecord) -> AttemptOutcome {
        let handler = Arc::clone(&self.handler);
        let task = record.task.clone();
        let attempt = tokio::spawn(async move { handler.handle(&task).await });
        let abort = attempt.abort_handle();

        match tokio::time::timeout(self.config.attempt_timeout, attempt).await {
            Ok(Ok(Ok(()))) => AttemptOutcome::Succeeded,
            Ok(Ok(Err(e))) => AttemptOutcome::Failed {
                retryable: e.is_retryable(),
                error: e.to_string(),
            },
            Ok(Err(join_error)) => {
                log_error!("Task {} attempt panicked: {}", record.id, join_error);
                AttemptOutcome::Failed {
                    error: format!("attempt panicked: {}", join_error),
                    retryable: true,
                }
            }
            Err(_) => {
                abort.abort();
                let e = AppError::AttemptTimedOut(self.config.attempt_timeout.as_secs());
                AttemptOutcome::Failed {
                    retryable: e.is_retryable(),
                    error: e.to_string(),
                }
            }
        }
    }

    async fn resolve_failure(
        &self,
        record: &TaskRecord,
        error: &str,
        retryable: bool,
    ) -> AppResult<()> {
        let disposition = self
            .queue
            .mark_failed(record.id, record.attempts, error, retryable)
            .await?;

        if disposition.is_terminal() {
            log_error!(
                "Task {} failed permanently after {} attempts: {}",
                record.id,
                record.attempts,
                error
            );
            record_terminal_failure(self.queue.as_ref(), self.handler.as_ref(), record, error)
                .await;
        } else if disposition == FailureDisposition::Retry {
            log_warn!(
                "Task {} failed (attempt {}/{}), will be retried: {}",
                record.id,
                record.attempts,
                record.max_attempts,
                error
            );
        } else {
            log_debug!(
                "Task {} attempt {} was already resolved",
                record.id,
                record.attempts
            );
        }

        Ok(())
    }
}

/// Run the terminal-failure hook and flag the task once it succeeded
async fn record_terminal_failure(
    queue: &dyn TaskQueue,
    handler: &dyn TaskHandler,
    record: &TaskRecord,
    error: &str,
) -> bool {
    if let Err(e) = handler.on_terminal_failure(&record.task, error).await {
        log_warn!(
            "Failure of task {} not recorded yet, will retry on the next sweep: {}",
            record.id,
            e
        );
        return false;
    }

    match queue.mark_failure_recorded(record.id).await {
        Ok(()) => true,
        Err(e) => {
            // Re-driving an already counted failure is a no-op
            log_warn!("Could not flag task {} as recorded: {}", record.id, e);
            false
        }
    }
}

/// Periodically recovers attempts abandoned by crashed workers and
/// re-drives terminal failures whose hook did not go through
async fn run_reaper(
    queue: Arc<dyn TaskQueue>,
    handler: Arc<dyn TaskHandler>,
    config: WorkerConfig,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(config.reaper_interval) => {}
        }

        match queue.reclaim_stale(config.stale_after()).await {
            Ok(exhausted) => {
                for record in exhausted {
                    record_terminal_failure(
                        queue.as_ref(),
                        handler.as_ref(),
                        &record,
                        "attempt abandoned",
                    )
                    .await;
                }
            }
            Err(e) => log_error!("Failed to reclaim stale tasks: {}", e),
        }

        // Failures resolved within the last interval may still have their hook in flight
        match queue.unrecorded_failures(config.reaper_interval).await {
            Ok(unrecorded) => {
                let mut recorded = 0usize;
                for record in &unrecorded {
                    let error = record.error.as_deref().unwrap_or("attempt failed");
                    if record_terminal_failure(queue.as_ref(), handler.as_ref(), record, error)
                        .await
                    {
                        recorded += 1;
                    }
                }
                if !unrecorded.is_empty() {
                    log_info!(
                        "Recorded {} of {} outstanding task failures",
                        recorded,
                        unrecorded.len()
                    );
                }
            }
            Err(e) => log_error!("Failed to load unrecorded task failures: {}", e),
        }
    }
}

/// Worker statistics for monitoring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerStatistics {
    pub is_running: bool,
    pub workers: usize,
    pub tasks_processed: u64,
    pub queue: QueueStatistics,
}

/// A fixed set of workers plus the stale-attempt reaper
pub struct WorkerPool {
    queue: Arc<dyn TaskQueue>,
    shutdown: CancellationToken,
    handles: Vec<JoinHandle<()>>,
    workers: usize,
    processed: Arc<AtomicU64>,
}

impl WorkerPool {
    pub fn start(
        queue: Arc<dyn TaskQueue>,
        handler: Arc<dyn TaskHandler>,
        config: WorkerConfig,
    ) -> Self {
        let shutdown = CancellationToken::new();
        let processed = Arc::new(AtomicU64::new(0));
        let workers = config.concurrency.max(1);

        let mut handles: Vec<JoinHandle<()>> = (0..workers)
            .map(|id| {
                let worker = BackgroundWorker::new(
                    id,
                    Arc::clone(&queue),
                    Arc::clone(&handler),
                    config.clone(),
                    shutdown.child_token(),
                )
                .with_counter(Arc::clone(&processed));
                tokio::spawn(Arc::new(worker).run())
            })
            .collect();

        handles.push(tokio::spawn(run_reaper(
            Arc::clone(&queue),
            handler,
            config,
            shutdown.child_token(),
        )));

        log_info!("Worker pool started with {} workers", workers);

        Self {
            queue,
            shutdown,
            handles,
            workers,
            processed,
        }
    }

    pub fn is_running(&self) -> bool {
        !self.shutdown.is_cancelled()
    }

    /// Signal every worker to stop and wait for in-flight attempts to finish
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        for handle in self.handles {
            if let Err(e) = handle.await {
                log_error!("Worker exited abnormally: {}", e);
            }
        }
        log_info!("Worker pool stopped");
    }

    pub async fn get_statistics(&self) -> AppResult<WorkerStatistics> {
        Ok(WorkerStatistics {
            is_running: self.is_running(),
            workers: self.workers,
            tasks_processed: self.processed.load(Ordering::Relaxed),
            queue: self.queue.get_statistics().await?,
        })
    }
}
