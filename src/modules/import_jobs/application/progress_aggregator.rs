use crate::modules::import_jobs::domain::entities::{
    CompletionPolicy, CounterUpdate, ImportJob, JobStatus, TaskOutcome,
};
use crate::modules::import_jobs::domain::repository::ImportJobRepository;
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::logger::LogContext;
use crate::{log_debug, log_error, log_info};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Terminal transition of a job, published once by whichever caller won it
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JobEvent {
    Completed {
        job_id: Uuid,
        success_count: u32,
        failure_count: u32,
    },
    Failed {
        job_id: Uuid,
        error_message: String,
    },
}

impl JobEvent {
    pub fn job_id(&self) -> Uuid {
        match self {
            JobEvent::Completed { job_id, .. } | JobEvent::Failed { job_id, .. } => *job_id,
        }
    }
}

/// Narrow write API over the job record.
///
/// Every worker reports here; nothing else touches counters or status.
#[derive(Clone)]
pub struct ProgressAggregator {
    repository: Arc<dyn ImportJobRepository>,
    policy: CompletionPolicy,
    events: broadcast::Sender<JobEvent>,
}

impl ProgressAggregator {
    pub fn new(repository: Arc<dyn ImportJobRepository>, policy: CompletionPolicy) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            repository,
            policy,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    pub fn policy(&self) -> CompletionPolicy {
        self.policy
    }

    /// Count one row outcome and close the job if it was the last one.
    ///
    /// Returns the job as it stands after this report. Reporting the same
    /// `(job_id, row_index)` twice never double-counts.
    pub async fn report(
        &self,
        job_id: Uuid,
        row_index: u32,
        outcome: TaskOutcome,
    ) -> AppResult<ImportJob> {
        let update = self
            .repository
            .increment_counter(job_id, row_index, &outcome)
            .await?;

        let job = match update {
            CounterUpdate::Applied(job) => {
                LogContext::import_progress(job_id, job.processed(), job.total, row_index);
                job
            }
            CounterUpdate::Duplicate(job) => {
                log_debug!(
                    "Import {}: outcome for row {} already counted, ignoring",
                    job_id,
                    row_index
                );
                job
            }
            CounterUpdate::Rejected(job) => {
                return Err(AppError::InvalidInput(format!(
                    "Row {} does not belong to job {} (total {})",
                    row_index, job_id, job.total
                )));
            }
        };

        // Checked on duplicates too: a crash between increment and transition
        // is healed by the redelivered report.
        if job.is_complete() && !job.status.is_terminal() {
            return self.finish(job).await;
        }

        Ok(job)
    }

    /// `Pending -> InProgress`. Returns whether this caller made the move.
    pub async fn mark_in_progress(&self, job_id: Uuid) -> AppResult<bool> {
        let moved = self
            .repository
            .transition_status(job_id, &[JobStatus::Pending], JobStatus::InProgress, None)
            .await?;

        if moved {
            log_info!("Import {} started processing", job_id);
        }
        Ok(moved)
    }

    /// Fail a job that has not reached a terminal state yet.
    pub async fn mark_failed(&self, job_id: Uuid, error_message: &str) -> AppResult<bool> {
        let moved = self
            .repository
            .transition_status(
                job_id,
                &JobStatus::NON_TERMINAL,
                JobStatus::Failed,
                Some(error_message),
            )
            .await?;

        if moved {
            log_error!("Import {} failed: {}", job_id, error_message);
            self.publish(JobEvent::Failed {
                job_id,
                error_message: error_message.to_string(),
            });
        }
        Ok(moved)
    }

    async fn finish(&self, job: ImportJob) -> AppResult<ImportJob> {
        let (next, error_message) = self.policy.resolve(&job);
        let won = self
            .repository
            .transition_status(
                job.id,
                &JobStatus::NON_TERMINAL,
                next,
                error_message.as_deref(),
            )
            .await?;

        if !won {
            // Someone else closed it; report what the store now holds.
            return Ok(self.repository.get_by_id(job.id).await?.unwrap_or(job));
        }

        let event = match (next, error_message) {
            (JobStatus::Failed, message) => {
                let message = message.unwrap_or_default();
                log_error!("Import {} failed: {}", job.id, message);
                JobEvent::Failed {
                    job_id: job.id,
                    error_message: message,
                }
            }
            _ => {
                log_info!(
                    "Import {} completed: {} succeeded, {} failed out of {}",
                    job.id,
                    job.success_count,
                    job.failure_count,
                    job.total
                );
                JobEvent::Completed {
                    job_id: job.id,
                    success_count: job.success_count,
                    failure_count: job.failure_count,
                }
            }
        };
        self.publish(event);

        Ok(self.repository.get_by_id(job.id).await?.unwrap_or(job))
    }

    fn publish(&self, event: JobEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}
