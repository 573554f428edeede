/// Repository trait for import job persistence
///
/// Every mutation here is a single atomic store operation. Callers never
/// read counts, compute, and write back.
use crate::modules::import_jobs::domain::entities::{
    CounterUpdate, ImportJob, JobStatus, NewImportJob, TaskOutcome,
};
use crate::shared::application::{PaginatedResult, PaginationParams};
use crate::shared::errors::AppResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[async_trait]
pub trait ImportJobRepository: Send + Sync {
    /// Create a job in `Pending` with zeroed counters
    async fn create(&self, job: NewImportJob) -> AppResult<ImportJob>;

    /// Get job by ID
    async fn get_by_id(&self, job_id: Uuid) -> AppResult<Option<ImportJob>>;

    /// Count one task outcome, at most once per `(job_id, row_index)`.
    ///
    /// Returns the authoritative post-update snapshot. Fails with
    /// `JobNotFound` when the job does not exist.
    async fn increment_counter(
        &self,
        job_id: Uuid,
        row_index: u32,
        outcome: &TaskOutcome,
    ) -> AppResult<CounterUpdate>;

    /// Conditional status update: applies only while the current status is
    /// one of `expected`. Returns whether this call performed the transition.
    async fn transition_status(
        &self,
        job_id: Uuid,
        expected: &[JobStatus],
        next: JobStatus,
        error_message: Option<&str>,
    ) -> AppResult<bool>;

    /// Jobs newest first
    async fn list(&self, params: &PaginationParams) -> AppResult<PaginatedResult<ImportJob>>;

    /// Non-terminal jobs created at or before `created_before`, oldest first
    async fn list_unfinished(&self, created_before: DateTime<Utc>) -> AppResult<Vec<ImportJob>>;
}
