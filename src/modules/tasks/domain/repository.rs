/// Task queue interface
///
/// Delivery is at least once. Every state change is conditional on the
/// attempt the caller holds, so a stale worker can never resolve a task
/// that has since been redelivered.
use crate::modules::tasks::domain::entities::{
    FailureDisposition, ImportTask, QueueStatistics, TaskRecord,
};
use crate::shared::errors::AppResult;
use async_trait::async_trait;
use std::time::Duration;
use uuid::Uuid;

#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Enqueue a single task
    async fn submit(&self, task: ImportTask) -> AppResult<TaskRecord>;

    /// Enqueue a whole batch. Either every task is queued or none is.
    async fn submit_batch(&self, tasks: Vec<ImportTask>) -> AppResult<usize>;

    /// Claim the oldest pending task, moving it to running and counting the attempt
    async fn dequeue(&self) -> AppResult<Option<TaskRecord>>;

    /// Resolve the given attempt as done. Returns false if it was no longer current.
    async fn mark_completed(&self, task_id: Uuid, attempt: u32) -> AppResult<bool>;

    /// Resolve the given attempt as failed.
    ///
    /// Retryable failures go back to pending while attempts remain.
    async fn mark_failed(
        &self,
        task_id: Uuid,
        attempt: u32,
        error: &str,
        retryable: bool,
    ) -> AppResult<FailureDisposition>;

    /// Recover tasks stuck in running for longer than `older_than`.
    ///
    /// Tasks with attempts left go back to pending. The rest are failed and
    /// returned so the caller can account for them.
    async fn reclaim_stale(&self, older_than: Duration) -> AppResult<Vec<TaskRecord>>;

    /// Flag a failed task whose failure has been counted against its job
    async fn mark_failure_recorded(&self, task_id: Uuid) -> AppResult<()>;

    /// Failed tasks, resolved at least `older_than` ago, whose failure was never counted
    async fn unrecorded_failures(&self, older_than: Duration) -> AppResult<Vec<TaskRecord>>;

    /// Number of tasks ever queued for a job, in any status
    async fn count_for_job(&self, job_id: Uuid) -> AppResult<u64>;

    /// Get task by ID
    async fn get_by_id(&self, task_id: Uuid) -> AppResult<Option<TaskRecord>>;

    /// Get queue statistics
    async fn get_statistics(&self) -> AppResult<QueueStatistics>;

    /// Park an idle worker until work may be available
    async fn wait_for_work(&self, max_wait: Duration) {
        tokio::time::sleep(max_wait).await;
    }
}
