use crate::modules::import_jobs::{ImportJob, ImportJobRepository, ImportJobSummary};
use crate::modules::tasks::{QueueStatistics, RowData, TaskQueue};
use crate::shared::application::{PaginatedResult, PaginationParams};
use crate::shared::errors::{AppError, AppResult};

use std::sync::Arc;
use std::time::Duration;

use super::super::domain::services::import_components::{ImportCoordinator, SubmittedImport};

/// Import service - the interface an upload/status API sits on
///
/// Submission is delegated to the coordinator; reads go straight to the
/// job repository and never mutate anything.
#[derive(Clone)]
pub struct ImportService {
    coordinator: ImportCoordinator,
    jobs: Arc<dyn ImportJobRepository>,
    queue: Arc<dyn TaskQueue>,
}

impl ImportService {
    pub fn new(
        coordinator: ImportCoordinator,
        jobs: Arc<dyn ImportJobRepository>,
        queue: Arc<dyn TaskQueue>,
    ) -> Self {
        Self {
            coordinator,
            jobs,
            queue,
        }
    }

    /// Accept a parsed batch and queue it for background processing
    pub async fn submit_batch(
        &self,
        source_name: &str,
        rows: Vec<RowData>,
    ) -> AppResult<SubmittedImport> {
        self.coordinator.submit(source_name, rows).await
    }

    pub async fn get_status(&self, job_id: uuid::Uuid) -> AppResult<ImportJob> {
        self.jobs
            .get_by_id(job_id)
            .await?
            .ok_or(AppError::JobNotFound(job_id))
    }

    /// Jobs newest first
    pub async fn list_jobs(
        &self,
        params: PaginationParams,
    ) -> AppResult<PaginatedResult<ImportJobSummary>> {
        let params = PaginationParams::new(params.page, params.page_size);
        let page = self.jobs.list(&params).await?;
        Ok(page.map(ImportJobSummary::from))
    }

    /// Jobs created but never dispatched
    pub async fn stalled_jobs(&self, older_than: Duration) -> AppResult<Vec<ImportJob>> {
        self.coordinator.stalled_jobs(older_than).await
    }

    pub async fn fail_stalled_jobs(&self, older_than: Duration) -> AppResult<usize> {
        self.coordinator.fail_stalled_jobs(older_than).await
    }

    pub async fn queue_statistics(&self) -> AppResult<QueueStatistics> {
        self.queue.get_statistics().await
    }
}
