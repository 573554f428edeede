use crate::{log_error, log_info, log_warn};
use crate::modules::import_jobs::{ImportJob, ImportJobRepository, NewImportJob, ProgressAggregator};
use crate::modules::tasks::{ImportTask, RowData, TaskQueue};
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::logger::TimedOperation;

use super::types::SubmittedImport;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

const STALLED_JOB_ERROR: &str = "dispatch never completed";

/// Creates the job record for a batch and fans its rows out to the queue
#[derive(Clone)]
pub struct ImportCoordinator {
    jobs: Arc<dyn ImportJobRepository>,
    queue: Arc<dyn TaskQueue>,
    aggregator: ProgressAggregator,
}

impl ImportCoordinator {
    pub fn new(
        jobs: Arc<dyn ImportJobRepository>,
        queue: Arc<dyn TaskQueue>,
        aggregator: ProgressAggregator,
    ) -> Self {
        Self {
            jobs,
            queue,
            aggregator,
        }
    }

    /// Create a job for `rows` and queue one task per row.
    ///
    /// Row indexes are 1-based. Either every task is queued or the job is
    /// failed and `DispatchFailed` is returned.
    pub async fn submit(
        &self,
        source_name: &str,
        rows: Vec<RowData>,
    ) -> AppResult<SubmittedImport> {
        let timer = TimedOperation::new("submit_import_batch");

        let total = u32::try_from(rows.len())
            .map_err(|_| AppError::InvalidInput("Too many rows in one batch".to_string()))?;
        let job = self.jobs.create(NewImportJob::new(source_name, total)?).await?;

        log_info!(
            "Import {} created from '{}' with {} rows",
            job.id,
            job.source_name,
            job.total
        );

        let tasks: Vec<ImportTask> = rows
            .into_iter()
            .zip(1..=total)
            .map(|(row, row_index)| ImportTask::new(job.id, row_index, row))
            .collect();

        if let Err(e) = self.queue.submit_batch(tasks).await {
            let message = format!("dispatch failed: {}", e);
            // DispatchFailed is returned even if the job cannot be marked
            if let Err(mark_err) = self.aggregator.mark_failed(job.id, &message).await {
                log_error!("Could not mark import {} as failed: {}", job.id, mark_err);
            }
            return Err(AppError::DispatchFailed(e.to_string()));
        }

        timer.finish_with_info(&format!("{} tasks queued for import {}", total, job.id));

        Ok(SubmittedImport {
            job_id: job.id,
            status: job.status,
            total: job.total,
        })
    }

    /// Unfinished jobs older than `older_than` that have no queued tasks.
    ///
    /// A batch is queued atomically, so such a job was created but never
    /// dispatched (the process died in between, or dispatch failed and the
    /// job could not be marked). Nothing will ever report against it.
    pub async fn stalled_jobs(&self, older_than: Duration) -> AppResult<Vec<ImportJob>> {
        let age = chrono::Duration::from_std(older_than)
            .map_err(|e| AppError::InvalidInput(format!("Invalid stall threshold: {}", e)))?;
        let candidates = self.jobs.list_unfinished(Utc::now() - age).await?;

        let mut stalled = Vec::new();
        for job in candidates {
            if self.queue.count_for_job(job.id).await? == 0 {
                stalled.push(job);
            }
        }
        Ok(stalled)
    }

    /// Fail every stalled job. Returns how many this call moved to Failed.
    pub async fn fail_stalled_jobs(&self, older_than: Duration) -> AppResult<usize> {
        let stalled = self.stalled_jobs(older_than).await?;

        let mut failed = 0;
        for job in &stalled {
            log_warn!(
                "Import {} from '{}' has no queued tasks since {}",
                job.id,
                job.source_name,
                job.created_at
            );
            if self.aggregator.mark_failed(job.id, STALLED_JOB_ERROR).await? {
                failed += 1;
            }
        }
        Ok(failed)
    }
}
