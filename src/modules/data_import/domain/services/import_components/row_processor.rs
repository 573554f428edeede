/// Processing of a single imported row
///
/// Validate, upsert, report. Transient store failures go back to the queue
/// for another attempt; every other failure is counted against the job
/// right away. A terminal failure that cannot be counted yet is handed back
/// to the queue as unrecorded so no row is ever dropped.
use super::row_validator::RowValidator;
use crate::modules::import_jobs::{ImportJobRepository, JobStatus, ProgressAggregator, TaskOutcome};
use crate::modules::products::{Product, ProductRepository};
use crate::modules::tasks::{ImportTask, TaskHandler};
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::{RetryConfig, RetryUtil};
use crate::{log_debug, log_error, log_info, log_warn};
use async_trait::async_trait;
use std::sync::Arc;

#[derive(Clone)]
pub struct RowProcessor {
    jobs: Arc<dyn ImportJobRepository>,
    products: Arc<dyn ProductRepository>,
    aggregator: ProgressAggregator,
    validator: RowValidator,
    hook_retry: RetryConfig,
}

impl RowProcessor {
    pub fn new(
        jobs: Arc<dyn ImportJobRepository>,
        products: Arc<dyn ProductRepository>,
        aggregator: ProgressAggregator,
    ) -> Self {
        Self {
            jobs,
            products,
            aggregator,
            validator: RowValidator::new(),
            hook_retry: RetryConfig::default(),
        }
    }

    /// Backoff used when recording a terminal failure hits a store outage
    pub fn with_hook_retry(mut self, config: RetryConfig) -> Self {
        self.hook_retry = config;
        self
    }

    async fn import_row(&self, task: &ImportTask) -> AppResult<Product> {
        let product = self.validator.validate(&task.row)?;
        self.products.upsert_by_sku(product).await
    }
}

#[async_trait]
impl TaskHandler for RowProcessor {
    async fn handle(&self, task: &ImportTask) -> AppResult<()> {
        let job = self
            .jobs
            .get_by_id(task.job_id)
            .await?
            .ok_or(AppError::JobNotFound(task.job_id))?;

        if job.status.is_terminal() {
            log_debug!(
                "Import {} already {}, skipping row {}",
                job.id,
                job.status,
                task.row_index
            );
            return Ok(());
        }

        if job.status == JobStatus::Pending {
            self.aggregator.mark_in_progress(job.id).await?;
        }

        let outcome = match self.import_row(task).await {
            Ok(product) => {
                log_info!(
                    "Product {} imported (job {}, row {})",
                    product.sku,
                    task.job_id,
                    task.row_index
                );
                TaskOutcome::Success
            }
            Err(e) if e.is_retryable() => return Err(e),
            Err(e) => {
                log_warn!(
                    "Failed to import row {} of job {}: {}",
                    task.row_index,
                    task.job_id,
                    e
                );
                TaskOutcome::failure(e.to_string())
            }
        };

        self.aggregator
            .report(task.job_id, task.row_index, outcome)
            .await?;
        Ok(())
    }

    async fn on_terminal_failure(&self, task: &ImportTask, error: &str) -> AppResult<()> {
        let reason = AppError::TerminalTaskFailure(error.to_string()).to_string();
        let operation_name = format!("record failure of row {} in job {}", task.row_index, task.job_id);

        let reported = RetryUtil::with_retry(
            || {
                self.aggregator
                    .report(task.job_id, task.row_index, TaskOutcome::failure(reason.clone()))
            },
            &self.hook_retry,
            &operation_name,
        )
        .await;

        match reported {
            Ok(job) => {
                log_warn!(
                    "Row {} of job {} failed permanently ({}/{} resolved): {}",
                    task.row_index,
                    task.job_id,
                    job.processed(),
                    job.total,
                    error
                );
                Ok(())
            }
            // Nothing left to account against
            Err(AppError::JobNotFound(job_id)) => {
                log_warn!("Import {} no longer exists, dropping row {}", job_id, task.row_index);
                Ok(())
            }
            Err(e) if e.is_retryable() => {
                log_error!(
                    "Could not record terminal failure of row {} in job {}: {}",
                    task.row_index,
                    task.job_id,
                    e
                );
                Err(e)
            }
            Err(e) => {
                log_error!(
                    "Terminal failure of row {} in job {} cannot be recorded: {}",
                    task.row_index,
                    task.job_id,
                    e
                );
                Ok(())
            }
        }
    }
}
