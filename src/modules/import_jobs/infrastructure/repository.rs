/// Diesel-based implementation of ImportJobRepository
///
/// Counter increments and status transitions are single SQL statements, so
/// concurrent workers serialize on the row lock instead of racing a
/// read-modify-write in application code.
use crate::modules::import_jobs::domain::entities::{
    CounterUpdate, ImportJob, JobStatus, NewImportJob, TaskOutcome,
};
use crate::modules::import_jobs::domain::repository::ImportJobRepository;
use crate::modules::import_jobs::domain::value_objects::JobStatusDb;
use crate::modules::import_jobs::infrastructure::models::{
    CounterUpdateRow, ImportJobModel, NewImportJobModel,
};
use crate::schema::import_jobs;
use crate::shared::application::{PaginatedResult, PaginationParams};
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::logger::LogContext;
use crate::shared::Database;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use std::sync::Arc;
use tokio::task;
use uuid::Uuid;

pub struct ImportJobRepositoryImpl {
    db: Arc<Database>,
}

impl ImportJobRepositoryImpl {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ImportJobRepository for ImportJobRepositoryImpl {
    async fn create(&self, job: NewImportJob) -> AppResult<ImportJob> {
        let db = Arc::clone(&self.db);
        let new_job = NewImportJobModel {
            id: Uuid::new_v4(),
            source_name: job.source_name,
            status: JobStatusDb::Pending,
            total: i32::try_from(job.total)
                .map_err(|_| AppError::InvalidInput("Batch too large".to_string()))?,
        };

        let inserted = task::spawn_blocking(move || -> AppResult<ImportJobModel> {
            let mut conn = db.get_connection()?;

            diesel::insert_into(import_jobs::table)
                .values(&new_job)
                .returning(ImportJobModel::as_returning())
                .get_result(&mut conn)
                .map_err(AppError::from)
        })
        .await??;

        LogContext::db_operation("insert", "import_jobs", None);
        Ok(inserted.to_import_job())
    }

    async fn get_by_id(&self, job_id: Uuid) -> AppResult<Option<ImportJob>> {
        let db = Arc::clone(&self.db);

        let job = task::spawn_blocking(move || -> AppResult<Option<ImportJobModel>> {
            let mut conn = db.get_connection()?;

            import_jobs::table
                .find(job_id)
                .select(ImportJobModel::as_select())
                .first(&mut conn)
                .optional()
                .map_err(AppError::from)
        })
        .await??;

        Ok(job.map(|j| j.to_import_job()))
    }

    async fn increment_counter(
        &self,
        job_id: Uuid,
        row_index: u32,
        outcome: &TaskOutcome,
    ) -> AppResult<CounterUpdate> {
        let db = Arc::clone(&self.db);
        let succeeded = outcome.is_success();
        let reason = outcome.reason().map(str::to_string);
        let row = i32::try_from(row_index)
            .map_err(|_| AppError::InvalidInput(format!("Row index {} out of range", row_index)))?;

        // The outcome ledger insert is the idempotency check; the counter
        // update only adds what the insert actually recorded.
        let updated = task::spawn_blocking(move || -> AppResult<Option<CounterUpdateRow>> {
            let mut conn = db.get_connection()?;

            diesel::sql_query(
                r#"
                WITH recorded AS (
                    INSERT INTO import_task_outcomes (job_id, row_index, succeeded, reason)
                    SELECT $1, $2, $3, $4
                    WHERE EXISTS (
                        SELECT 1 FROM import_jobs
                        WHERE id = $1
                          AND $2 BETWEEN 1 AND total
                          AND success_count + failure_count < total
                    )
                    ON CONFLICT (job_id, row_index) DO NOTHING
                    RETURNING succeeded
                )
                UPDATE import_jobs
                SET success_count = success_count
                        + (SELECT COUNT(*) FROM recorded WHERE succeeded),
                    failure_count = failure_count
                        + (SELECT COUNT(*) FROM recorded WHERE NOT succeeded),
                    updated_at = CASE
                        WHEN EXISTS (SELECT 1 FROM recorded) THEN NOW()
                        ELSE updated_at
                    END
                WHERE id = $1
                RETURNING id, source_name, status, total, success_count, failure_count,
                          error_message, created_at, updated_at,
                          (SELECT COUNT(*) FROM recorded) AS applied
                "#,
            )
            .bind::<diesel::sql_types::Uuid, _>(job_id)
            .bind::<diesel::sql_types::Integer, _>(row)
            .bind::<diesel::sql_types::Bool, _>(succeeded)
            .bind::<diesel::sql_types::Nullable<diesel::sql_types::Text>, _>(reason)
            .get_result(&mut conn)
            .optional()
            .map_err(AppError::from)
        })
        .await??;

        let updated = updated.ok_or(AppError::JobNotFound(job_id))?;
        let job = updated.job.to_import_job();

        Ok(if updated.applied > 0 {
            CounterUpdate::Applied(job)
        } else if !job.owns_row(row_index) {
            CounterUpdate::Rejected(job)
        } else {
            CounterUpdate::Duplicate(job)
        })
    }

    async fn transition_status(
        &self,
        job_id: Uuid,
        expected: &[JobStatus],
        next: JobStatus,
        error_message: Option<&str>,
    ) -> AppResult<bool> {
        let db = Arc::clone(&self.db);
        let allowed: Vec<JobStatusDb> = expected
            .iter()
            .copied()
            .filter(|from| from.can_transition_to(next))
            .map(JobStatusDb::from)
            .collect();
        if allowed.is_empty() {
            return Ok(false);
        }
        let error_message = error_message.map(str::to_string);

        let changed = task::spawn_blocking(move || -> AppResult<usize> {
            let mut conn = db.get_connection()?;

            diesel::update(
                import_jobs::table
                    .filter(import_jobs::id.eq(job_id))
                    .filter(import_jobs::status.eq_any(allowed)),
            )
            .set((
                import_jobs::status.eq(JobStatusDb::from(next)),
                import_jobs::error_message.eq(error_message),
                import_jobs::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)
            .map_err(AppError::from)
        })
        .await??;

        Ok(changed == 1)
    }

    async fn list(&self, params: &PaginationParams) -> AppResult<PaginatedResult<ImportJob>> {
        let db = Arc::clone(&self.db);
        let (offset, limit) = (params.offset(), params.limit());

        let (models, total) = task::spawn_blocking(move || -> AppResult<(Vec<ImportJobModel>, i64)> {
            let mut conn = db.get_connection()?;

            let total: i64 = import_jobs::table.count().get_result(&mut conn)?;
            let models = import_jobs::table
                .select(ImportJobModel::as_select())
                .order((import_jobs::created_at.desc(), import_jobs::id.desc()))
                .offset(offset)
                .limit(limit)
                .load(&mut conn)?;

            Ok((models, total))
        })
        .await??;

        let jobs = models.into_iter().map(|m| m.to_import_job()).collect();
        Ok(PaginatedResult::new(jobs, total.max(0) as u64, params))
    }

    async fn list_unfinished(&self, created_before: DateTime<Utc>) -> AppResult<Vec<ImportJob>> {
        let db = Arc::clone(&self.db);
        let unfinished: Vec<JobStatusDb> = JobStatus::NON_TERMINAL
            .iter()
            .copied()
            .map(JobStatusDb::from)
            .collect();

        let models = task::spawn_blocking(move || -> AppResult<Vec<ImportJobModel>> {
            let mut conn = db.get_connection()?;

            import_jobs::table
                .filter(import_jobs::status.eq_any(unfinished))
                .filter(import_jobs::created_at.le(created_before))
                .select(ImportJobModel::as_select())
                .order((import_jobs::created_at.asc(), import_jobs::id.asc()))
                .load(&mut conn)
                .map_err(AppError::from)
        })
        .await??;

        Ok(models.into_iter().map(|m| m.to_import_job()).collect())
    }
}
