/// Diesel-based implementation of TaskQueue
///
/// Uses PostgreSQL with SELECT FOR UPDATE SKIP LOCKED for atomic task dequeuing.
use crate::modules::tasks::domain::entities::{
    FailureDisposition, ImportTask, QueueStatistics, TaskRecord,
};
use crate::modules::tasks::domain::repository::TaskQueue;
use crate::modules::tasks::domain::value_objects::TaskStatusDb;
use crate::modules::tasks::infrastructure::models::{
    FailedAttemptRow, ImportTaskModel, NewImportTaskModel,
};
use crate::schema::import_tasks;
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::logger::LogContext;
use crate::shared::Database;
use crate::{log_debug, log_warn};
use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::task;
use uuid::Uuid;

// Six bind parameters per row keeps each INSERT well under the protocol limit.
const INSERT_CHUNK_SIZE: usize = 1000;

// Failed tasks re-reported per reaper pass
const UNRECORDED_SWEEP_LIMIT: i64 = 500;

const TASK_COLUMNS: &str = "id, job_id, row_index, payload, status, attempts, max_attempts, \
                            created_at, started_at, completed_at, error, failure_recorded";

pub struct PgTaskQueue {
    db: Arc<Database>,
    max_attempts: u32,
}

impl PgTaskQueue {
    pub fn new(db: Arc<Database>, max_attempts: u32) -> Self {
        Self {
            db,
            max_attempts: max_attempts.max(1),
        }
    }

    fn to_attempt(attempt: u32) -> AppResult<i32> {
        i32::try_from(attempt)
            .map_err(|_| AppError::InvalidInput(format!("Attempt {} out of range", attempt)))
    }
}

#[async_trait]
impl TaskQueue for PgTaskQueue {
    async fn submit(&self, task: ImportTask) -> AppResult<TaskRecord> {
        let db = Arc::clone(&self.db);
        let new_task = NewImportTaskModel::new(task, self.max_attempts);

        let inserted = task::spawn_blocking(move || -> AppResult<ImportTaskModel> {
            let mut conn = db.get_connection()?;

            diesel::insert_into(import_tasks::table)
                .values(&new_task)
                .returning(ImportTaskModel::as_returning())
                .get_result(&mut conn)
                .map_err(AppError::from)
        })
        .await??;

        inserted.to_task_record()
    }

    async fn submit_batch(&self, tasks: Vec<ImportTask>) -> AppResult<usize> {
        let db = Arc::clone(&self.db);
        let max_attempts = self.max_attempts;
        let models: Vec<NewImportTaskModel> = tasks
            .into_iter()
            .map(|task| NewImportTaskModel::new(task, max_attempts))
            .collect();

        let inserted = task::spawn_blocking(move || -> AppResult<usize> {
            let mut conn = db.get_connection()?;

            conn.transaction::<usize, diesel::result::Error, _>(|conn| {
                let mut inserted = 0;
                for chunk in models.chunks(INSERT_CHUNK_SIZE) {
                    inserted += diesel::insert_into(import_tasks::table)
                        .values(chunk)
                        .execute(conn)?;
                }
                Ok(inserted)
            })
            .map_err(AppError::from)
        })
        .await??;

        LogContext::db_operation("insert batch", "import_tasks", None);
        Ok(inserted)
    }

    async fn dequeue(&self) -> AppResult<Option<TaskRecord>> {
        let db = Arc::clone(&self.db);

        // SKIP LOCKED lets concurrent workers claim different rows without waiting
        let claimed = task::spawn_blocking(move || -> AppResult<Option<ImportTaskModel>> {
            let mut conn = db.get_connection()?;

            diesel::sql_query(format!(
                r#"
                UPDATE import_tasks
                SET status = 'running',
                    started_at = NOW(),
                    attempts = attempts + 1
                WHERE id = (
                    SELECT id
                    FROM import_tasks
                    WHERE status = 'pending'
                      AND attempts < max_attempts
                    ORDER BY created_at ASC, row_index ASC
                    LIMIT 1
                    FOR UPDATE SKIP LOCKED
                )
                RETURNING {}
                "#,
                TASK_COLUMNS
            ))
            .get_result(&mut conn)
            .optional()
            .map_err(AppError::from)
        })
        .await??;

        claimed.map(ImportTaskModel::to_task_record).transpose()
    }

    async fn mark_completed(&self, task_id: Uuid, attempt: u32) -> AppResult<bool> {
        let db = Arc::clone(&self.db);
        let attempt = Self::to_attempt(attempt)?;

        let changed = task::spawn_blocking(move || -> AppResult<usize> {
            let mut conn = db.get_connection()?;

            diesel::update(
                import_tasks::table
                    .filter(import_tasks::id.eq(task_id))
                    .filter(import_tasks::status.eq(TaskStatusDb::Running))
                    .filter(import_tasks::attempts.eq(attempt)),
            )
            .set((
                import_tasks::status.eq(TaskStatusDb::Completed),
                import_tasks::completed_at.eq(Some(Utc::now())),
                import_tasks::error.eq(None::<String>),
            ))
            .execute(&mut conn)
            .map_err(AppError::from)
        })
        .await??;

        Ok(changed == 1)
    }

    async fn mark_failed(
        &self,
        task_id: Uuid,
        attempt: u32,
        error: &str,
        retryable: bool,
    ) -> AppResult<FailureDisposition> {
        let db = Arc::clone(&self.db);
        let attempt = Self::to_attempt(attempt)?;
        let error = error.to_string();

        // Guarded on the attempt number: two callers can never both resolve
        // the same attempt, so only one of them is told the task is exhausted.
        let resolved = task::spawn_blocking(move || -> AppResult<Option<FailedAttemptRow>> {
            let mut conn = db.get_connection()?;

            diesel::sql_query(
                r#"
                UPDATE import_tasks
                SET status = CASE
                        WHEN $3 AND attempts < max_attempts THEN 'pending'::import_task_status
                        ELSE 'failed'::import_task_status
                    END,
                    completed_at = CASE
                        WHEN $3 AND attempts < max_attempts THEN NULL
                        ELSE NOW()
                    END,
                    started_at = NULL,
                    error = $4
                WHERE id = $1
                  AND status = 'running'
                  AND attempts = $2
                RETURNING status
                "#,
            )
            .bind::<diesel::sql_types::Uuid, _>(task_id)
            .bind::<diesel::sql_types::Integer, _>(attempt)
            .bind::<diesel::sql_types::Bool, _>(retryable)
            .bind::<diesel::sql_types::Text, _>(error)
            .get_result(&mut conn)
            .optional()
            .map_err(AppError::from)
        })
        .await??;

        Ok(match resolved.map(|row| row.status) {
            None => FailureDisposition::AlreadyResolved,
            Some(TaskStatusDb::Pending) => FailureDisposition::Retry,
            Some(_) if retryable => FailureDisposition::Exhausted,
            Some(_) => FailureDisposition::Discarded,
        })
    }

    async fn reclaim_stale(&self, older_than: Duration) -> AppResult<Vec<TaskRecord>> {
        let db = Arc::clone(&self.db);
        let older_than_secs = older_than.as_secs_f64();

        let (exhausted, requeued) =
            task::spawn_blocking(move || -> AppResult<(Vec<ImportTaskModel>, usize)> {
                let mut conn = db.get_connection()?;

                conn.transaction::<_, diesel::result::Error, _>(|conn| {
                    let exhausted: Vec<ImportTaskModel> = diesel::sql_query(format!(
                        r#"
                        UPDATE import_tasks
                        SET status = 'failed',
                            completed_at = NOW(),
                            error = 'attempt abandoned'
                        WHERE status = 'running'
                          AND started_at < NOW() - make_interval(secs => $1)
                          AND attempts >= max_attempts
                        RETURNING {}
                        "#,
                        TASK_COLUMNS
                    ))
                    .bind::<diesel::sql_types::Double, _>(older_than_secs)
                    .load(conn)?;

                    let requeued = diesel::sql_query(
                        r#"
                        UPDATE import_tasks
                        SET status = 'pending',
                            started_at = NULL,
                            error = 'attempt abandoned'
                        WHERE status = 'running'
                          AND started_at < NOW() - make_interval(secs => $1)
                          AND attempts < max_attempts
                        "#,
                    )
                    .bind::<diesel::sql_types::Double, _>(older_than_secs)
                    .execute(conn)?;

                    Ok((exhausted, requeued))
                })
                .map_err(AppError::from)
            })
            .await??;

        if requeued > 0 || !exhausted.is_empty() {
            log_warn!(
                "Reclaimed stale tasks: {} requeued, {} exhausted",
                requeued,
                exhausted.len()
            );
        } else {
            log_debug!("No stale tasks to reclaim");
        }

        exhausted
            .into_iter()
            .map(ImportTaskModel::to_task_record)
            .collect()
    }

    async fn mark_failure_recorded(&self, task_id: Uuid) -> AppResult<()> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> AppResult<usize> {
            let mut conn = db.get_connection()?;

            diesel::update(
                import_tasks::table
                    .filter(import_tasks::id.eq(task_id))
                    .filter(import_tasks::status.eq(TaskStatusDb::Failed)),
            )
            .set(import_tasks::failure_recorded.eq(true))
            .execute(&mut conn)
            .map_err(AppError::from)
        })
        .await??;

        Ok(())
    }

    async fn unrecorded_failures(&self, older_than: Duration) -> AppResult<Vec<TaskRecord>> {
        let db = Arc::clone(&self.db);
        let cutoff = Utc::now()
            - chrono::Duration::from_std(older_than)
                .map_err(|e| AppError::InvalidInput(format!("Invalid age threshold: {}", e)))?;

        let models = task::spawn_blocking(move || -> AppResult<Vec<ImportTaskModel>> {
            let mut conn = db.get_connection()?;

            import_tasks::table
                .filter(import_tasks::status.eq(TaskStatusDb::Failed))
                .filter(import_tasks::failure_recorded.eq(false))
                .filter(import_tasks::completed_at.le(cutoff))
                .select(ImportTaskModel::as_select())
                .order(import_tasks::completed_at.asc())
                .limit(UNRECORDED_SWEEP_LIMIT)
                .load(&mut conn)
                .map_err(AppError::from)
        })
        .await??;

        models
            .into_iter()
            .map(ImportTaskModel::to_task_record)
            .collect()
    }

    async fn count_for_job(&self, job_id: Uuid) -> AppResult<u64> {
        let db = Arc::clone(&self.db);

        let count = task::spawn_blocking(move || -> AppResult<i64> {
            let mut conn = db.get_connection()?;

            import_tasks::table
                .filter(import_tasks::job_id.eq(job_id))
                .count()
                .get_result(&mut conn)
                .map_err(AppError::from)
        })
        .await??;

        Ok(count.max(0) as u64)
    }

    async fn get_by_id(&self, task_id: Uuid) -> AppResult<Option<TaskRecord>> {
        let db = Arc::clone(&self.db);

        let found = task::spawn_blocking(move || -> AppResult<Option<ImportTaskModel>> {
            let mut conn = db.get_connection()?;

            import_tasks::table
                .find(task_id)
                .select(ImportTaskModel::as_select())
                .first(&mut conn)
                .optional()
                .map_err(AppError::from)
        })
        .await??;

        found.map(ImportTaskModel::to_task_record).transpose()
    }

    async fn get_statistics(&self) -> AppResult<QueueStatistics> {
        let db = Arc::clone(&self.db);

        let counts = task::spawn_blocking(move || -> AppResult<Vec<(TaskStatusDb, i64)>> {
            let mut conn = db.get_connection()?;

            import_tasks::table
                .group_by(import_tasks::status)
                .select((import_tasks::status, diesel::dsl::count_star()))
                .load(&mut conn)
                .map_err(AppError::from)
        })
        .await??;

        let mut stats = QueueStatistics::default();
        for (status, count) in counts {
            stats.add(status.into(), count);
        }
        Ok(stats)
    }
}
