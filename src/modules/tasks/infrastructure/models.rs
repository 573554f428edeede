/// Diesel models for import_tasks table
use crate::modules::tasks::domain::entities::{ImportTask, RowData, TaskRecord};
use crate::modules::tasks::domain::value_objects::TaskStatusDb;
use crate::schema::import_tasks;
use crate::shared::errors::AppResult;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Diesel model for inserting new tasks
#[derive(Insertable, Debug)]
#[diesel(table_name = import_tasks)]
pub struct NewImportTaskModel {
    pub id: Uuid,
    pub job_id: Uuid,
    pub row_index: i32,
    pub payload: JsonValue,
    pub max_attempts: i32,
}

impl NewImportTaskModel {
    pub fn new(task: ImportTask, max_attempts: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_id: task.job_id,
            row_index: i32::try_from(task.row_index).unwrap_or(i32::MAX),
            payload: JsonValue::Object(task.row),
            max_attempts: i32::try_from(max_attempts).unwrap_or(i32::MAX),
        }
    }
}

/// Diesel model for querying existing tasks
#[derive(Queryable, Selectable, QueryableByName, Debug, Clone)]
#[diesel(table_name = import_tasks)]
pub struct ImportTaskModel {
    pub id: Uuid,
    pub job_id: Uuid,
    pub row_index: i32,
    pub payload: JsonValue,
    pub status: TaskStatusDb,
    pub attempts: i32,
    pub max_attempts: i32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub failure_recorded: bool,
}

impl ImportTaskModel {
    /// Convert to domain TaskRecord
    pub fn to_task_record(self) -> AppResult<TaskRecord> {
        let row: RowData = serde_json::from_value(self.payload)?;

        Ok(TaskRecord {
            id: self.id,
            task: ImportTask::new(self.job_id, self.row_index.max(0) as u32, row),
            status: self.status.into(),
            attempts: self.attempts.max(0) as u32,
            max_attempts: self.max_attempts.max(0) as u32,
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
            error: self.error,
            failure_recorded: self.failure_recorded,
        })
    }
}

/// Row returned by the conditional failure update
#[derive(QueryableByName, Debug)]
pub struct FailedAttemptRow {
    #[diesel(sql_type = crate::schema::sql_types::ImportTaskStatus)]
    pub status: TaskStatusDb,
}
