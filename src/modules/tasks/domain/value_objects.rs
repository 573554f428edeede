/// Value objects for the task queue domain
use super::entities::TaskStatus;
use serde::{Deserialize, Serialize};

/// Task status enum matching the `import_task_status` database type
#[derive(
    diesel_derive_enum::DbEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize,
)]
#[ExistingTypePath = "crate::schema::sql_types::ImportTaskStatus"]
#[serde(rename_all = "lowercase")]
pub enum TaskStatusDb {
    Pending,
    Running,
    Completed,
    Failed,
}

impl From<TaskStatusDb> for TaskStatus {
    fn from(status: TaskStatusDb) -> Self {
        match status {
            TaskStatusDb::Pending => TaskStatus::Pending,
            TaskStatusDb::Running => TaskStatus::Running,
            TaskStatusDb::Completed => TaskStatus::Completed,
            TaskStatusDb::Failed => TaskStatus::Failed,
        }
    }
}
