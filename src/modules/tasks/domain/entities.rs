/// Domain entities for the row task queue
///
/// One task carries one raw row of an import batch. Tasks are delivered
/// at least once and may be redelivered after a failed or abandoned attempt.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Raw row as parsed from the uploaded file
pub type RowData = Map<String, Value>;

/// Task status enum matching database type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(TaskStatus::Pending),
            "running" => Ok(TaskStatus::Running),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            _ => Err(format!("Invalid task status: {}", s)),
        }
    }
}

/// Unit of work: one row of one job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportTask {
    pub job_id: Uuid,
    /// 1-based position of the row in the batch
    pub row_index: u32,
    pub row: RowData,
}

impl ImportTask {
    pub fn new(job_id: Uuid, row_index: u32, row: RowData) -> Self {
        Self {
            job_id,
            row_index,
            row,
        }
    }
}

/// Task as held by the queue (with delivery metadata)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: Uuid,
    pub task: ImportTask,
    pub status: TaskStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    /// The terminal failure has been counted against the job
    pub failure_recorded: bool,
}

impl TaskRecord {
    /// Check if task can be retried
    pub fn can_retry(&self) -> bool {
        self.attempts < self.max_attempts
    }
}

/// What the queue did with a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureDisposition {
    /// Back to pending for another attempt
    Retry,
    /// Out of attempts. Exactly one caller ever receives this for a task.
    Exhausted,
    /// Failed with an error that retrying cannot fix
    Discarded,
    /// The attempt was no longer current (completed, reclaimed, or redelivered)
    AlreadyResolved,
}

impl FailureDisposition {
    /// The task will never run again and its outcome must be accounted for
    pub fn is_terminal(self) -> bool {
        matches!(self, FailureDisposition::Exhausted | FailureDisposition::Discarded)
    }
}

/// Task queue statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatistics {
    pub pending_count: i64,
    pub running_count: i64,
    pub completed_count: i64,
    pub failed_count: i64,
    pub total_count: i64,
}

impl QueueStatistics {
    pub(crate) fn add(&mut self, status: TaskStatus, count: i64) {
        match status {
            TaskStatus::Pending => self.pending_count += count,
            TaskStatus::Running => self.running_count += count,
            TaskStatus::Completed => self.completed_count += count,
            TaskStatus::Failed => self.failed_count += count,
        }
        self.total_count += count;
    }
}
