/// Domain entities for import job tracking
///
/// An import job is the shared record describing one submitted batch. Its
/// counters and status are mutated concurrently by every row task, so the
/// entity itself only exposes read-side helpers; all writes go through
/// `ImportJobRepository`'s atomic primitives.
use crate::shared::errors::{AppError, AppResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MAX_SOURCE_NAME_LENGTH: usize = 255;

/// Lifecycle of an import job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl JobStatus {
    pub const NON_TERMINAL: [JobStatus; 2] = [JobStatus::Pending, JobStatus::InProgress];

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Allowed edges of the state machine. Status only ever moves forward.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        match (self, next) {
            (JobStatus::Pending, JobStatus::InProgress) => true,
            (JobStatus::Pending | JobStatus::InProgress, JobStatus::Completed | JobStatus::Failed) => {
                true
            }
            _ => false,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::InProgress => write!(f, "in_progress"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(JobStatus::Pending),
            "in_progress" => Ok(JobStatus::InProgress),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            _ => Err(format!("Invalid job status: {}", s)),
        }
    }
}

/// What the job ends as once every task has resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionPolicy {
    /// Any fully-resolved job is `Completed`, whatever the failure mix
    #[default]
    AlwaysComplete,
    /// A job whose every task failed ends `Failed`
    FailWhenAllFailed,
}

impl CompletionPolicy {
    /// Terminal status and optional error message for a fully-resolved job
    pub fn resolve(self, job: &ImportJob) -> (JobStatus, Option<String>) {
        match self {
            CompletionPolicy::FailWhenAllFailed if job.failure_count >= job.total => (
                JobStatus::Failed,
                Some(format!("All {} rows failed to import", job.total)),
            ),
            _ => (JobStatus::Completed, None),
        }
    }
}

impl std::str::FromStr for CompletionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "always_complete" => Ok(CompletionPolicy::AlwaysComplete),
            "fail_when_all_failed" => Ok(CompletionPolicy::FailWhenAllFailed),
            _ => Err(format!("Invalid completion policy: {}", s)),
        }
    }
}

/// New job to be created (before insertion)
#[derive(Debug, Clone)]
pub struct NewImportJob {
    pub source_name: String,
    pub total: u32,
}

impl NewImportJob {
    pub fn new(source_name: impl Into<String>, total: u32) -> AppResult<Self> {
        let source_name = source_name.into();

        if total == 0 {
            return Err(AppError::EmptyBatch);
        }
        if source_name.chars().count() > MAX_SOURCE_NAME_LENGTH {
            return Err(AppError::InvalidInput(format!(
                "Source name too long (max {} characters)",
                MAX_SOURCE_NAME_LENGTH
            )));
        }

        Ok(Self { source_name, total })
    }
}

/// Snapshot of an import job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportJob {
    pub id: Uuid,
    pub source_name: String,
    pub status: JobStatus,
    pub total: u32,
    pub success_count: u32,
    pub failure_count: u32,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ImportJob {
    pub fn processed(&self) -> u32 {
        self.success_count + self.failure_count
    }

    /// Completion predicate: every task has resolved one way or the other
    pub fn is_complete(&self) -> bool {
        self.processed() >= self.total
    }

    pub fn progress_percentage(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        (self.processed() as f64 / self.total as f64) * 100.0
    }

    /// Row indexes are 1-based and bounded by `total`
    pub fn owns_row(&self, row_index: u32) -> bool {
        (1..=self.total).contains(&row_index)
    }
}

/// Compact listing entry for the job list view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportJobSummary {
    pub id: Uuid,
    pub source_name: String,
    pub status: JobStatus,
    pub total: u32,
    pub success_count: u32,
    pub failure_count: u32,
    pub progress_percentage: f64,
    pub created_at: DateTime<Utc>,
}

impl From<ImportJob> for ImportJobSummary {
    fn from(job: ImportJob) -> Self {
        let progress_percentage = job.progress_percentage();
        Self {
            id: job.id,
            source_name: job.source_name,
            status: job.status,
            total: job.total,
            success_count: job.success_count,
            failure_count: job.failure_count,
            progress_percentage,
            created_at: job.created_at,
        }
    }
}

/// Resolution of one row task as reported to the aggregator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TaskOutcome {
    Success,
    Failure { reason: String },
}

impl TaskOutcome {
    pub fn failure(reason: impl Into<String>) -> Self {
        TaskOutcome::Failure {
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Success)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            TaskOutcome::Success => None,
            TaskOutcome::Failure { reason } => Some(reason),
        }
    }
}

/// Result of an idempotent counter increment
#[derive(Debug, Clone)]
pub enum CounterUpdate {
    /// The increment was applied; snapshot reflects it
    Applied(ImportJob),
    /// This task's outcome was already counted; nothing changed
    Duplicate(ImportJob),
    /// The row index does not belong to the job; nothing changed
    Rejected(ImportJob),
}

impl CounterUpdate {
    pub fn job(&self) -> &ImportJob {
        match self {
            CounterUpdate::Applied(job)
            | CounterUpdate::Duplicate(job)
            | CounterUpdate::Rejected(job) => job,
        }
    }

    pub fn was_applied(&self) -> bool {
        matches!(self, CounterUpdate::Applied(_))
    }
}
