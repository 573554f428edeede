use crate::modules::import_jobs::JobStatus;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Handle returned to the submitter once every row task is queued
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmittedImport {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub total: u32,
}
