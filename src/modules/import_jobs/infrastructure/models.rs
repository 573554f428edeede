/// Diesel models for import_jobs table
use crate::modules::import_jobs::domain::entities::ImportJob;
use crate::modules::import_jobs::domain::value_objects::JobStatusDb;
use crate::schema::import_jobs;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

/// Diesel model for inserting new jobs
#[derive(Insertable, Debug)]
#[diesel(table_name = import_jobs)]
pub struct NewImportJobModel {
    pub id: Uuid,
    pub source_name: String,
    pub status: JobStatusDb,
    pub total: i32,
}

/// Diesel model for querying existing jobs
#[derive(Queryable, Selectable, QueryableByName, Debug, Clone)]
#[diesel(table_name = import_jobs)]
pub struct ImportJobModel {
    pub id: Uuid,
    pub source_name: String,
    pub status: JobStatusDb,
    pub total: i32,
    pub success_count: i32,
    pub failure_count: i32,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ImportJobModel {
    /// Convert to domain ImportJob
    pub fn to_import_job(self) -> ImportJob {
        ImportJob {
            id: self.id,
            source_name: self.source_name,
            status: self.status.into(),
            total: self.total.max(0) as u32,
            success_count: self.success_count.max(0) as u32,
            failure_count: self.failure_count.max(0) as u32,
            error_message: self.error_message,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Row returned by the idempotent increment statement
#[derive(QueryableByName, Debug)]
pub struct CounterUpdateRow {
    #[diesel(embed)]
    pub job: ImportJobModel,
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    pub applied: i64,
}
