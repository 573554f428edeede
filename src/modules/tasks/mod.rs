/// Row task queue module
///
/// Delivers one task per imported row to a pool of background workers,
/// at least once, with bounded retries and a per-attempt timeout.
///
/// Architecture:
/// - Domain: task entities and the queue trait
/// - Infrastructure: PostgreSQL queue (SKIP LOCKED) and an in-process queue
/// - Worker: worker loop, pool and stale-attempt reaper
pub mod domain;
pub mod infrastructure;
pub mod worker;

pub use domain::{
    entities::{FailureDisposition, ImportTask, QueueStatistics, RowData, TaskRecord, TaskStatus},
    repository::TaskQueue,
};
pub use infrastructure::{InMemoryTaskQueue, PgTaskQueue};
pub use worker::{BackgroundWorker, TaskHandler, WorkerConfig, WorkerPool, WorkerStatistics};
