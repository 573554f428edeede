/// Import job tracking
///
/// The job record for one submitted batch and the aggregator that every row
/// worker reports through.
///
/// Architecture:
/// - Domain: job entity, status state machine, repository trait
/// - Infrastructure: Diesel repository and an in-process store
/// - Application: progress aggregation and completion detection
pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::{JobEvent, ProgressAggregator};
pub use domain::{
    entities::{
        CompletionPolicy, CounterUpdate, ImportJob, ImportJobSummary, JobStatus, NewImportJob,
        TaskOutcome,
    },
    repository::ImportJobRepository,
};
pub use infrastructure::{ImportJobRepositoryImpl, InMemoryImportJobRepository};
