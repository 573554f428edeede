pub mod entities;
pub mod repository;
pub mod value_objects;

pub use entities::{
    CompletionPolicy, CounterUpdate, ImportJob, ImportJobSummary, JobStatus, NewImportJob,
    TaskOutcome,
};
pub use repository::ImportJobRepository;
pub use value_objects::JobStatusDb;
