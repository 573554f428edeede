pub mod entities;
pub mod repository;
pub mod value_objects;

pub use entities::{
    FailureDisposition, ImportTask, QueueStatistics, RowData, TaskRecord, TaskStatus,
};
pub use repository::TaskQueue;
pub use value_objects::TaskStatusDb;
