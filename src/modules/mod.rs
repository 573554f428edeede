// Bounded contexts of the import pipeline

pub mod data_import; // Row validation, batch submission, service facade
pub mod import_jobs; // Job record and progress aggregation
pub mod products; // Product record store
pub mod tasks; // Row task queue and workers
