pub mod import_coordinator;
pub mod row_processor;
pub mod row_validator;
pub mod types;

// Re-export main types for public API
pub use import_coordinator::ImportCoordinator;
pub use row_processor::RowProcessor;
pub use row_validator::RowValidator;
pub use types::*;
