/// Product import pipeline
///
/// Validation and storage of individual rows, batch submission, and the
/// service facade used by callers.
pub mod application;
pub mod domain;

// Re-exports for easy external access
pub use application::service::ImportService;
pub use domain::{ImportCoordinator, RowProcessor, RowValidator};
pub use domain::services::import_components::types::SubmittedImport;
