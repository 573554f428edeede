pub mod services;

// Re-exports for easy access
pub use services::{ImportCoordinator, RowProcessor, RowValidator};
