pub mod import_components;

pub use import_components::{ImportCoordinator, RowProcessor, RowValidator};
