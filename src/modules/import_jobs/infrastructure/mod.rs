pub mod memory;
pub mod models;
pub mod repository;

pub use memory::InMemoryImportJobRepository;
pub use repository::ImportJobRepositoryImpl;
