pub mod memory;
pub mod models;
pub mod repository;

pub use memory::InMemoryTaskQueue;
pub use repository::PgTaskQueue;
