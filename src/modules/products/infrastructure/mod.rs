pub mod memory;
pub mod models;
pub mod repository;

pub use memory::InMemoryProductRepository;
pub use repository::ProductRepositoryImpl;
