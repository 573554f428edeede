pub mod entities;
pub mod repository;

pub use entities::{NewProduct, Product};
pub use repository::ProductRepository;
