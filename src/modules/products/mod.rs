/// Product record store
///
/// The upsert-by-SKU store that row workers write validated records into.
pub mod domain;
pub mod infrastructure;

pub use domain::{NewProduct, Product, ProductRepository};
pub use infrastructure::{InMemoryProductRepository, ProductRepositoryImpl};
