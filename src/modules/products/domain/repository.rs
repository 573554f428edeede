/// Key-addressed product store
use crate::modules::products::domain::entities::{NewProduct, Product};
use crate::shared::errors::AppResult;
use async_trait::async_trait;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Insert or replace the product with this SKU.
    ///
    /// Atomic per key. `id` and `created_at` survive a replace. Transient
    /// store failures surface as `AppError::StoreUnavailable`.
    async fn upsert_by_sku(&self, product: NewProduct) -> AppResult<Product>;

    async fn find_by_sku(&self, sku: &str) -> AppResult<Option<Product>>;

    async fn count(&self) -> AppResult<u64>;
}
