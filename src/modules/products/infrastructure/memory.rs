/// In-process product store
use crate::modules::products::domain::entities::{NewProduct, Product};
use crate::modules::products::domain::repository::ProductRepository;
use crate::shared::errors::AppResult;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::trace;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct InMemoryProductRepository {
    products: DashMap<String, Product>,
}

impl InMemoryProductRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn upsert_by_sku(&self, product: NewProduct) -> AppResult<Product> {
        let now = Utc::now();

        let stored = match self.products.entry(product.sku.clone()) {
            Entry::Occupied(mut occupied) => {
                let existing = occupied.get_mut();
                existing.name = product.name;
                existing.price = product.price;
                existing.stock = product.stock;
                existing.updated_at = now;
                existing.clone()
            }
            Entry::Vacant(vacant) => {
                trace!(sku = %product.sku, "inserting product");
                vacant
                    .insert(Product {
                        id: Uuid::new_v4(),
                        name: product.name,
                        sku: product.sku,
                        price: product.price,
                        stock: product.stock,
                        created_at: now,
                        updated_at: now,
                    })
                    .clone()
            }
        };

        Ok(stored)
    }

    async fn find_by_sku(&self, sku: &str) -> AppResult<Option<Product>> {
        Ok(self.products.get(sku).map(|entry| entry.value().clone()))
    }

    async fn count(&self) -> AppResult<u64> {
        Ok(self.products.len() as u64)
    }
}
