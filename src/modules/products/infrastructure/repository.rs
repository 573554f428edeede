/// Diesel-based implementation of ProductRepository
use crate::modules::products::domain::entities::{NewProduct, Product};
use crate::modules::products::domain::repository::ProductRepository;
use crate::modules::products::infrastructure::models::{NewProductModel, ProductModel};
use crate::schema::products;
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::logger::LogContext;
use crate::shared::Database;
use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::upsert::excluded;
use std::sync::Arc;
use tokio::task;

pub struct ProductRepositoryImpl {
    db: Arc<Database>,
}

impl ProductRepositoryImpl {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ProductRepository for ProductRepositoryImpl {
    async fn upsert_by_sku(&self, product: NewProduct) -> AppResult<Product> {
        let db = Arc::clone(&self.db);
        let model = NewProductModel::from(product);

        let stored = task::spawn_blocking(move || -> AppResult<ProductModel> {
            let mut conn = db.get_connection()?;

            diesel::insert_into(products::table)
                .values(&model)
                .on_conflict(products::sku)
                .do_update()
                .set((
                    products::name.eq(excluded(products::name)),
                    products::price.eq(excluded(products::price)),
                    products::stock.eq(excluded(products::stock)),
                    products::updated_at.eq(Utc::now()),
                ))
                .returning(ProductModel::as_returning())
                .get_result(&mut conn)
                .map_err(AppError::from)
        })
        .await??;

        LogContext::db_operation("upsert", "products", None);
        Ok(stored.into())
    }

    async fn find_by_sku(&self, sku: &str) -> AppResult<Option<Product>> {
        let db = Arc::clone(&self.db);
        let sku = sku.to_string();

        let found = task::spawn_blocking(move || -> AppResult<Option<ProductModel>> {
            let mut conn = db.get_connection()?;

            products::table
                .filter(products::sku.eq(sku))
                .select(ProductModel::as_select())
                .first(&mut conn)
                .optional()
                .map_err(AppError::from)
        })
        .await??;

        Ok(found.map(Product::from))
    }

    async fn count(&self) -> AppResult<u64> {
        let db = Arc::clone(&self.db);

        let count = task::spawn_blocking(move || -> AppResult<i64> {
            let mut conn = db.get_connection()?;
            products::table
                .count()
                .get_result(&mut conn)
                .map_err(AppError::from)
        })
        .await??;

        Ok(count.max(0) as u64)
    }
}
