/// Diesel models for products table
use crate::modules::products::domain::entities::{NewProduct, Product};
use crate::schema::products;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

#[derive(Insertable, Debug)]
#[diesel(table_name = products)]
pub struct NewProductModel {
    pub id: Uuid,
    pub name: String,
    pub sku: String,
    pub price: f64,
    pub stock: i32,
}

impl From<NewProduct> for NewProductModel {
    fn from(product: NewProduct) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: product.name,
            sku: product.sku,
            price: product.price,
            stock: product.stock,
        }
    }
}

#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = products)]
pub struct ProductModel {
    pub id: Uuid,
    pub name: String,
    pub sku: String,
    pub price: f64,
    pub stock: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ProductModel> for Product {
    fn from(model: ProductModel) -> Self {
        Self {
            id: model.id,
            name: model.name,
            sku: model.sku,
            price: model.price,
            stock: model.stock,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}
