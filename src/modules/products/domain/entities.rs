/// Product records written by the import pipeline
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stored product, keyed by `sku`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub sku: String,
    pub price: f64,
    pub stock: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated product fields to upsert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub sku: String,
    pub price: f64,
    pub stock: i32,
}

impl NewProduct {
    pub fn new(name: impl Into<String>, sku: impl Into<String>, price: f64, stock: i32) -> Self {
        Self {
            name: name.into(),
            sku: sku.into(),
            price: round_price(price),
            stock,
        }
    }
}

/// Prices are stored with cent precision
pub fn round_price(price: f64) -> f64 {
    (price * 100.0).round() / 100.0
}
