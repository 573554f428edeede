/// Row builders for import batches
use product_import::modules::tasks::RowData;
use serde_json::{json, Value};

pub fn row(value: Value) -> RowData {
    value
        .as_object()
        .cloned()
        .expect("row fixtures must be JSON objects")
}

/// A row that passes validation; `i` keeps SKUs unique within a batch
pub fn product_row(i: usize) -> RowData {
    row(json!({
        "name": format!("Product {}", i),
        "sku": format!("SKU-{:05}", i),
        "price": format!("{}.99", i % 100),
        "stock": (i % 50) as i64,
    }))
}

pub fn product_rows(count: usize) -> Vec<RowData> {
    (1..=count).map(product_row).collect()
}

pub fn negative_price_row(i: usize) -> RowData {
    row(json!({
        "name": format!("Product {}", i),
        "sku": format!("SKU-{:05}", i),
        "price": -5,
        "stock": 1,
    }))
}
