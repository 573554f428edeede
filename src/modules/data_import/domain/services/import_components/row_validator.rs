/// Turns one raw row into a product the store can accept
use crate::modules::products::NewProduct;
use crate::modules::tasks::RowData;
use crate::shared::errors::{AppError, AppResult};
use crate::shared::validation::validation_rules::{
    integer_field, number_field, string_field, NonNegativeIntegerRule, NonNegativeNumberRule,
    Record, RequiredStringRule,
};
use crate::shared::validation::ValidationChain;
use std::sync::Arc;

pub const MAX_NAME_LENGTH: usize = 255;
pub const MAX_SKU_LENGTH: usize = 100;

#[derive(Clone)]
pub struct RowValidator {
    chain: ValidationChain<Record>,
}

impl RowValidator {
    pub fn new() -> Self {
        // Field order decides which violation is reported
        let chain = ValidationChain::<Record>::new()
            .add_rule(Arc::new(RequiredStringRule {
                field: "name",
                max_length: MAX_NAME_LENGTH,
            }))
            .add_rule(Arc::new(RequiredStringRule {
                field: "sku",
                max_length: MAX_SKU_LENGTH,
            }))
            .add_rule(Arc::new(NonNegativeNumberRule { field: "price" }))
            .add_rule(Arc::new(NonNegativeIntegerRule {
                field: "stock",
                max: i32::MAX as i64,
            }))
            .stop_on_first_error(true);

        Self { chain }
    }

    /// First violation wins and is reported as `InvalidRecord`
    pub fn validate(&self, row: &RowData) -> AppResult<NewProduct> {
        let result = self.chain.validate(row);
        if !result.is_valid {
            let reason = result.first_error().unwrap_or("invalid record");
            return Err(AppError::InvalidRecord(reason.to_string()));
        }

        let missing = |field: &str| AppError::InvalidRecord(format!("The {} field is required", field));
        let name = string_field(row, "name").ok_or_else(|| missing("name"))?;
        let sku = string_field(row, "sku").ok_or_else(|| missing("sku"))?;
        let price = number_field(row, "price").ok_or_else(|| missing("price"))?;
        let stock = integer_field(row, "stock")
            .and_then(|stock| i32::try_from(stock).ok())
            .ok_or_else(|| missing("stock"))?;

        let product = NewProduct::new(name, sku, price, stock);
        // Rounding to cents overflows for prices near f64::MAX
        if !product.price.is_finite() {
            return Err(AppError::InvalidRecord(
                "The price field must be a finite number".to_string(),
            ));
        }

        Ok(product)
    }
}

impl Default for RowValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn row(value: Value) -> RowData {
        value.as_object().cloned().unwrap()
    }

    fn reason(result: AppResult<NewProduct>) -> String {
        match result {
            Err(AppError::InvalidRecord(reason)) => reason,
            other => panic!("expected InvalidRecord, got {:?}", other),
        }
    }

    #[test]
    fn csv_row_becomes_product() {
        let product = RowValidator::new()
            .validate(&row(json!({
                "name": " Espresso cup ",
                "sku": "CUP-01",
                "price": "12.499",
                "stock": "40"
            })))
            .unwrap();

        assert_eq!(product, NewProduct::new("Espresso cup", "CUP-01", 12.5, 40));
    }

    #[test]
    fn negative_price_is_rejected() {
        let result = RowValidator::new().validate(&row(json!({
            "name": "Mug",
            "sku": "MUG-1",
            "price": -5,
            "stock": 1
        })));

        assert_eq!(reason(result), "The price field must be at least 0");
    }

    #[test]
    fn price_that_overflows_when_rounded_is_rejected() {
        let result = RowValidator::new().validate(&row(json!({
            "name": "Mug",
            "sku": "MUG-1",
            "price": 1e308,
            "stock": 1
        })));

        assert_eq!(reason(result), "The price field must be a finite number");
    }

    #[test]
    fn first_field_in_order_is_reported() {
        let result = RowValidator::new().validate(&row(json!({
            "name": "",
            "sku": "x".repeat(101),
            "price": "free",
            "stock": -1
        })));

        assert_eq!(reason(result), "The name field is required");
    }

    #[test]
    fn sku_length_is_bounded() {
        let result = RowValidator::new().validate(&row(json!({
            "name": "Mug",
            "sku": "x".repeat(101),
            "price": 1,
            "stock": 1
        })));

        assert!(reason(result).contains("100 characters"));
    }

    #[test]
    fn fractional_stock_is_rejected() {
        let result = RowValidator::new().validate(&row(json!({
            "name": "Mug",
            "sku": "MUG-1",
            "price": 1,
            "stock": "1.5"
        })));

        assert_eq!(reason(result), "The stock field must be an integer");
    }
}
