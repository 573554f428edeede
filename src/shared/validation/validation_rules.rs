/// Field rules over a raw JSON record
///
/// Records usually come from CSV, so numeric fields also accept numeric
/// strings. Surrounding whitespace is ignored and empty strings or nulls
/// count as missing.
use super::validation_chain::{ValidationResult, ValidationRule};
use serde_json::{Map, Value};

pub type Record = Map<String, Value>;

/// Value of a present, non-blank field
fn present<'a>(record: &'a Record, field: &str) -> Option<&'a Value> {
    match record.get(field)? {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        value => Some(value),
    }
}

pub fn string_field<'a>(record: &'a Record, field: &str) -> Option<&'a str> {
    match present(record, field)? {
        Value::String(s) => Some(s.trim()),
        _ => None,
    }
}

pub fn number_field(record: &Record, field: &str) -> Option<f64> {
    let number = match present(record, field)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

pub fn integer_field(record: &Record, field: &str) -> Option<i64> {
    match present(record, field)? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Required string of bounded length
pub struct RequiredStringRule {
    pub field: &'static str,
    pub max_length: usize,
}

impl ValidationRule<Record> for RequiredStringRule {
    fn validate(&self, record: &Record) -> ValidationResult {
        if present(record, self.field).is_none() {
            return ValidationResult::invalid(format!("The {} field is required", self.field));
        }
        let Some(value) = string_field(record, self.field) else {
            return ValidationResult::invalid(format!("The {} field must be a string", self.field));
        };
        if value.chars().count() > self.max_length {
            return ValidationResult::invalid(format!(
                "The {} field must not be greater than {} characters",
                self.field, self.max_length
            ));
        }
        ValidationResult::valid()
    }

    fn rule_name(&self) -> &'static str {
        "RequiredString"
    }
}

/// Required number, at least zero
pub struct NonNegativeNumberRule {
    pub field: &'static str,
}

impl ValidationRule<Record> for NonNegativeNumberRule {
    fn validate(&self, record: &Record) -> ValidationResult {
        if present(record, self.field).is_none() {
            return ValidationResult::invalid(format!("The {} field is required", self.field));
        }
        match number_field(record, self.field) {
            None => ValidationResult::invalid(format!("The {} field must be a number", self.field)),
            Some(n) if n < 0.0 => {
                ValidationResult::invalid(format!("The {} field must be at least 0", self.field))
            }
            Some(_) => ValidationResult::valid(),
        }
    }

    fn rule_name(&self) -> &'static str {
        "NonNegativeNumber"
    }
}

/// Required integer within `0..=max`
pub struct NonNegativeIntegerRule {
    pub field: &'static str,
    pub max: i64,
}

impl ValidationRule<Record> for NonNegativeIntegerRule {
    fn validate(&self, record: &Record) -> ValidationResult {
        if present(record, self.field).is_none() {
            return ValidationResult::invalid(format!("The {} field is required", self.field));
        }
        match integer_field(record, self.field) {
            None => {
                ValidationResult::invalid(format!("The {} field must be an integer", self.field))
            }
            Some(n) if n < 0 => {
                ValidationResult::invalid(format!("The {} field must be at least 0", self.field))
            }
            Some(n) if n > self.max => ValidationResult::invalid(format!(
                "The {} field must not be greater than {}",
                self.field, self.max
            )),
            Some(_) => ValidationResult::valid(),
        }
    }

    fn rule_name(&self) -> &'static str {
        "NonNegativeInteger"
    }
}
