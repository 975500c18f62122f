//! Validation utilities for warehouse identifiers and quantities
//!
//! Field-level checks return [`DomainError::Validation`] carrying the field name and
//! the offending value, so callers can highlight the input that triggered them.

use std::collections::HashSet;

use rust_decimal::Decimal;
use validator::{ValidationError, ValidationErrors};

use crate::error::DomainError;

/// Maximum length of container codes, batch numbers and order numbers
pub const MAX_CODE_LEN: usize = 50;

/// Maximum length of a sticker barcode
pub const MAX_BARCODE_LEN: usize = 64;

/// Decimal places kept by every stored quantity (`DECIMAL(14, 3)`)
pub const QUANTITY_SCALE: u32 = 3;

/// Largest magnitude a stored quantity can hold: 99_999_999_999.999
pub const MAX_QUANTITY: Decimal = Decimal::from_parts(276_447_231, 23_283, 0, false, 3);

// ============================================================================
// Identifier Validations
// ============================================================================

fn is_code_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '/' || c == '.'
}

/// Validate a plant-scoped code (container code, batch number, order number)
pub fn validate_code(field: &str, code: &str) -> Result<(), DomainError> {
    let trimmed = code.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(field, "must not be empty", code));
    }
    if trimmed.len() != code.len() {
        return Err(DomainError::validation(
            field,
            "must not have leading or trailing whitespace",
            code,
        ));
    }
    if code.len() > MAX_CODE_LEN {
        return Err(DomainError::validation(
            field,
            format!("must be at most {} characters", MAX_CODE_LEN),
            code,
        ));
    }
    if !code.chars().all(is_code_char) {
        return Err(DomainError::validation(
            field,
            "may only contain letters, digits and - _ / .",
            code,
        ));
    }
    Ok(())
}

/// Validate a sticker barcode
pub fn validate_barcode(field: &str, barcode: &str) -> Result<(), DomainError> {
    if barcode.is_empty() {
        return Err(DomainError::validation(field, "must not be empty", barcode));
    }
    if barcode.len() > MAX_BARCODE_LEN {
        return Err(DomainError::validation(
            field,
            format!("must be at most {} characters", MAX_BARCODE_LEN),
            barcode,
        ));
    }
    if !barcode.chars().all(is_code_char) {
        return Err(DomainError::validation(field, "contains invalid characters", barcode));
    }
    Ok(())
}

/// Validate a list of barcodes: non-empty, each well-formed, no duplicates
pub fn validate_barcode_list(field: &str, barcodes: &[String]) -> Result<(), DomainError> {
    if barcodes.is_empty() {
        return Err(DomainError::missing(field, "at least one barcode is required"));
    }
    let mut seen = HashSet::with_capacity(barcodes.len());
    for (i, barcode) in barcodes.iter().enumerate() {
        validate_barcode(&format!("{}[{}]", field, i), barcode)?;
        if !seen.insert(barcode.as_str()) {
            return Err(DomainError::validation(field, "duplicate barcode", barcode));
        }
    }
    Ok(())
}

fn storage_violation(quantity: Decimal) -> Option<String> {
    if quantity.normalize().scale() > QUANTITY_SCALE {
        return Some(format!("must have at most {} decimal places", QUANTITY_SCALE));
    }
    if quantity.abs() > MAX_QUANTITY {
        return Some(format!("must not exceed {}", MAX_QUANTITY));
    }
    None
}

/// Validate that a quantity (of either sign) can be stored without rounding or overflow
pub fn validate_quantity_storage(field: &str, quantity: Decimal) -> Result<(), DomainError> {
    match storage_violation(quantity) {
        Some(reason) => Err(DomainError::validation(field, reason, quantity)),
        None => Ok(()),
    }
}

/// Validate that a quantity is strictly positive and storable
pub fn validate_positive_quantity(field: &str, quantity: Decimal) -> Result<(), DomainError> {
    if quantity <= Decimal::ZERO {
        return Err(DomainError::validation(field, "must be greater than zero", quantity));
    }
    validate_quantity_storage(field, quantity)
}

/// Validate a shift label (e.g. "A", "B", "NIGHT")
pub fn validate_shift(shift: &str) -> Result<(), DomainError> {
    if shift.trim().is_empty() {
        return Err(DomainError::validation("shift", "must not be empty", shift));
    }
    if shift.len() > 20 {
        return Err(DomainError::validation("shift", "must be at most 20 characters", shift));
    }
    Ok(())
}

// ============================================================================
// `validator` integration
// ============================================================================

fn rule_error(code: &'static str, message: String, value: &Decimal) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err.add_param("value".into(), &value.to_string());
    err
}

/// Custom `validator` rule: decimal fits a stored quantity column
pub fn storable_decimal(value: &Decimal) -> Result<(), ValidationError> {
    match storage_violation(*value) {
        Some(reason) => Err(rule_error("storable", reason, value)),
        None => Ok(()),
    }
}

/// Custom `validator` rule: decimal strictly greater than zero
pub fn positive_decimal(value: &Decimal) -> Result<(), ValidationError> {
    if *value <= Decimal::ZERO {
        return Err(rule_error("positive", "must be greater than zero".into(), value));
    }
    storable_decimal(value)
}

/// Custom `validator` rule: decimal not below zero
pub fn non_negative_decimal(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(rule_error("non_negative", "must not be negative".into(), value));
    }
    storable_decimal(value)
}

/// Collapse derive-based validation output into the first field error, ordered by field name
pub fn first_field_error(errors: &ValidationErrors) -> DomainError {
    let field_errors = errors.field_errors();
    let mut fields: Vec<_> = field_errors.keys().copied().collect();
    fields.sort_unstable();

    for field in fields {
        if let Some(err) = field_errors.get(field).and_then(|errs| errs.first()) {
            let reason = err
                .message
                .as_ref()
                .map(|m| m.to_string())
                .unwrap_or_else(|| err.code.to_string());
            let value = err.params.get("value").map(|v| match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            });
            return DomainError::Validation {
                field: field.to_string(),
                reason,
                value,
            };
        }
    }

    DomainError::missing("request", errors.to_string())
}
