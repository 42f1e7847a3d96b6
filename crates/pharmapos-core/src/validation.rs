//! # Validation Module
//!
//! Input validation utilities for PharmaPOS.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: API surface (outside this workspace)                          │
//! │  ├── DTO shape checks, auth                                             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE - business rule validation                        │
//! │  ├── Runs before any storage work                                       │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                             │
//! │  ├── NOT NULL / UNIQUE / CHECK constraints                              │
//! │  └── total_units >= 0 guard on stock                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::types::{Discount, DiscountKind};
use crate::{DEFAULT_PAGE_SIZE, MAX_ITEM_QUANTITY, MAX_PAGE_SIZE, MAX_SALE_ITEMS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a medicine display name.
///
/// ## Rules
/// - Must not be empty
/// - Must be at most 200 characters
pub fn validate_medicine_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.len() > 200 {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates an optional customer name (empty means walk-in customer).
pub fn validate_customer_name(name: Option<&str>) -> ValidationResult<()> {
    if let Some(name) = name {
        if name.trim().len() > 120 {
            return Err(ValidationError::TooLong {
                field: "customerName".to_string(),
                max: 120,
            });
        }
    }
    Ok(())
}

/// Validates an optional phone number.
///
/// Accepts digits with the usual separators; the exact national format is
/// not this crate's business.
pub fn validate_phone(phone: Option<&str>) -> ValidationResult<()> {
    let Some(phone) = phone else { return Ok(()) };
    let phone = phone.trim();
    if phone.is_empty() {
        return Ok(());
    }

    if phone.len() > 20 {
        return Err(ValidationError::TooLong {
            field: "phone".to_string(),
            max: 20,
        });
    }

    if !phone
        .chars()
        .all(|c| c.is_ascii_digit() || c == '+' || c == '-' || c == ' ' || c == '(' || c == ')')
    {
        return Err(ValidationError::InvalidFormat {
            field: "phone".to_string(),
            reason: "must contain only digits, spaces and + - ( )".to_string(),
        });
    }

    Ok(())
}

/// Validates an email address shape (user@domain with a dot in the domain).
///
/// Deliverability is not checked here; the directory only needs a sane
/// unique key.
pub fn validate_email(email: &str) -> ValidationResult<()> {
    let email = email.trim();

    if email.is_empty() {
        return Err(ValidationError::Required {
            field: "email".to_string(),
        });
    }

    if email.len() > 254 {
        return Err(ValidationError::TooLong {
            field: "email".to_string(),
            max: 254,
        });
    }

    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    };
    if !valid {
        return Err(ValidationError::InvalidFormat {
            field: "email".to_string(),
            reason: "must look like name@example.com".to_string(),
        });
    }

    Ok(())
}

/// Validates a search query.
///
/// ## Rules
/// - Can be empty (returns all/default results)
/// - Maximum 100 characters
///
/// ## Returns
/// The trimmed query string.
pub fn validate_search_query(query: &str) -> ValidationResult<String> {
    let query = query.trim();

    if query.len() > 100 {
        return Err(ValidationError::TooLong {
            field: "query".to_string(),
            max: 100,
        });
    }

    Ok(query.to_string())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a sale line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a price in cents.
///
/// ## Rules
/// - Must be non-negative (>= 0)
/// - Zero is allowed (free items, samples)
pub fn validate_price_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a pack-structure count (boxes, cartons per box, ...).
///
/// Every factor must be at least 1; a zero anywhere would zero out the whole
/// batch's unit count.
pub fn validate_pack_count(field: &str, count: i64) -> ValidationResult<()> {
    if count <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }

    Ok(())
}

/// Validates a discount against its kind.
///
/// Percentage values are basis points and must stay within 0..=10000;
/// fixed values are cents and must be non-negative.
pub fn validate_discount(discount: &Discount) -> ValidationResult<()> {
    match discount.kind {
        DiscountKind::Percentage => {
            if !(0..=10_000).contains(&discount.value) {
                return Err(ValidationError::OutOfRange {
                    field: "discount".to_string(),
                    min: 0,
                    max: 10_000,
                });
            }
        }
        DiscountKind::Fixed => {
            if discount.value < 0 {
                return Err(ValidationError::OutOfRange {
                    field: "discount".to_string(),
                    min: 0,
                    max: i64::MAX,
                });
            }
        }
    }

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates the number of lines on a sale.
///
/// ## Rules
/// - At least one line
/// - Must not exceed MAX_SALE_ITEMS (100)
pub fn validate_sale_line_count(count: usize) -> ValidationResult<()> {
    if count == 0 {
        return Err(ValidationError::Required {
            field: "items".to_string(),
        });
    }

    if count > MAX_SALE_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 1,
            max: MAX_SALE_ITEMS as i64,
        });
    }

    Ok(())
}

/// Normalizes pagination inputs.
///
/// Page numbers start at 1. A missing limit falls back to
/// DEFAULT_PAGE_SIZE; anything above MAX_PAGE_SIZE is rejected rather than
/// silently clamped.
pub fn validate_pagination(page: Option<i64>, limit: Option<i64>) -> ValidationResult<(i64, i64)> {
    let page = page.unwrap_or(1);
    if page < 1 {
        return Err(ValidationError::OutOfRange {
            field: "page".to_string(),
            min: 1,
            max: i64::MAX,
        });
    }

    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE);
    if !(1..=MAX_PAGE_SIZE).contains(&limit) {
        return Err(ValidationError::OutOfRange {
            field: "limit".to_string(),
            min: 1,
            max: MAX_PAGE_SIZE,
        });
    }

    Ok((page, limit))
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates a UUID string format.
pub fn validate_uuid(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_medicine_name() {
        assert!(validate_medicine_name("Panadol Extra").is_ok());
        assert!(validate_medicine_name("").is_err());
        assert!(validate_medicine_name("   ").is_err());
        assert!(validate_medicine_name(&"A".repeat(300)).is_err());
    }

    #[test]
    fn test_validate_phone() {
        assert!(validate_phone(None).is_ok());
        assert!(validate_phone(Some("")).is_ok());
        assert!(validate_phone(Some("+92 300 1234567")).is_ok());
        assert!(validate_phone(Some("(042) 111-222")).is_ok());
        assert!(validate_phone(Some("call me maybe")).is_err());
        assert!(validate_phone(Some(&"9".repeat(30))).is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("owner@pharmacy.pk").is_ok());
        assert!(validate_email("").is_err());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("x@nodot").is_err());
        assert!(validate_email("x@.com").is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(999).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(1000).is_err());
    }

    #[test]
    fn test_validate_price_cents() {
        assert!(validate_price_cents("price", 0).is_ok());
        assert!(validate_price_cents("price", 1099).is_ok());
        assert!(validate_price_cents("price", -100).is_err());
    }

    #[test]
    fn test_validate_discount() {
        assert!(validate_discount(&Discount::percentage(0)).is_ok());
        assert!(validate_discount(&Discount::percentage(10_000)).is_ok());
        assert!(validate_discount(&Discount::percentage(10_001)).is_err());
        assert!(validate_discount(&Discount::percentage(-5)).is_err());

        assert!(validate_discount(&Discount::fixed(0)).is_ok());
        assert!(validate_discount(&Discount::fixed(123_456)).is_ok());
        assert!(validate_discount(&Discount::fixed(-1)).is_err());
    }

    #[test]
    fn test_validate_sale_line_count() {
        assert!(validate_sale_line_count(1).is_ok());
        assert!(validate_sale_line_count(100).is_ok());
        assert!(validate_sale_line_count(0).is_err());
        assert!(validate_sale_line_count(101).is_err());
    }

    #[test]
    fn test_validate_pagination() {
        assert_eq!(validate_pagination(None, None).unwrap(), (1, 10));
        assert_eq!(validate_pagination(Some(3), Some(25)).unwrap(), (3, 25));
        assert!(validate_pagination(Some(0), None).is_err());
        assert!(validate_pagination(None, Some(0)).is_err());
        assert!(validate_pagination(None, Some(101)).is_err());
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_uuid("id", "").is_err());
        assert!(validate_uuid("id", "not-a-uuid").is_err());
    }
}
