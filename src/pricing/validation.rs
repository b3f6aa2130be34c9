//! Save-time validation for booking lines and catalog entries.
//!
//! Reads never validate; a stored line is assumed consistent.

use rust_decimal::Decimal;

use super::classifier::check_age;
use super::error::ValidationError;
use super::models::{HalfPriceKind, ServiceCatalogEntry, MAX_CHILD_AGE, MAX_QUANTITY};

/// Passenger part of a line as submitted by an operator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineQuantities {
    pub qty_full: u32,
    pub qty_half: u32,
    pub qty_child: u32,
    pub child_ages: Vec<i32>,
    pub half_price_justifications: Vec<HalfPriceKind>,
}

/// Check a prospective line against the service it books.
///
/// `category_id` is the category the operator selected for the line.
pub fn validate_line(
    quantities: &LineQuantities,
    category_id: uuid::Uuid,
    service: &ServiceCatalogEntry,
) -> Result<(), ValidationError> {
    let LineQuantities {
        qty_full,
        qty_half,
        qty_child,
        child_ages,
        half_price_justifications,
    } = quantities;

    let total = qty_full
        .checked_add(*qty_half)
        .and_then(|sum| sum.checked_add(*qty_child))
        .filter(|&sum| sum <= MAX_QUANTITY)
        .ok_or(ValidationError::QuantityTooLarge { max: MAX_QUANTITY })?;
    if total == 0 {
        return Err(ValidationError::EmptyLine);
    }

    if *qty_child > 0 || !child_ages.is_empty() {
        if child_ages.len() != *qty_child as usize {
            return Err(ValidationError::AgeCountMismatch {
                declared: *qty_child,
                provided: child_ages.len(),
            });
        }
        for &age in child_ages {
            check_age(age)?;
        }
        if let Some(minimum) = service.minimum_age() {
            if let Some(&age) = child_ages.iter().find(|&&age| age < minimum) {
                return Err(ValidationError::BelowMinimumAge { age, minimum });
            }
        }
    }

    if *qty_half > 0 {
        if !service.accepts_half_price {
            return Err(ValidationError::HalfPriceNotAccepted {
                service: service.name.clone(),
            });
        }
        if half_price_justifications.len() != *qty_half as usize {
            return Err(ValidationError::JustificationCountMismatch {
                declared: *qty_half,
                provided: half_price_justifications.len(),
            });
        }
    } else if !half_price_justifications.is_empty() {
        return Err(ValidationError::JustificationCountMismatch {
            declared: 0,
            provided: half_price_justifications.len(),
        });
    }

    if service.category_id != category_id {
        return Err(ValidationError::CategoryMismatch {
            service: service.name.clone(),
        });
    }

    Ok(())
}

/// Catalog-entry rules enforced when back-office staff save a service.
pub fn validate_service(service: &ServiceCatalogEntry) -> Result<(), ValidationError> {
    if service.name.trim().is_empty() {
        return Err(ValidationError::InvalidCatalogEntry {
            field: "name",
            requirement: "non-empty",
        });
    }
    if service.full_price <= Decimal::ZERO {
        return Err(ValidationError::InvalidCatalogEntry {
            field: "full_price",
            requirement: "greater than zero",
        });
    }
    if service.half_price < Decimal::ZERO {
        return Err(ValidationError::InvalidCatalogEntry {
            field: "half_price",
            requirement: "zero or more",
        });
    }
    if service.child_price < Decimal::ZERO {
        return Err(ValidationError::InvalidCatalogEntry {
            field: "child_price",
            requirement: "zero or more",
        });
    }

    let ages = [
        ("child_min_age", service.child_min_age),
        ("child_max_age", service.child_max_age),
        ("exempt_min_age", service.exempt_min_age),
        ("exempt_max_age", service.exempt_max_age),
        ("minimum_age", service.minimum_age),
    ];
    for (field, age) in ages {
        if !(0..=MAX_CHILD_AGE).contains(&age) {
            return Err(ValidationError::InvalidCatalogEntry {
                field,
                requirement: "between 0 and 17",
            });
        }
    }

    if service.child_min_age > service.child_max_age {
        return Err(ValidationError::InvertedBracket {
            min_field: "child_min_age",
            min: service.child_min_age,
            max_field: "child_max_age",
            max: service.child_max_age,
        });
    }
    if service.has_exemption && service.exempt_min_age > service.exempt_max_age {
        return Err(ValidationError::InvertedBracket {
            min_field: "exempt_min_age",
            min: service.exempt_min_age,
            max_field: "exempt_max_age",
            max: service.exempt_max_age,
        });
    }

    Ok(())
}
