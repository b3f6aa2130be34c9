//! Core pricing calculation functions.
//!
//! Pure functions for pricing math - no database access.

use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::Serialize;

use super::classifier::{classify_ages, AgeClassification};
use super::error::ValidationError;
use super::models::{AgePolicy, LineItem, OrderAggregate, TransferCharge, UnitPrices};

/// Round to specified decimal places using banker's rounding (ROUND_HALF_EVEN).
///
/// Banker's rounding rounds to the nearest even number when the value is exactly
/// halfway between two possibilities. This reduces cumulative rounding bias.
///
/// # Examples
/// ```
/// use rust_decimal_macros::dec;
/// use receptivo_pricing::pricing::round_money;
///
/// assert_eq!(round_money(dec!(2.5), 0), dec!(2));   // rounds to even
/// assert_eq!(round_money(dec!(3.5), 0), dec!(4));   // rounds to even
/// assert_eq!(round_money(dec!(1.234), 2), dec!(1.23));
/// ```
pub fn round_money(amount: Decimal, places: u32) -> Decimal {
    amount.round_dp_with_strategy(places, RoundingStrategy::MidpointNearestEven)
}

/// Format an amount the Brazilian way: `R$ 1.234,56`.
///
/// # Examples
/// ```
/// use rust_decimal_macros::dec;
/// use receptivo_pricing::pricing::format_brl;
///
/// assert_eq!(format_brl(dec!(1234.5)), "R$ 1.234,50");
/// ```
pub fn format_brl(amount: Decimal) -> String {
    let rounded = round_money(amount, 2);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    let cents = (rounded.abs() * Decimal::ONE_HUNDRED).to_u128().unwrap_or(0);
    let (units, cents) = (cents / 100, cents % 100);

    let digits = units.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    format!("R$ {sign}{grouped},{cents:02}")
}

/// Per-tier breakdown of one line's total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LineBreakdown {
    pub classification: AgeClassification,
    #[serde(with = "rust_decimal::serde::str")]
    pub full_amount: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub half_amount: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub child_rate_amount: Decimal,
    /// Children outside the child bracket, charged at the full unit price.
    #[serde(with = "rust_decimal::serde::str")]
    pub child_full_amount: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub total: Decimal,
}

/// Price a passenger breakdown against unit prices.
///
/// ```text
/// total = qty_full * full + qty_half * half
///       + child_rate_count * child + full_rate_count * full
/// ```
/// Exempt children contribute nothing.
pub fn price_quantities(
    qty_full: u32,
    qty_half: u32,
    qty_child: u32,
    child_ages: &[i32],
    prices: &UnitPrices,
    policy: &AgePolicy,
) -> Result<LineBreakdown, ValidationError> {
    let classification = classify_ages(child_ages, qty_child, policy)?;

    let full_amount = Decimal::from(qty_full) * prices.full;
    let half_amount = Decimal::from(qty_half) * prices.half;
    let child_rate_amount = Decimal::from(classification.child) * prices.child;
    let child_full_amount = Decimal::from(classification.full) * prices.full;

    Ok(LineBreakdown {
        classification,
        full_amount,
        half_amount,
        child_rate_amount,
        child_full_amount,
        total: full_amount + half_amount + child_rate_amount + child_full_amount,
    })
}

/// Breakdown for a stored line, using its snapshotted prices and the
/// service's current age policy.
pub fn line_breakdown(
    line: &LineItem,
    policy: &AgePolicy,
) -> Result<LineBreakdown, ValidationError> {
    price_quantities(
        line.qty_full,
        line.qty_half,
        line.qty_child,
        &line.child_ages,
        &line.unit_prices,
        policy,
    )
}

/// Monetary total for one line. Recomputed on every call, never cached.
pub fn price_line_item(line: &LineItem, policy: &AgePolicy) -> Result<Decimal, ValidationError> {
    line_breakdown(line, policy).map(|b| b.total)
}

/// Sum of flat transfer charges.
pub fn transfers_total(transfers: &[TransferCharge]) -> Decimal {
    transfers.iter().map(TransferCharge::total).sum()
}

/// Result of an order total computation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderTotals {
    pub lines_total: Decimal,
    pub transfers_total: Decimal,
    pub total: Decimal,
}

/// Sum every line and transfer charge of an order.
pub fn calculate_order_total(aggregate: &OrderAggregate) -> Result<OrderTotals, ValidationError> {
    let mut lines_total = Decimal::ZERO;
    for line in &aggregate.lines {
        lines_total += price_line_item(&line.item, &line.service.age_policy())?;
    }
    let transfers_total = transfers_total(&aggregate.transfers);

    Ok(OrderTotals {
        lines_total,
        transfers_total,
        total: lines_total + transfers_total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn policy() -> AgePolicy {
        AgePolicy {
            accepts_half_price: true,
            allows_child_rate: true,
            child_min_age: 0,
            child_max_age: 11,
            has_exemption: true,
            exempt_min_age: 0,
            exempt_max_age: 5,
        }
    }

    fn prices() -> UnitPrices {
        UnitPrices {
            full: dec!(100),
            half: dec!(50),
            child: dec!(50),
        }
    }

    fn line(qty_full: u32, qty_half: u32, child_ages: Vec<i32>) -> LineItem {
        LineItem {
            id: Uuid::new_v4(),
            order_id: None,
            service_date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            category_id: Uuid::new_v4(),
            service_id: Uuid::new_v4(),
            qty_full,
            qty_half,
            qty_child: child_ages.len() as u32,
            child_ages,
            half_price_justifications: vec![],
            unit_prices: prices(),
            public_notes: String::new(),
            private_notes: String::new(),
            created_at: Utc::now(),
        }
    }

    // ==================== round_money tests ====================

    #[test]
    fn test_round_money_bankers_rounding_to_even() {
        assert_eq!(round_money(dec!(2.5), 0), dec!(2));
        assert_eq!(round_money(dec!(3.5), 0), dec!(4));
        assert_eq!(round_money(dec!(2.25), 1), dec!(2.2));
        assert_eq!(round_money(dec!(2.35), 1), dec!(2.4));
    }

    #[test]
    fn test_round_money_normal_rounding() {
        assert_eq!(round_money(dec!(1.234), 2), dec!(1.23));
        assert_eq!(round_money(dec!(1.236), 2), dec!(1.24));
        assert_eq!(round_money(dec!(999999.995), 2), dec!(1000000.00));
    }

    // ==================== format_brl tests ====================

    #[test]
    fn test_format_brl_small_amounts() {
        assert_eq!(format_brl(dec!(0)), "R$ 0,00");
        assert_eq!(format_brl(dec!(5)), "R$ 5,00");
        assert_eq!(format_brl(dec!(99.9)), "R$ 99,90");
        assert_eq!(format_brl(dec!(150)), "R$ 150,00");
    }

    #[test]
    fn test_format_brl_thousands_separators() {
        assert_eq!(format_brl(dec!(1234.56)), "R$ 1.234,56");
        assert_eq!(format_brl(dec!(1000)), "R$ 1.000,00");
        assert_eq!(format_brl(dec!(1234567.8)), "R$ 1.234.567,80");
    }

    #[test]
    fn test_format_brl_rounds_and_signs() {
        assert_eq!(format_brl(dec!(10.005)), "R$ 10,00"); // half-even
        assert_eq!(format_brl(dec!(-42.5)), "R$ -42,50");
    }

    // ==================== price_line_item tests ====================

    #[test]
    fn test_price_line_exempt_and_child_rate() {
        // one adult, age 3 exempt, age 9 at child rate
        let item = line(1, 0, vec![3, 9]);
        assert_eq!(price_line_item(&item, &policy()).unwrap(), dec!(150));
    }

    #[test]
    fn test_price_line_without_half_price_bumps_children_to_full() {
        let mut p = policy();
        p.accepts_half_price = false;
        let item = line(1, 0, vec![3, 9]);
        assert_eq!(price_line_item(&item, &p).unwrap(), dec!(200));
    }

    #[test]
    fn test_price_line_breakdown_components() {
        let item = line(2, 1, vec![4, 8, 15]);
        let b = line_breakdown(&item, &policy()).unwrap();
        assert_eq!(b.full_amount, dec!(200));
        assert_eq!(b.half_amount, dec!(50));
        assert_eq!(b.child_rate_amount, dec!(50));
        assert_eq!(b.child_full_amount, dec!(100));
        assert_eq!(b.total, dec!(400));
        assert_eq!(b.classification.exempt, 1);
    }

    #[test]
    fn test_changing_ages_keeps_adult_contribution() {
        let a = line_breakdown(&line(2, 1, vec![1, 7]), &policy()).unwrap();
        let b = line_breakdown(&line(2, 1, vec![16, 17]), &policy()).unwrap();
        assert_eq!(a.full_amount, b.full_amount);
        assert_eq!(a.half_amount, b.half_amount);
        assert!(a.total >= Decimal::ZERO && b.total >= Decimal::ZERO);
    }

    #[test]
    fn test_price_line_uses_snapshot_not_catalog() {
        let mut item = line(1, 0, vec![]);
        item.unit_prices.full = dec!(80);
        assert_eq!(price_line_item(&item, &policy()).unwrap(), dec!(80));
    }

    #[test]
    fn test_price_line_rejects_bad_ages() {
        let mut item = line(1, 0, vec![3]);
        item.qty_child = 2;
        assert!(price_line_item(&item, &policy()).is_err());
    }

    // ==================== transfers_total tests ====================

    #[test]
    fn test_transfers_total_is_quantity_times_unit_price() {
        let order_id = Uuid::new_v4();
        let charge = |quantity, unit_price| TransferCharge {
            id: Uuid::new_v4(),
            order_id,
            transfer_id: Uuid::new_v4(),
            transfer_date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            quantity,
            unit_price,
            notes: String::new(),
        };
        let total = transfers_total(&[charge(2, dec!(35.50)), charge(1, dec!(120))]);
        assert_eq!(total, dec!(191.00));
        assert_eq!(transfers_total(&[]), Decimal::ZERO);
    }
}
