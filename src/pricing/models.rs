//! Domain records for the service catalog and orders.
//!
//! Catalog rows use sqlx's FromRow derive for direct database deserialization.
//! Order-side records go through row structs in `queries` because they carry
//! enums and unsigned quantities.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::order_number::OrderNumber;

/// Oldest age that still counts as a child anywhere in the catalog.
pub const MAX_CHILD_AGE: i32 = 17;

/// Largest passenger or transfer quantity a stored row can hold.
pub const MAX_QUANTITY: u32 = i32::MAX as u32;

/// Grouping label for services (Ex: Atrativos, Hospedagem, Transporte)
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub active: bool,
    pub sort_order: i32,
}

/// Sellable service with price tiers and age/half-price policy.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct ServiceCatalogEntry {
    pub id: Uuid,
    pub category_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,

    #[serde(with = "rust_decimal::serde::str")]
    pub full_price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub half_price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub child_price: Decimal,

    pub accepts_half_price: bool,
    /// Informational only, e.g. "EST. COM CARTEIRINHA, PROF BR, IDOSO".
    #[serde(default)]
    pub half_price_rules: String,

    pub allows_child_rate: bool,
    pub child_min_age: i32,
    pub child_max_age: i32,

    pub has_exemption: bool,
    pub exempt_min_age: i32,
    pub exempt_max_age: i32,
    /// Printed label for the exemption, e.g. "CRIANÇA DE 0 A 6 ANOS".
    #[serde(default)]
    pub exemption_label: String,

    pub has_minimum_age: bool,
    pub minimum_age: i32,

    pub active: bool,
}

impl ServiceCatalogEntry {
    /// The age-bracket part of the entry, which the classifier reads.
    pub fn age_policy(&self) -> AgePolicy {
        AgePolicy {
            accepts_half_price: self.accepts_half_price,
            allows_child_rate: self.allows_child_rate,
            child_min_age: self.child_min_age,
            child_max_age: self.child_max_age,
            has_exemption: self.has_exemption,
            exempt_min_age: self.exempt_min_age,
            exempt_max_age: self.exempt_max_age,
        }
    }

    /// Unit prices as they stand right now, to be frozen onto a new line.
    pub fn unit_prices(&self) -> UnitPrices {
        UnitPrices {
            full: self.full_price,
            half: self.half_price,
            child: self.child_price,
        }
    }

    /// Minimum bookable age, if the service enforces one.
    pub fn minimum_age(&self) -> Option<i32> {
        (self.has_minimum_age && self.minimum_age > 0).then_some(self.minimum_age)
    }
}

/// Age brackets and gating flags used to classify declared child ages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgePolicy {
    pub accepts_half_price: bool,
    pub allows_child_rate: bool,
    pub child_min_age: i32,
    pub child_max_age: i32,
    pub has_exemption: bool,
    pub exempt_min_age: i32,
    pub exempt_max_age: i32,
}

impl AgePolicy {
    pub fn is_exempt(&self, age: i32) -> bool {
        self.has_exemption && (self.exempt_min_age..=self.exempt_max_age).contains(&age)
    }

    pub fn in_child_bracket(&self, age: i32) -> bool {
        (self.child_min_age..=self.child_max_age).contains(&age)
    }

    /// Child pricing only exists when both child-rate and half-price
    /// mechanics are switched on for the service.
    pub fn child_rate_enabled(&self) -> bool {
        self.accepts_half_price && self.allows_child_rate
    }
}

/// Unit prices snapshotted onto a line or quoted from the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitPrices {
    #[serde(with = "rust_decimal::serde::str")]
    pub full: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub half: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub child: Decimal,
}

/// Justification category for a half-price ("meia entrada") passenger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HalfPriceKind {
    Student,
    Teacher,
    Senior,
    BloodDonor,
    PoliceOfficer,
    Disability,
    DisabilityCompanion,
    LowIncomeYouth,
}

impl HalfPriceKind {
    pub const ALL: [HalfPriceKind; 8] = [
        HalfPriceKind::Student,
        HalfPriceKind::Teacher,
        HalfPriceKind::Senior,
        HalfPriceKind::BloodDonor,
        HalfPriceKind::PoliceOfficer,
        HalfPriceKind::Disability,
        HalfPriceKind::DisabilityCompanion,
        HalfPriceKind::LowIncomeYouth,
    ];

    /// Label printed on client-facing texts.
    pub fn label(&self) -> &'static str {
        match self {
            HalfPriceKind::Student => "Estudante",
            HalfPriceKind::Teacher => "Professor",
            HalfPriceKind::Senior => "Idoso",
            HalfPriceKind::BloodDonor => "Doador de sangue",
            HalfPriceKind::PoliceOfficer => "Policial",
            HalfPriceKind::Disability => "PCD",
            HalfPriceKind::DisabilityCompanion => "Acompanhante PCD",
            HalfPriceKind::LowIncomeYouth => "ID Jovem",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HalfPriceKind::Student => "student",
            HalfPriceKind::Teacher => "teacher",
            HalfPriceKind::Senior => "senior",
            HalfPriceKind::BloodDonor => "blood_donor",
            HalfPriceKind::PoliceOfficer => "police_officer",
            HalfPriceKind::Disability => "disability",
            HalfPriceKind::DisabilityCompanion => "disability_companion",
            HalfPriceKind::LowIncomeYouth => "low_income_youth",
        }
    }
}

impl FromStr for HalfPriceKind {
    type Err = String;

    /// Accepts the snake_case token or the printed label, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        HalfPriceKind::ALL
            .into_iter()
            .find(|kind| {
                kind.as_str().eq_ignore_ascii_case(token)
                    || kind.label().eq_ignore_ascii_case(token)
            })
            .ok_or_else(|| token.to_string())
    }
}

impl fmt::Display for HalfPriceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Ground transport item sold alongside services.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Transfer {
    pub id: Uuid,
    pub name: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub unit_price: Decimal,
    #[serde(default)]
    pub description: String,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Client {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub whatsapp: String,
    pub active: bool,
}

/// Order lifecycle flag. Changes are operator-driven only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Quote,
    Confirmed,
    InProgress,
    Completed,
    Canceled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Quote => "quote",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::InProgress => "in_progress",
            OrderStatus::Completed => "completed",
            OrderStatus::Canceled => "canceled",
        }
    }

    /// Lines and transfers can only be changed while the order is editable.
    pub fn is_editable(&self) -> bool {
        matches!(self, OrderStatus::Quote | OrderStatus::Confirmed)
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "quote" => Ok(OrderStatus::Quote),
            "confirmed" => Ok(OrderStatus::Confirmed),
            "in_progress" => Ok(OrderStatus::InProgress),
            "completed" => Ok(OrderStatus::Completed),
            "canceled" => Ok(OrderStatus::Canceled),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One booking line: a service on a date with a passenger breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: Uuid,
    pub order_id: Option<Uuid>,
    pub service_date: NaiveDate,
    pub category_id: Uuid,
    pub service_id: Uuid,

    pub qty_full: u32,
    pub qty_half: u32,
    pub qty_child: u32,
    pub child_ages: Vec<i32>,
    pub half_price_justifications: Vec<HalfPriceKind>,

    /// Frozen at creation; never re-read from the catalog.
    pub unit_prices: UnitPrices,

    #[serde(default)]
    pub public_notes: String,
    #[serde(default)]
    pub private_notes: String,
    pub created_at: DateTime<Utc>,
}

impl LineItem {
    /// Saturates instead of wrapping; validated lines never get near the cap.
    pub fn total_pax(&self) -> u32 {
        self.qty_full
            .saturating_add(self.qty_half)
            .saturating_add(self.qty_child)
    }
}

/// Transfer booked on an order, with its unit price frozen at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferCharge {
    pub id: Uuid,
    pub order_id: Uuid,
    pub transfer_id: Uuid,
    pub transfer_date: NaiveDate,
    pub quantity: u32,
    #[serde(with = "rust_decimal::serde::str")]
    pub unit_price: Decimal,
    #[serde(default)]
    pub notes: String,
}

impl TransferCharge {
    pub fn total(&self) -> Decimal {
        Decimal::from(self.quantity) * self.unit_price
    }
}

/// Order header ("Ordem de Serviço").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub number: OrderNumber,
    pub client_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: OrderStatus,
    /// Operator-edited itinerary. Empty means "not edited yet".
    #[serde(default)]
    pub itinerary: String,
    #[serde(default)]
    pub notes: String,
    /// Derived; only trustworthy right after a recompute.
    #[serde(with = "rust_decimal::serde::str")]
    pub total_amount: Decimal,
}

/// A line together with the catalog entry it references.
#[derive(Debug, Clone, PartialEq)]
pub struct BookedLine {
    pub item: LineItem,
    pub service: ServiceCatalogEntry,
    pub category_name: String,
}

/// An order with everything needed to price and render it.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderAggregate {
    pub order: Order,
    pub client: Option<Client>,
    pub lines: Vec<BookedLine>,
    pub transfers: Vec<TransferCharge>,
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn test_exemption_requires_flag() {
        let mut p = policy();
        assert!(p.is_exempt(3));
        p.has_exemption = false;
        assert!(!p.is_exempt(3));
    }

    #[test]
    fn test_brackets_are_inclusive() {
        let p = policy();
        assert!(p.is_exempt(0));
        assert!(p.is_exempt(5));
        assert!(!p.is_exempt(6));
        assert!(p.in_child_bracket(11));
        assert!(!p.in_child_bracket(12));
    }

    #[test]
    fn test_child_rate_needs_half_price() {
        let mut p = policy();
        assert!(p.child_rate_enabled());
        p.accepts_half_price = false;
        assert!(!p.child_rate_enabled());
    }

    #[test]
    fn test_half_price_kind_parses_token_and_label() {
        assert_eq!("student".parse::<HalfPriceKind>(), Ok(HalfPriceKind::Student));
        assert_eq!("IDOSO".parse::<HalfPriceKind>(), Ok(HalfPriceKind::Senior));
        assert_eq!(" pcd ".parse::<HalfPriceKind>(), Ok(HalfPriceKind::Disability));
        assert_eq!("vip".parse::<HalfPriceKind>(), Err("vip".to_string()));
    }

    #[test]
    fn test_order_status_parses_and_reports_editability() {
        for status in [
            OrderStatus::Quote,
            OrderStatus::Confirmed,
            OrderStatus::InProgress,
            OrderStatus::Completed,
            OrderStatus::Canceled,
        ] {
            assert_eq!(status.as_str().parse::<OrderStatus>(), Ok(status));
        }
        assert!(OrderStatus::Quote.is_editable());
        assert!(OrderStatus::Confirmed.is_editable());
        assert!(!OrderStatus::Completed.is_editable());
        assert_eq!(OrderStatus::default(), OrderStatus::Quote);
    }

    #[test]
    fn test_total_pax_saturates() {
        let line = LineItem {
            id: Uuid::nil(),
            order_id: None,
            service_date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            category_id: Uuid::nil(),
            service_id: Uuid::nil(),
            qty_full: u32::MAX,
            qty_half: 0,
            qty_child: 1,
            child_ages: vec![9],
            half_price_justifications: Vec::new(),
            unit_prices: UnitPrices {
                full: Decimal::ONE,
                half: Decimal::ZERO,
                child: Decimal::ZERO,
            },
            public_notes: String::new(),
            private_notes: String::new(),
            created_at: Utc::now(),
        };
        assert_eq!(line.total_pax(), u32::MAX);
    }
}
