//! Response DTOs for pricing API endpoints.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::cache::CacheStats;

use super::calculators::{format_brl, round_money, LineBreakdown, OrderTotals};
use super::classifier::AgeClassification;
use super::models::{
    BookedLine, HalfPriceKind, Order, OrderAggregate, OrderStatus, TransferCharge, UnitPrices,
};
use super::services::LineQuote;

pub const CURRENCY: &str = "BRL";

/// Money value for JSON responses
#[derive(Debug, Clone, Serialize)]
pub struct MoneyResponse {
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    pub currency: String,
    /// Display form, e.g. `R$ 1.234,56`.
    pub formatted: String,
}

impl MoneyResponse {
    pub fn brl(amount: Decimal) -> Self {
        let mut rounded = round_money(amount, 2);
        rounded.rescale(2);
        Self {
            amount: rounded,
            currency: CURRENCY.to_string(),
            formatted: format_brl(amount),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub cache: CacheStats,
}

/// Response for age classification
#[derive(Debug, Serialize)]
pub struct ClassificationResponse {
    pub exempt: u32,
    pub child_rate: u32,
    pub full_rate: u32,
    pub paying: u32,
    pub total: u32,
}

impl From<AgeClassification> for ClassificationResponse {
    fn from(c: AgeClassification) -> Self {
        Self {
            exempt: c.exempt,
            child_rate: c.child,
            full_rate: c.full,
            paying: c.paying(),
            total: c.total(),
        }
    }
}

/// Per-tier amounts of a priced line
#[derive(Debug, Serialize)]
pub struct BreakdownResponse {
    pub classification: ClassificationResponse,
    pub full_amount: MoneyResponse,
    pub half_amount: MoneyResponse,
    pub child_rate_amount: MoneyResponse,
    pub child_full_amount: MoneyResponse,
    pub total: MoneyResponse,
}

impl From<LineBreakdown> for BreakdownResponse {
    fn from(b: LineBreakdown) -> Self {
        Self {
            classification: b.classification.into(),
            full_amount: MoneyResponse::brl(b.full_amount),
            half_amount: MoneyResponse::brl(b.half_amount),
            child_rate_amount: MoneyResponse::brl(b.child_rate_amount),
            child_full_amount: MoneyResponse::brl(b.child_full_amount),
            total: MoneyResponse::brl(b.total),
        }
    }
}

/// Response for a line quote
#[derive(Debug, Serialize)]
pub struct QuoteResponse {
    pub service_id: Uuid,
    pub service_name: String,
    pub unit_prices: UnitPrices,
    pub half_price_rules: String,
    pub exemption_label: String,
    pub breakdown: BreakdownResponse,
}

impl From<LineQuote> for QuoteResponse {
    fn from(q: LineQuote) -> Self {
        Self {
            service_id: q.service.id,
            service_name: q.service.name,
            unit_prices: q.unit_prices,
            half_price_rules: q.service.half_price_rules,
            exemption_label: q.service.exemption_label,
            breakdown: q.breakdown.into(),
        }
    }
}

/// Order header
#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: Uuid,
    pub number: String,
    pub client_id: Option<Uuid>,
    pub status: OrderStatus,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub itinerary: String,
    pub notes: String,
    pub total: MoneyResponse,
    pub created_at: DateTime<Utc>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            number: order.number.to_string(),
            client_id: order.client_id,
            status: order.status,
            start_date: order.start_date,
            end_date: order.end_date,
            itinerary: order.itinerary,
            notes: order.notes,
            total: MoneyResponse::brl(order.total_amount),
            created_at: order.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LineResponse {
    pub id: Uuid,
    pub service_date: NaiveDate,
    pub category_id: Uuid,
    pub category_name: String,
    pub service_id: Uuid,
    pub service_name: String,
    pub qty_full: u32,
    pub qty_half: u32,
    pub qty_child: u32,
    pub child_ages: Vec<i32>,
    pub half_price_justifications: Vec<HalfPriceKind>,
    pub unit_prices: UnitPrices,
    pub public_notes: String,
    pub private_notes: String,
    pub breakdown: BreakdownResponse,
}

impl LineResponse {
    pub fn new(line: BookedLine, breakdown: LineBreakdown) -> Self {
        let BookedLine {
            item,
            service,
            category_name,
        } = line;
        Self {
            id: item.id,
            service_date: item.service_date,
            category_id: item.category_id,
            category_name,
            service_id: item.service_id,
            service_name: service.name,
            qty_full: item.qty_full,
            qty_half: item.qty_half,
            qty_child: item.qty_child,
            child_ages: item.child_ages,
            half_price_justifications: item.half_price_justifications,
            unit_prices: item.unit_prices,
            public_notes: item.public_notes,
            private_notes: item.private_notes,
            breakdown: breakdown.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TransferChargeResponse {
    pub id: Uuid,
    pub transfer_id: Uuid,
    pub transfer_date: NaiveDate,
    pub quantity: u32,
    pub unit_price: MoneyResponse,
    pub total: MoneyResponse,
    pub notes: String,
}

impl From<TransferCharge> for TransferChargeResponse {
    fn from(charge: TransferCharge) -> Self {
        let total = charge.total();
        Self {
            id: charge.id,
            transfer_id: charge.transfer_id,
            transfer_date: charge.transfer_date,
            quantity: charge.quantity,
            unit_price: MoneyResponse::brl(charge.unit_price),
            total: MoneyResponse::brl(total),
            notes: charge.notes,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TotalsResponse {
    pub lines_total: MoneyResponse,
    pub transfers_total: MoneyResponse,
    pub total: MoneyResponse,
}

impl From<OrderTotals> for TotalsResponse {
    fn from(t: OrderTotals) -> Self {
        Self {
            lines_total: MoneyResponse::brl(t.lines_total),
            transfers_total: MoneyResponse::brl(t.transfers_total),
            total: MoneyResponse::brl(t.total),
        }
    }
}

/// Full order: header, client, priced lines, transfers and fresh totals
#[derive(Debug, Serialize)]
pub struct OrderDetailResponse {
    pub order: OrderResponse,
    pub client_name: Option<String>,
    pub lines: Vec<LineResponse>,
    pub transfers: Vec<TransferChargeResponse>,
    pub totals: TotalsResponse,
}

impl OrderDetailResponse {
    /// `breakdowns` must line up with `aggregate.lines`.
    pub fn new(
        aggregate: OrderAggregate,
        breakdowns: Vec<LineBreakdown>,
        totals: OrderTotals,
    ) -> Self {
        let OrderAggregate {
            order,
            client,
            lines,
            transfers,
        } = aggregate;
        Self {
            order: order.into(),
            client_name: client.map(|c| c.name),
            lines: lines
                .into_iter()
                .zip(breakdowns)
                .map(|(line, breakdown)| LineResponse::new(line, breakdown))
                .collect(),
            transfers: transfers.into_iter().map(Into::into).collect(),
            totals: totals.into(),
        }
    }
}

/// Plain text rendering (itinerary, messenger message, confirmation)
#[derive(Debug, Serialize)]
pub struct TextResponse {
    pub text: String,
}

/// Generic pricing error response
#[derive(Debug, Serialize)]
pub struct PricingErrorResponse {
    pub error_type: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}
