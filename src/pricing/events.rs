//! Explicit change records returned by every engine mutation.
//!
//! Callers decide whether to log or persist them; nothing is emitted implicitly.

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use super::models::OrderStatus;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PricingEvent {
    CatalogEntrySaved {
        entity: &'static str,
        id: Uuid,
    },
    OrderCreated {
        order_id: Uuid,
        order_number: String,
        attempts: u32,
    },
    LineItemAdded {
        order_id: Uuid,
        line_id: Uuid,
        service_id: Uuid,
        #[serde(with = "rust_decimal::serde::str")]
        line_total: Decimal,
    },
    LineItemRemoved {
        order_id: Uuid,
        line_id: Uuid,
    },
    TransferChargeAdded {
        order_id: Uuid,
        charge_id: Uuid,
        #[serde(with = "rust_decimal::serde::str")]
        charge_total: Decimal,
    },
    TotalRecomputed {
        order_id: Uuid,
        #[serde(with = "rust_decimal::serde::str")]
        previous: Decimal,
        #[serde(with = "rust_decimal::serde::str")]
        total: Decimal,
    },
    StatusChanged {
        order_id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
    },
    ItineraryEdited {
        order_id: Uuid,
        cleared: bool,
    },
    OrderDeleted {
        order_id: Uuid,
        order_number: String,
    },
}

impl PricingEvent {
    pub fn name(&self) -> &'static str {
        match self {
            PricingEvent::CatalogEntrySaved { .. } => "catalog_entry_saved",
            PricingEvent::OrderCreated { .. } => "order_created",
            PricingEvent::LineItemAdded { .. } => "line_item_added",
            PricingEvent::LineItemRemoved { .. } => "line_item_removed",
            PricingEvent::TransferChargeAdded { .. } => "transfer_charge_added",
            PricingEvent::TotalRecomputed { .. } => "total_recomputed",
            PricingEvent::StatusChanged { .. } => "status_changed",
            PricingEvent::ItineraryEdited { .. } => "itinerary_edited",
            PricingEvent::OrderDeleted { .. } => "order_deleted",
        }
    }
}

/// Value produced by a mutation plus the changes it made.
#[derive(Debug, Clone, PartialEq)]
pub struct Recorded<T> {
    pub value: T,
    pub events: Vec<PricingEvent>,
}

impl<T> Recorded<T> {
    pub fn new(value: T, events: Vec<PricingEvent>) -> Self {
        Self { value, events }
    }
}
