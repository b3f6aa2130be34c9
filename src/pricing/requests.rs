//! Request DTOs for pricing API endpoints.

use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use super::error::ValidationError;
use super::models::{AgePolicy, HalfPriceKind, OrderStatus};
use super::services::{NewLine, NewOrder, NewTransferCharge};
use super::validation::LineQuantities;

/// Request to classify child ages against an age policy
#[derive(Debug, Deserialize)]
pub struct ClassifyAgesRequest {
    pub ages: Vec<i32>,
    /// Declared child count; defaults to the number of ages sent.
    #[serde(default)]
    pub declared: Option<u32>,
    pub policy: AgePolicy,
}

/// Passenger breakdown shared by quote and line requests
#[derive(Debug, Default, Deserialize)]
pub struct QuantitiesRequest {
    #[serde(default)]
    pub qty_full: u32,
    #[serde(default)]
    pub qty_half: u32,
    #[serde(default)]
    pub qty_child: u32,
    #[serde(default)]
    pub child_ages: Vec<i32>,
    /// Tokens (`student`) or printed labels (`Estudante`).
    #[serde(default)]
    pub half_price_justifications: Vec<String>,
}

impl TryFrom<QuantitiesRequest> for LineQuantities {
    type Error = ValidationError;

    fn try_from(req: QuantitiesRequest) -> Result<Self, Self::Error> {
        let half_price_justifications = req
            .half_price_justifications
            .iter()
            .map(|s| s.parse::<HalfPriceKind>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(ValidationError::UnknownJustification)?;

        Ok(LineQuantities {
            qty_full: req.qty_full,
            qty_half: req.qty_half,
            qty_child: req.qty_child,
            child_ages: req.child_ages,
            half_price_justifications,
        })
    }
}

/// Request to price a prospective line without booking it
#[derive(Debug, Deserialize)]
pub struct QuoteLineRequest {
    pub category_id: Uuid,
    pub service_id: Uuid,
    #[serde(flatten)]
    pub quantities: QuantitiesRequest,
}

/// Request to open a new order
#[derive(Debug, Default, Deserialize)]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub client_id: Option<Uuid>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: String,
}

impl From<CreateOrderRequest> for NewOrder {
    fn from(req: CreateOrderRequest) -> Self {
        NewOrder {
            client_id: req.client_id,
            start_date: req.start_date,
            end_date: req.end_date,
            notes: req.notes,
        }
    }
}

/// Request to book a line on an order
#[derive(Debug, Deserialize)]
pub struct AddLineRequest {
    pub service_date: NaiveDate,
    pub category_id: Uuid,
    pub service_id: Uuid,
    #[serde(flatten)]
    pub quantities: QuantitiesRequest,
    #[serde(default)]
    pub public_notes: String,
    #[serde(default)]
    pub private_notes: String,
}

impl TryFrom<AddLineRequest> for NewLine {
    type Error = ValidationError;

    fn try_from(req: AddLineRequest) -> Result<Self, Self::Error> {
        Ok(NewLine {
            service_date: req.service_date,
            category_id: req.category_id,
            service_id: req.service_id,
            quantities: req.quantities.try_into()?,
            public_notes: req.public_notes,
            private_notes: req.private_notes,
        })
    }
}

/// Request to add a transfer charge to an order
#[derive(Debug, Deserialize)]
pub struct AddTransferRequest {
    pub transfer_id: Uuid,
    pub transfer_date: NaiveDate,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default)]
    pub notes: String,
}

fn default_quantity() -> u32 {
    1
}

impl From<AddTransferRequest> for NewTransferCharge {
    fn from(req: AddTransferRequest) -> Self {
        NewTransferCharge {
            transfer_id: req.transfer_id,
            transfer_date: req.transfer_date,
            quantity: req.quantity,
            notes: req.notes,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    pub status: OrderStatus,
}

/// Operator-edited itinerary; blank text reverts to the generated draft
#[derive(Debug, Deserialize)]
pub struct SetItineraryRequest {
    #[serde(default)]
    pub itinerary: String,
}
