//! Order service: catalog lookups, order numbering, line and transfer
//! booking, and total recomputation on top of an `OrderStore`.
//!
//! Every mutation returns a `Recorded` value carrying the events it produced.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cache::{CacheStats, CatalogCache};

use super::calculators::{
    calculate_order_total, price_line_item, price_quantities, LineBreakdown, OrderTotals,
};
use super::clock::{Clock, SystemClock};
use super::error::{PricingError, PricingResult, StoreError, ValidationError};
use super::events::{PricingEvent, Recorded};
use super::models::{
    BookedLine, Category, Client, LineItem, Order, OrderAggregate, OrderStatus,
    ServiceCatalogEntry, Transfer, TransferCharge, UnitPrices, MAX_QUANTITY,
};
use super::order_number::OrderNumber;
use super::roster;
use super::store::OrderStore;
use super::validation::{validate_line, validate_service, LineQuantities};

/// Order-number insert attempts before giving up with a conflict.
pub const DEFAULT_ORDER_NUMBER_ATTEMPTS: u32 = 3;

/// Header fields for a new order.
#[derive(Debug, Clone, Default)]
pub struct NewOrder {
    pub client_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub notes: String,
}

/// A line as submitted by an operator, before prices are frozen onto it.
#[derive(Debug, Clone)]
pub struct NewLine {
    pub service_date: NaiveDate,
    pub category_id: Uuid,
    pub service_id: Uuid,
    pub quantities: LineQuantities,
    pub public_notes: String,
    pub private_notes: String,
}

#[derive(Debug, Clone)]
pub struct NewTransferCharge {
    pub transfer_id: Uuid,
    pub transfer_date: NaiveDate,
    pub quantity: u32,
    pub notes: String,
}

/// Price preview for a prospective line. Nothing is persisted.
#[derive(Debug, Clone)]
pub struct LineQuote {
    pub service: ServiceCatalogEntry,
    pub unit_prices: UnitPrices,
    pub breakdown: LineBreakdown,
}

pub struct OrderService<S> {
    store: Arc<S>,
    cache: CatalogCache,
    clock: Arc<dyn Clock>,
    order_number_attempts: u32,
}

impl<S: OrderStore> OrderService<S> {
    pub fn new(store: Arc<S>, cache: CatalogCache) -> Self {
        Self {
            store,
            cache,
            clock: Arc::new(SystemClock),
            order_number_attempts: DEFAULT_ORDER_NUMBER_ATTEMPTS,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Values below 1 are treated as 1.
    pub fn with_order_number_attempts(mut self, attempts: u32) -> Self {
        self.order_number_attempts = attempts.max(1);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn cache(&self) -> &CatalogCache {
        &self.cache
    }

    // ==================== Catalog ====================

    pub async fn save_category(&self, category: Category) -> PricingResult<Recorded<Category>> {
        if category.name.trim().is_empty() {
            return Err(ValidationError::InvalidCatalogEntry {
                field: "name",
                requirement: "non-empty",
            }
            .into());
        }
        self.store.upsert_category(&category).await?;
        self.cache.categories.invalidate(&category.id).await;

        let event = PricingEvent::CatalogEntrySaved {
            entity: "category",
            id: category.id,
        };
        Ok(Recorded::new(category, vec![event]))
    }

    /// Save a service after checking its prices and age brackets.
    ///
    /// Lines already booked keep their frozen prices; only their age policy
    /// follows the new version.
    pub async fn save_service(
        &self,
        service: ServiceCatalogEntry,
    ) -> PricingResult<Recorded<ServiceCatalogEntry>> {
        validate_service(&service)?;
        if self.store.category(service.category_id).await?.is_none() {
            return Err(PricingError::not_found("category", service.category_id));
        }
        self.store.upsert_service(&service).await?;
        self.cache.services.invalidate(&service.id).await;

        let event = PricingEvent::CatalogEntrySaved {
            entity: "service",
            id: service.id,
        };
        Ok(Recorded::new(service, vec![event]))
    }

    pub async fn save_transfer(&self, transfer: Transfer) -> PricingResult<Recorded<Transfer>> {
        if transfer.name.trim().is_empty() {
            return Err(ValidationError::InvalidCatalogEntry {
                field: "name",
                requirement: "non-empty",
            }
            .into());
        }
        if transfer.unit_price < Decimal::ZERO {
            return Err(ValidationError::InvalidCatalogEntry {
                field: "unit_price",
                requirement: "zero or positive",
            }
            .into());
        }
        self.store.upsert_transfer(&transfer).await?;
        self.cache.transfers.invalidate(&transfer.id).await;

        let event = PricingEvent::CatalogEntrySaved {
            entity: "transfer",
            id: transfer.id,
        };
        Ok(Recorded::new(transfer, vec![event]))
    }

    pub async fn save_client(&self, client: Client) -> PricingResult<Recorded<Client>> {
        if client.name.trim().is_empty() {
            return Err(ValidationError::InvalidCatalogEntry {
                field: "name",
                requirement: "non-empty",
            }
            .into());
        }
        self.store.upsert_client(&client).await?;

        let event = PricingEvent::CatalogEntrySaved {
            entity: "client",
            id: client.id,
        };
        Ok(Recorded::new(client, vec![event]))
    }

    /// Catalog service by id, active or not. Served from the cache when warm.
    pub async fn service(&self, id: Uuid) -> PricingResult<Arc<ServiceCatalogEntry>> {
        if let Some(cached) = self.cache.services.get(&id).await {
            debug!("Cache HIT for service: {}", id);
            return Ok(cached);
        }
        debug!("Cache MISS for service: {}", id);
        self.fetch_service(id).await
    }

    pub async fn category(&self, id: Uuid) -> PricingResult<Arc<Category>> {
        if let Some(cached) = self.cache.categories.get(&id).await {
            return Ok(cached);
        }
        self.fetch_category(id).await
    }

    pub async fn transfer(&self, id: Uuid) -> PricingResult<Arc<Transfer>> {
        if let Some(cached) = self.cache.transfers.get(&id).await {
            return Ok(cached);
        }
        self.fetch_transfer(id).await
    }

    /// Drop every cached catalog entry, e.g. after a bulk edit made
    /// directly in the database.
    pub async fn invalidate_catalog(&self) -> CacheStats {
        self.cache.invalidate_all().await;
        self.cache.stats()
    }

    // Pricing, booking and recompute go through the fetch_* readers so they
    // always see the stored policy and `active` flag. Each read refreshes
    // the cache entry.

    async fn fetch_service(&self, id: Uuid) -> PricingResult<Arc<ServiceCatalogEntry>> {
        let service = self
            .store
            .service(id)
            .await?
            .ok_or_else(|| PricingError::not_found("service", id))?;
        let service = Arc::new(service);
        self.cache.services.insert(id, service.clone()).await;
        Ok(service)
    }

    async fn fetch_category(&self, id: Uuid) -> PricingResult<Arc<Category>> {
        let category = self
            .store
            .category(id)
            .await?
            .ok_or_else(|| PricingError::not_found("category", id))?;
        let category = Arc::new(category);
        self.cache.categories.insert(id, category.clone()).await;
        Ok(category)
    }

    async fn fetch_transfer(&self, id: Uuid) -> PricingResult<Arc<Transfer>> {
        let transfer = self
            .store
            .transfer(id)
            .await?
            .ok_or_else(|| PricingError::not_found("transfer", id))?;
        let transfer = Arc::new(transfer);
        self.cache.transfers.insert(id, transfer.clone()).await;
        Ok(transfer)
    }

    async fn bookable_service(&self, id: Uuid) -> PricingResult<Arc<ServiceCatalogEntry>> {
        let service = self.fetch_service(id).await?;
        if !service.active {
            return Err(PricingError::Inactive {
                entity: "service",
                id,
            });
        }
        Ok(service)
    }

    async fn bookable_category(&self, id: Uuid) -> PricingResult<Arc<Category>> {
        let category = self.fetch_category(id).await?;
        if !category.active {
            return Err(PricingError::Inactive {
                entity: "category",
                id,
            });
        }
        Ok(category)
    }

    // ==================== Quotes ====================

    /// Validate and price a prospective line against current catalog prices.
    pub async fn quote_line(
        &self,
        category_id: Uuid,
        service_id: Uuid,
        quantities: &LineQuantities,
    ) -> PricingResult<LineQuote> {
        self.bookable_category(category_id).await?;
        let service = self.bookable_service(service_id).await?;
        validate_line(quantities, category_id, &service)?;

        let unit_prices = service.unit_prices();
        let breakdown = price_quantities(
            quantities.qty_full,
            quantities.qty_half,
            quantities.qty_child,
            &quantities.child_ages,
            &unit_prices,
            &service.age_policy(),
        )?;

        Ok(LineQuote {
            service: (*service).clone(),
            unit_prices,
            breakdown,
        })
    }

    // ==================== Orders ====================

    /// Create an order under the next free `{year}-{seq}` number.
    ///
    /// A number taken between the scan and the insert is retried with a
    /// fresh scan, up to the configured number of attempts.
    pub async fn create_order(&self, new: NewOrder) -> PricingResult<Recorded<Order>> {
        if let (Some(start), Some(end)) = (new.start_date, new.end_date) {
            if end < start {
                return Err(ValidationError::InvertedPeriod.into());
            }
        }
        if let Some(client_id) = new.client_id {
            if self.store.client(client_id).await?.is_none() {
                return Err(PricingError::not_found("client", client_id));
            }
        }

        let year = self.clock.year();
        let mut attempt = 0;
        loop {
            attempt += 1;
            let existing = self.store.order_numbers_for_year(year).await?;
            let number = OrderNumber::next_for_year(year, existing.iter().map(String::as_str))?;

            let order = Order {
                id: Uuid::new_v4(),
                number,
                client_id: new.client_id,
                created_at: self.clock.now(),
                start_date: new.start_date,
                end_date: new.end_date,
                status: OrderStatus::Quote,
                itinerary: String::new(),
                notes: new.notes.clone(),
                total_amount: Decimal::ZERO,
            };

            match self.store.insert_order(&order).await {
                Ok(()) => {
                    let event = PricingEvent::OrderCreated {
                        order_id: order.id,
                        order_number: order.number.to_string(),
                        attempts: attempt,
                    };
                    return Ok(Recorded::new(order, vec![event]));
                }
                Err(StoreError::Conflict(message)) => {
                    warn!(
                        "Order number {} taken on attempt {}/{}: {}",
                        number, attempt, self.order_number_attempts, message
                    );
                    if attempt >= self.order_number_attempts {
                        return Err(PricingError::Conflict {
                            number: number.to_string(),
                            attempts: attempt,
                        });
                    }
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    pub async fn order(&self, order_id: Uuid) -> PricingResult<Order> {
        self.store
            .order(order_id)
            .await?
            .ok_or_else(|| PricingError::not_found("order", order_id))
    }

    async fn editable_order(&self, order_id: Uuid) -> PricingResult<Order> {
        let order = self.order(order_id).await?;
        if !order.status.is_editable() {
            return Err(ValidationError::OrderNotEditable {
                status: order.status,
            }
            .into());
        }
        Ok(order)
    }

    /// Book a line, freezing the service's current unit prices onto it.
    pub async fn add_line(
        &self,
        order_id: Uuid,
        new: NewLine,
    ) -> PricingResult<Recorded<LineItem>> {
        self.editable_order(order_id).await?;
        self.bookable_category(new.category_id).await?;
        let service = self.bookable_service(new.service_id).await?;
        validate_line(&new.quantities, new.category_id, &service)?;

        let LineQuantities {
            qty_full,
            qty_half,
            qty_child,
            child_ages,
            half_price_justifications,
        } = new.quantities;

        let line = LineItem {
            id: Uuid::new_v4(),
            order_id: Some(order_id),
            service_date: new.service_date,
            category_id: new.category_id,
            service_id: new.service_id,
            qty_full,
            qty_half,
            qty_child,
            child_ages,
            half_price_justifications,
            unit_prices: service.unit_prices(),
            public_notes: new.public_notes,
            private_notes: new.private_notes,
            created_at: self.clock.now(),
        };
        let line_total = price_line_item(&line, &service.age_policy())?;
        self.store.insert_line(&line).await?;

        let mut events = vec![PricingEvent::LineItemAdded {
            order_id,
            line_id: line.id,
            service_id: line.service_id,
            line_total,
        }];
        events.extend(self.recompute_order_total(order_id).await?.events);
        Ok(Recorded::new(line, events))
    }

    pub async fn remove_line(&self, order_id: Uuid, line_id: Uuid) -> PricingResult<Recorded<()>> {
        self.editable_order(order_id).await?;
        match self.store.delete_line(order_id, line_id).await {
            Err(StoreError::NotFound(_)) => return Err(PricingError::not_found("line", line_id)),
            other => other?,
        }

        let mut events = vec![PricingEvent::LineItemRemoved { order_id, line_id }];
        events.extend(self.recompute_order_total(order_id).await?.events);
        Ok(Recorded::new((), events))
    }

    /// Book a transfer, freezing its current unit price onto the charge.
    pub async fn add_transfer(
        &self,
        order_id: Uuid,
        new: NewTransferCharge,
    ) -> PricingResult<Recorded<TransferCharge>> {
        if new.quantity == 0 {
            return Err(ValidationError::EmptyTransfer.into());
        }
        if new.quantity > MAX_QUANTITY {
            return Err(ValidationError::QuantityTooLarge { max: MAX_QUANTITY }.into());
        }
        self.editable_order(order_id).await?;
        let transfer = self.fetch_transfer(new.transfer_id).await?;
        if !transfer.active {
            return Err(PricingError::Inactive {
                entity: "transfer",
                id: transfer.id,
            });
        }

        let charge = TransferCharge {
            id: Uuid::new_v4(),
            order_id,
            transfer_id: transfer.id,
            transfer_date: new.transfer_date,
            quantity: new.quantity,
            unit_price: transfer.unit_price,
            notes: new.notes,
        };
        self.store.insert_transfer_charge(&charge).await?;

        let mut events = vec![PricingEvent::TransferChargeAdded {
            order_id,
            charge_id: charge.id,
            charge_total: charge.total(),
        }];
        events.extend(self.recompute_order_total(order_id).await?.events);
        Ok(Recorded::new(charge, events))
    }

    /// Order with its client, lines (joined to their services) and transfers.
    pub async fn load_aggregate(&self, order_id: Uuid) -> PricingResult<OrderAggregate> {
        let order = self.order(order_id).await?;
        let client = match order.client_id {
            Some(client_id) => self.store.client(client_id).await?,
            None => None,
        };

        let items = self.store.lines_for_order(order_id).await?;
        let mut services = HashMap::new();
        let mut categories = HashMap::new();
        let mut lines = Vec::with_capacity(items.len());
        for item in items {
            let service = match services.entry(item.service_id) {
                Entry::Occupied(entry) => Arc::clone(entry.get()),
                Entry::Vacant(entry) => {
                    Arc::clone(entry.insert(self.fetch_service(item.service_id).await?))
                }
            };
            let category = match categories.entry(item.category_id) {
                Entry::Occupied(entry) => Arc::clone(entry.get()),
                Entry::Vacant(entry) => {
                    Arc::clone(entry.insert(self.fetch_category(item.category_id).await?))
                }
            };
            lines.push(BookedLine {
                item,
                service: (*service).clone(),
                category_name: category.name.clone(),
            });
        }
        let transfers = self.store.transfer_charges_for_order(order_id).await?;

        Ok(OrderAggregate {
            order,
            client,
            lines,
            transfers,
        })
    }

    /// Recompute the order total from its lines and transfers and persist it.
    ///
    /// Idempotent: an unchanged order yields the same total and no event.
    pub async fn recompute_order_total(
        &self,
        order_id: Uuid,
    ) -> PricingResult<Recorded<OrderTotals>> {
        let aggregate = self.load_aggregate(order_id).await?;
        let totals = calculate_order_total(&aggregate)?;
        let previous = aggregate.order.total_amount;

        let mut events = Vec::new();
        if previous != totals.total {
            self.store.update_order_total(order_id, totals.total).await?;
            events.push(PricingEvent::TotalRecomputed {
                order_id,
                previous,
                total: totals.total,
            });
        }
        Ok(Recorded::new(totals, events))
    }

    /// Operator-driven status change. Any transition is allowed.
    pub async fn set_status(
        &self,
        order_id: Uuid,
        status: OrderStatus,
    ) -> PricingResult<Recorded<Order>> {
        let mut order = self.order(order_id).await?;
        let from = order.status;
        if from == status {
            return Ok(Recorded::new(order, Vec::new()));
        }
        order.status = status;
        self.store.update_order(&order).await?;

        let event = PricingEvent::StatusChanged {
            order_id,
            from,
            to: status,
        };
        Ok(Recorded::new(order, vec![event]))
    }

    /// Store an operator-edited itinerary. Blank text reverts to the draft.
    pub async fn set_itinerary(
        &self,
        order_id: Uuid,
        itinerary: &str,
    ) -> PricingResult<Recorded<Order>> {
        let mut order = self.order(order_id).await?;
        let cleared = itinerary.trim().is_empty();
        order.itinerary = if cleared {
            String::new()
        } else {
            itinerary.to_string()
        };
        self.store.update_order(&order).await?;

        let event = PricingEvent::ItineraryEdited { order_id, cleared };
        Ok(Recorded::new(order, vec![event]))
    }

    pub async fn itinerary(&self, order_id: Uuid) -> PricingResult<String> {
        let aggregate = self.load_aggregate(order_id).await?;
        Ok(roster::render_itinerary(&aggregate)?)
    }

    pub async fn messenger_text(&self, order_id: Uuid) -> PricingResult<String> {
        let aggregate = self.load_aggregate(order_id).await?;
        let totals = calculate_order_total(&aggregate)?;
        Ok(roster::render_messenger_text(&aggregate, totals.total)?)
    }

    /// Confirmation message for one booked line.
    pub async fn line_confirmation(&self, order_id: Uuid, line_id: Uuid) -> PricingResult<String> {
        let aggregate = self.load_aggregate(order_id).await?;
        let line = aggregate
            .lines
            .iter()
            .find(|line| line.item.id == line_id)
            .ok_or_else(|| PricingError::not_found("line", line_id))?;
        Ok(roster::render_line_confirmation(line)?)
    }

    pub async fn delete_order(&self, order_id: Uuid) -> PricingResult<Recorded<()>> {
        let order = self.order(order_id).await?;
        self.store.delete_order(order_id).await?;

        let event = PricingEvent::OrderDeleted {
            order_id,
            order_number: order.number.to_string(),
        };
        Ok(Recorded::new((), vec![event]))
    }
}
