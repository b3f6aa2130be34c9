//! Record store the pricing engine reads from and writes to.
//!
//! `queries::PgStore` is the PostgreSQL implementation; `InMemoryStore`
//! backs tests and local runs without a database.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::error::StoreError;
use super::models::{
    Category, Client, LineItem, Order, ServiceCatalogEntry, Transfer, TransferCharge,
};
use super::order_number::OrderNumber;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn category(&self, id: Uuid) -> StoreResult<Option<Category>>;
    async fn upsert_category(&self, category: &Category) -> StoreResult<()>;

    async fn service(&self, id: Uuid) -> StoreResult<Option<ServiceCatalogEntry>>;
    async fn upsert_service(&self, service: &ServiceCatalogEntry) -> StoreResult<()>;

    async fn transfer(&self, id: Uuid) -> StoreResult<Option<Transfer>>;
    async fn upsert_transfer(&self, transfer: &Transfer) -> StoreResult<()>;

    async fn client(&self, id: Uuid) -> StoreResult<Option<Client>>;
    async fn upsert_client(&self, client: &Client) -> StoreResult<()>;

    /// Every order number issued with the `{year}-` prefix.
    async fn order_numbers_for_year(&self, year: i32) -> StoreResult<Vec<String>>;

    /// Insert a new order. A taken order number yields `StoreError::Conflict`.
    async fn insert_order(&self, order: &Order) -> StoreResult<()>;
    async fn order(&self, id: Uuid) -> StoreResult<Option<Order>>;
    /// Update the mutable header fields (status, dates, itinerary, notes, client).
    async fn update_order(&self, order: &Order) -> StoreResult<()>;
    async fn update_order_total(&self, id: Uuid, total: Decimal) -> StoreResult<()>;
    /// Remove the order together with its lines and transfer charges.
    async fn delete_order(&self, id: Uuid) -> StoreResult<()>;

    async fn insert_line(&self, line: &LineItem) -> StoreResult<()>;
    async fn delete_line(&self, order_id: Uuid, line_id: Uuid) -> StoreResult<()>;
    /// Lines of an order, ordered by service date then creation time.
    async fn lines_for_order(&self, order_id: Uuid) -> StoreResult<Vec<LineItem>>;

    async fn insert_transfer_charge(&self, charge: &TransferCharge) -> StoreResult<()>;
    /// Transfer charges of an order, ordered by transfer date.
    async fn transfer_charges_for_order(&self, order_id: Uuid) -> StoreResult<Vec<TransferCharge>>;
}

#[derive(Default)]
struct Tables {
    categories: HashMap<Uuid, Category>,
    services: HashMap<Uuid, ServiceCatalogEntry>,
    transfers: HashMap<Uuid, Transfer>,
    clients: HashMap<Uuid, Client>,
    orders: HashMap<Uuid, Order>,
    lines: Vec<LineItem>,
    transfer_charges: Vec<TransferCharge>,
}

/// In-memory store enforcing the same order-number uniqueness as the database.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an order number directly, as a concurrent writer would.
    pub async fn reserve_number(&self, number: OrderNumber) {
        let mut tables = self.tables.write().await;
        let id = Uuid::new_v4();
        tables.orders.insert(
            id,
            Order {
                id,
                number,
                client_id: None,
                created_at: chrono::Utc::now(),
                start_date: None,
                end_date: None,
                status: Default::default(),
                itinerary: String::new(),
                notes: String::new(),
                total_amount: Decimal::ZERO,
            },
        );
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn category(&self, id: Uuid) -> StoreResult<Option<Category>> {
        Ok(self.tables.read().await.categories.get(&id).cloned())
    }

    async fn upsert_category(&self, category: &Category) -> StoreResult<()> {
        self.tables
            .write()
            .await
            .categories
            .insert(category.id, category.clone());
        Ok(())
    }

    async fn service(&self, id: Uuid) -> StoreResult<Option<ServiceCatalogEntry>> {
        Ok(self.tables.read().await.services.get(&id).cloned())
    }

    async fn upsert_service(&self, service: &ServiceCatalogEntry) -> StoreResult<()> {
        self.tables
            .write()
            .await
            .services
            .insert(service.id, service.clone());
        Ok(())
    }

    async fn transfer(&self, id: Uuid) -> StoreResult<Option<Transfer>> {
        Ok(self.tables.read().await.transfers.get(&id).cloned())
    }

    async fn upsert_transfer(&self, transfer: &Transfer) -> StoreResult<()> {
        self.tables
            .write()
            .await
            .transfers
            .insert(transfer.id, transfer.clone());
        Ok(())
    }

    async fn client(&self, id: Uuid) -> StoreResult<Option<Client>> {
        Ok(self.tables.read().await.clients.get(&id).cloned())
    }

    async fn upsert_client(&self, client: &Client) -> StoreResult<()> {
        self.tables
            .write()
            .await
            .clients
            .insert(client.id, client.clone());
        Ok(())
    }

    async fn order_numbers_for_year(&self, year: i32) -> StoreResult<Vec<String>> {
        let prefix = OrderNumber::year_prefix(year);
        Ok(self
            .tables
            .read()
            .await
            .orders
            .values()
            .map(|order| order.number.to_string())
            .filter(|number| number.starts_with(&prefix))
            .collect())
    }

    async fn insert_order(&self, order: &Order) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.orders.values().any(|o| o.number == order.number) {
            return Err(StoreError::Conflict(format!(
                "order_number {} already exists",
                order.number
            )));
        }
        tables.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn order(&self, id: Uuid) -> StoreResult<Option<Order>> {
        Ok(self.tables.read().await.orders.get(&id).cloned())
    }

    async fn update_order(&self, order: &Order) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .orders
            .get_mut(&order.id)
            .ok_or_else(|| StoreError::NotFound(format!("order {}", order.id)))?;
        stored.client_id = order.client_id;
        stored.start_date = order.start_date;
        stored.end_date = order.end_date;
        stored.status = order.status;
        stored.itinerary = order.itinerary.clone();
        stored.notes = order.notes.clone();
        Ok(())
    }

    async fn update_order_total(&self, id: Uuid, total: Decimal) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .orders
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("order {id}")))?;
        stored.total_amount = total;
        Ok(())
    }

    async fn delete_order(&self, id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.orders.remove(&id).is_none() {
            return Err(StoreError::NotFound(format!("order {id}")));
        }
        tables.lines.retain(|line| line.order_id != Some(id));
        tables.transfer_charges.retain(|charge| charge.order_id != id);
        Ok(())
    }

    async fn insert_line(&self, line: &LineItem) -> StoreResult<()> {
        self.tables.write().await.lines.push(line.clone());
        Ok(())
    }

    async fn delete_line(&self, order_id: Uuid, line_id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let before = tables.lines.len();
        tables
            .lines
            .retain(|line| !(line.id == line_id && line.order_id == Some(order_id)));
        if tables.lines.len() == before {
            return Err(StoreError::NotFound(format!("line {line_id}")));
        }
        Ok(())
    }

    async fn lines_for_order(&self, order_id: Uuid) -> StoreResult<Vec<LineItem>> {
        let mut lines: Vec<LineItem> = self
            .tables
            .read()
            .await
            .lines
            .iter()
            .filter(|line| line.order_id == Some(order_id))
            .cloned()
            .collect();
        lines.sort_by_key(|line| (line.service_date, line.created_at));
        Ok(lines)
    }

    async fn insert_transfer_charge(&self, charge: &TransferCharge) -> StoreResult<()> {
        self.tables
            .write()
            .await
            .transfer_charges
            .push(charge.clone());
        Ok(())
    }

    async fn transfer_charges_for_order(&self, order_id: Uuid) -> StoreResult<Vec<TransferCharge>> {
        let mut charges: Vec<TransferCharge> = self
            .tables
            .read()
            .await
            .transfer_charges
            .iter()
            .filter(|charge| charge.order_id == order_id)
            .cloned()
            .collect();
        charges.sort_by_key(|charge| charge.transfer_date);
        Ok(charges)
    }
}
