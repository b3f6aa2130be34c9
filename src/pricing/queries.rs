//! PostgreSQL implementation of the order store.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::error::StoreError;
use super::models::{
    Category, Client, HalfPriceKind, LineItem, Order, OrderStatus, ServiceCatalogEntry, Transfer,
    TransferCharge, UnitPrices,
};
use super::order_number::OrderNumber;
use super::store::{OrderStore, StoreResult};

/// Order row as stored in pricing_order
#[derive(Debug, Clone, FromRow)]
struct OrderRow {
    id: Uuid,
    order_number: String,
    client_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    status: String,
    itinerary: String,
    notes: String,
    total_amount: Decimal,
}

impl TryFrom<OrderRow> for Order {
    type Error = StoreError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let number = row
            .order_number
            .parse::<OrderNumber>()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let status = row
            .status
            .parse::<OrderStatus>()
            .map_err(|s| StoreError::Backend(format!("unknown order status '{s}'")))?;
        Ok(Order {
            id: row.id,
            number,
            client_id: row.client_id,
            created_at: row.created_at,
            start_date: row.start_date,
            end_date: row.end_date,
            status,
            itinerary: row.itinerary,
            notes: row.notes,
            total_amount: row.total_amount,
        })
    }
}

/// Line row as stored in pricing_line_item
#[derive(Debug, Clone, FromRow)]
struct LineItemRow {
    id: Uuid,
    order_id: Option<Uuid>,
    service_date: NaiveDate,
    category_id: Uuid,
    service_id: Uuid,
    qty_full: i32,
    qty_half: i32,
    qty_child: i32,
    child_ages: Vec<i32>,
    half_price_justifications: Vec<String>,
    unit_full: Decimal,
    unit_half: Decimal,
    unit_child: Decimal,
    public_notes: String,
    private_notes: String,
    created_at: DateTime<Utc>,
}

fn quantity(value: i32, name: &str) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| StoreError::Backend(format!("negative {name}: {value}")))
}

fn column(value: u32, name: &str) -> Result<i32, StoreError> {
    i32::try_from(value).map_err(|_| StoreError::Backend(format!("{name} too large: {value}")))
}

impl TryFrom<LineItemRow> for LineItem {
    type Error = StoreError;

    fn try_from(row: LineItemRow) -> Result<Self, Self::Error> {
        let half_price_justifications = row
            .half_price_justifications
            .iter()
            .map(|token| {
                token
                    .parse::<HalfPriceKind>()
                    .map_err(|t| StoreError::Backend(format!("unknown justification '{t}'")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(LineItem {
            id: row.id,
            order_id: row.order_id,
            service_date: row.service_date,
            category_id: row.category_id,
            service_id: row.service_id,
            qty_full: quantity(row.qty_full, "qty_full")?,
            qty_half: quantity(row.qty_half, "qty_half")?,
            qty_child: quantity(row.qty_child, "qty_child")?,
            child_ages: row.child_ages,
            half_price_justifications,
            unit_prices: UnitPrices {
                full: row.unit_full,
                half: row.unit_half,
                child: row.unit_child,
            },
            public_notes: row.public_notes,
            private_notes: row.private_notes,
            created_at: row.created_at,
        })
    }
}

/// Transfer charge row as stored in pricing_transfer_charge
#[derive(Debug, Clone, FromRow)]
struct TransferChargeRow {
    id: Uuid,
    order_id: Uuid,
    transfer_id: Uuid,
    transfer_date: NaiveDate,
    quantity: i32,
    unit_price: Decimal,
    notes: String,
}

impl TryFrom<TransferChargeRow> for TransferCharge {
    type Error = StoreError;

    fn try_from(row: TransferChargeRow) -> Result<Self, Self::Error> {
        Ok(TransferCharge {
            id: row.id,
            order_id: row.order_id,
            transfer_id: row.transfer_id,
            transfer_date: row.transfer_date,
            quantity: quantity(row.quantity, "quantity")?,
            unit_price: row.unit_price,
            notes: row.notes,
        })
    }
}

/// `OrderStore` over a PostgreSQL pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn category(&self, id: Uuid) -> StoreResult<Option<Category>> {
        let category = sqlx::query_as::<_, Category>(
            r#"
            SELECT id, name, active, sort_order
            FROM pricing_category
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(category)
    }

    async fn upsert_category(&self, category: &Category) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO pricing_category (id, name, active, sort_order)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
               SET name = EXCLUDED.name,
                   active = EXCLUDED.active,
                   sort_order = EXCLUDED.sort_order
            "#,
        )
        .bind(category.id)
        .bind(&category.name)
        .bind(category.active)
        .bind(category.sort_order)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn service(&self, id: Uuid) -> StoreResult<Option<ServiceCatalogEntry>> {
        let service = sqlx::query_as::<_, ServiceCatalogEntry>(
            r#"
            SELECT
                id, category_id, name, description,
                full_price, half_price, child_price,
                accepts_half_price, half_price_rules,
                allows_child_rate, child_min_age, child_max_age,
                has_exemption, exempt_min_age, exempt_max_age, exemption_label,
                has_minimum_age, minimum_age,
                active
            FROM pricing_service
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(service)
    }

    async fn upsert_service(&self, service: &ServiceCatalogEntry) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO pricing_service (
                id, category_id, name, description,
                full_price, half_price, child_price,
                accepts_half_price, half_price_rules,
                allows_child_rate, child_min_age, child_max_age,
                has_exemption, exempt_min_age, exempt_max_age, exemption_label,
                has_minimum_age, minimum_age,
                active
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                    $11, $12, $13, $14, $15, $16, $17, $18, $19)
            ON CONFLICT (id) DO UPDATE
               SET category_id = EXCLUDED.category_id,
                   name = EXCLUDED.name,
                   description = EXCLUDED.description,
                   full_price = EXCLUDED.full_price,
                   half_price = EXCLUDED.half_price,
                   child_price = EXCLUDED.child_price,
                   accepts_half_price = EXCLUDED.accepts_half_price,
                   half_price_rules = EXCLUDED.half_price_rules,
                   allows_child_rate = EXCLUDED.allows_child_rate,
                   child_min_age = EXCLUDED.child_min_age,
                   child_max_age = EXCLUDED.child_max_age,
                   has_exemption = EXCLUDED.has_exemption,
                   exempt_min_age = EXCLUDED.exempt_min_age,
                   exempt_max_age = EXCLUDED.exempt_max_age,
                   exemption_label = EXCLUDED.exemption_label,
                   has_minimum_age = EXCLUDED.has_minimum_age,
                   minimum_age = EXCLUDED.minimum_age,
                   active = EXCLUDED.active
            "#,
        )
        .bind(service.id)
        .bind(service.category_id)
        .bind(&service.name)
        .bind(&service.description)
        .bind(service.full_price)
        .bind(service.half_price)
        .bind(service.child_price)
        .bind(service.accepts_half_price)
        .bind(&service.half_price_rules)
        .bind(service.allows_child_rate)
        .bind(service.child_min_age)
        .bind(service.child_max_age)
        .bind(service.has_exemption)
        .bind(service.exempt_min_age)
        .bind(service.exempt_max_age)
        .bind(&service.exemption_label)
        .bind(service.has_minimum_age)
        .bind(service.minimum_age)
        .bind(service.active)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn transfer(&self, id: Uuid) -> StoreResult<Option<Transfer>> {
        let transfer = sqlx::query_as::<_, Transfer>(
            r#"
            SELECT id, name, unit_price, description, active
            FROM pricing_transfer
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(transfer)
    }

    async fn upsert_transfer(&self, transfer: &Transfer) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO pricing_transfer (id, name, unit_price, description, active)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE
               SET name = EXCLUDED.name,
                   unit_price = EXCLUDED.unit_price,
                   description = EXCLUDED.description,
                   active = EXCLUDED.active
            "#,
        )
        .bind(transfer.id)
        .bind(&transfer.name)
        .bind(transfer.unit_price)
        .bind(&transfer.description)
        .bind(transfer.active)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn client(&self, id: Uuid) -> StoreResult<Option<Client>> {
        let client = sqlx::query_as::<_, Client>(
            r#"
            SELECT id, name, email, phone, whatsapp, active
            FROM pricing_client
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(client)
    }

    async fn upsert_client(&self, client: &Client) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO pricing_client (id, name, email, phone, whatsapp, active)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE
               SET name = EXCLUDED.name,
                   email = EXCLUDED.email,
                   phone = EXCLUDED.phone,
                   whatsapp = EXCLUDED.whatsapp,
                   active = EXCLUDED.active
            "#,
        )
        .bind(client.id)
        .bind(&client.name)
        .bind(&client.email)
        .bind(&client.phone)
        .bind(&client.whatsapp)
        .bind(client.active)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn order_numbers_for_year(&self, year: i32) -> StoreResult<Vec<String>> {
        let numbers: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT order_number
            FROM pricing_order
            WHERE order_number LIKE $1 || '%'
            "#,
        )
        .bind(OrderNumber::year_prefix(year))
        .fetch_all(&self.pool)
        .await?;

        Ok(numbers)
    }

    async fn insert_order(&self, order: &Order) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO pricing_order (
                id, order_number, client_id, created_at,
                start_date, end_date, status, itinerary, notes, total_amount
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(order.id)
        .bind(order.number.to_string())
        .bind(order.client_id)
        .bind(order.created_at)
        .bind(order.start_date)
        .bind(order.end_date)
        .bind(order.status.as_str())
        .bind(&order.itinerary)
        .bind(&order.notes)
        .bind(order.total_amount)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn order(&self, id: Uuid) -> StoreResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT
                id, order_number, client_id, created_at,
                start_date, end_date, status, itinerary, notes, total_amount
            FROM pricing_order
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Order::try_from).transpose()
    }

    async fn update_order(&self, order: &Order) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE pricing_order
               SET client_id = $2,
                   start_date = $3,
                   end_date = $4,
                   status = $5,
                   itinerary = $6,
                   notes = $7
             WHERE id = $1
            "#,
        )
        .bind(order.id)
        .bind(order.client_id)
        .bind(order.start_date)
        .bind(order.end_date)
        .bind(order.status.as_str())
        .bind(&order.itinerary)
        .bind(&order.notes)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("order {}", order.id)));
        }
        Ok(())
    }

    async fn update_order_total(&self, id: Uuid, total: Decimal) -> StoreResult<()> {
        let result = sqlx::query("UPDATE pricing_order SET total_amount = $2 WHERE id = $1")
            .bind(id)
            .bind(total)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("order {id}")));
        }
        Ok(())
    }

    async fn delete_order(&self, id: Uuid) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM pricing_line_item WHERE order_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM pricing_transfer_charge WHERE order_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM pricing_order WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("order {id}")));
        }
        tx.commit().await?;
        Ok(())
    }

    async fn insert_line(&self, line: &LineItem) -> StoreResult<()> {
        let justifications: Vec<&str> = line
            .half_price_justifications
            .iter()
            .map(HalfPriceKind::as_str)
            .collect();

        sqlx::query(
            r#"
            INSERT INTO pricing_line_item (
                id, order_id, service_date, category_id, service_id,
                qty_full, qty_half, qty_child, child_ages, half_price_justifications,
                unit_full, unit_half, unit_child,
                public_notes, private_notes, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                    $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(line.id)
        .bind(line.order_id)
        .bind(line.service_date)
        .bind(line.category_id)
        .bind(line.service_id)
        .bind(column(line.qty_full, "qty_full")?)
        .bind(column(line.qty_half, "qty_half")?)
        .bind(column(line.qty_child, "qty_child")?)
        .bind(&line.child_ages)
        .bind(&justifications)
        .bind(line.unit_prices.full)
        .bind(line.unit_prices.half)
        .bind(line.unit_prices.child)
        .bind(&line.public_notes)
        .bind(&line.private_notes)
        .bind(line.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_line(&self, order_id: Uuid, line_id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM pricing_line_item WHERE id = $1 AND order_id = $2")
            .bind(line_id)
            .bind(order_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("line {line_id}")));
        }
        Ok(())
    }

    async fn lines_for_order(&self, order_id: Uuid) -> StoreResult<Vec<LineItem>> {
        let rows = sqlx::query_as::<_, LineItemRow>(
            r#"
            SELECT
                id, order_id, service_date, category_id, service_id,
                qty_full, qty_half, qty_child, child_ages, half_price_justifications,
                unit_full, unit_half, unit_child,
                public_notes, private_notes, created_at
            FROM pricing_line_item
            WHERE order_id = $1
            ORDER BY service_date, created_at
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(LineItem::try_from).collect()
    }

    async fn insert_transfer_charge(&self, charge: &TransferCharge) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO pricing_transfer_charge (
                id, order_id, transfer_id, transfer_date, quantity, unit_price, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(charge.id)
        .bind(charge.order_id)
        .bind(charge.transfer_id)
        .bind(charge.transfer_date)
        .bind(column(charge.quantity, "quantity")?)
        .bind(charge.unit_price)
        .bind(&charge.notes)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn transfer_charges_for_order(&self, order_id: Uuid) -> StoreResult<Vec<TransferCharge>> {
        let rows = sqlx::query_as::<_, TransferChargeRow>(
            r#"
            SELECT id, order_id, transfer_id, transfer_date, quantity, unit_price, notes
            FROM pricing_transfer_charge
            WHERE order_id = $1
            ORDER BY transfer_date
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TransferCharge::try_from).collect()
    }
}
