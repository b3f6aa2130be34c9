//! End-to-end order scenarios against the in-memory store.

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use receptivo_pricing::cache::CatalogCache;
use receptivo_pricing::pricing::clock::FixedClock;
use receptivo_pricing::pricing::error::StoreError;
use receptivo_pricing::pricing::models::{
    Category, Client, LineItem, Order, ServiceCatalogEntry, Transfer, TransferCharge,
};
use receptivo_pricing::pricing::order_number::OrderNumber;
use receptivo_pricing::pricing::services::{NewLine, NewOrder, NewTransferCharge};
use receptivo_pricing::pricing::store::StoreResult;
use receptivo_pricing::pricing::validation::LineQuantities;
use receptivo_pricing::pricing::{
    ErrorKind, InMemoryStore, OrderService, OrderStore, PricingError, PricingEvent,
    ValidationError,
};

fn date(m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, m, d).unwrap()
}

fn boat_tour(category_id: Uuid) -> ServiceCatalogEntry {
    ServiceCatalogEntry {
        id: Uuid::new_v4(),
        category_id,
        name: "Passeio de Barco".to_string(),
        description: "Saída às 9h".to_string(),
        full_price: dec!(100),
        half_price: dec!(50),
        child_price: dec!(50),
        accepts_half_price: true,
        half_price_rules: "EST. COM CARTEIRINHA, PROF BR, IDOSO".to_string(),
        allows_child_rate: true,
        child_min_age: 0,
        child_max_age: 11,
        has_exemption: true,
        exempt_min_age: 0,
        exempt_max_age: 5,
        exemption_label: "CRIANÇA DE 0 A 5 ANOS".to_string(),
        has_minimum_age: false,
        minimum_age: 0,
        active: true,
    }
}

async fn service_with_store<S: OrderStore>(store: Arc<S>) -> (OrderService<S>, Uuid) {
    let clock = FixedClock(Utc.with_ymd_and_hms(2025, 2, 20, 9, 0, 0).unwrap());
    let service = OrderService::new(store, CatalogCache::default()).with_clock(Arc::new(clock));
    let category = Category {
        id: Uuid::new_v4(),
        name: "Atrativos".to_string(),
        active: true,
        sort_order: 0,
    };
    service.save_category(category.clone()).await.unwrap();
    (service, category.id)
}

fn family_line(category_id: Uuid, service_id: Uuid) -> NewLine {
    NewLine {
        service_date: date(3, 10),
        category_id,
        service_id,
        quantities: LineQuantities {
            qty_full: 1,
            qty_child: 2,
            child_ages: vec![3, 9],
            ..Default::default()
        },
        public_notes: String::new(),
        private_notes: String::new(),
    }
}

// ==================== pricing scenarios ====================

#[tokio::test]
async fn scenario_a_exempt_and_child_rate() {
    let (service, category_id) = service_with_store(Arc::new(InMemoryStore::new())).await;
    let tour = boat_tour(category_id);
    service.save_service(tour.clone()).await.unwrap();

    let order = service.create_order(NewOrder::default()).await.unwrap().value;
    service
        .add_line(order.id, family_line(category_id, tour.id))
        .await
        .unwrap();

    let totals = service.recompute_order_total(order.id).await.unwrap().value;
    assert_eq!(totals.total, dec!(150));
    assert_eq!(service.order(order.id).await.unwrap().total_amount, dec!(150));
}

#[tokio::test]
async fn scenario_b_child_rate_needs_half_price() {
    let (service, category_id) = service_with_store(Arc::new(InMemoryStore::new())).await;
    let mut tour = boat_tour(category_id);
    tour.accepts_half_price = false;
    service.save_service(tour.clone()).await.unwrap();

    let order = service.create_order(NewOrder::default()).await.unwrap().value;
    service
        .add_line(order.id, family_line(category_id, tour.id))
        .await
        .unwrap();

    let totals = service.recompute_order_total(order.id).await.unwrap().value;
    assert_eq!(totals.total, dec!(200));
}

#[tokio::test]
async fn scenario_c_empty_line_is_never_stored() {
    let (service, category_id) = service_with_store(Arc::new(InMemoryStore::new())).await;
    let tour = boat_tour(category_id);
    service.save_service(tour.clone()).await.unwrap();
    let order = service.create_order(NewOrder::default()).await.unwrap().value;

    let mut line = family_line(category_id, tour.id);
    line.quantities = LineQuantities::default();
    let err = service.add_line(order.id, line).await.unwrap_err();

    assert_eq!(err, PricingError::Validation(ValidationError::EmptyLine));
    assert!(service.store().lines_for_order(order.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn catalog_price_change_keeps_booked_prices() {
    let (service, category_id) = service_with_store(Arc::new(InMemoryStore::new())).await;
    let mut tour = boat_tour(category_id);
    service.save_service(tour.clone()).await.unwrap();
    let order = service.create_order(NewOrder::default()).await.unwrap().value;
    service
        .add_line(order.id, family_line(category_id, tour.id))
        .await
        .unwrap();

    tour.full_price = dec!(180);
    tour.child_price = dec!(90);
    service.save_service(tour).await.unwrap();

    let recomputed = service.recompute_order_total(order.id).await.unwrap();
    assert_eq!(recomputed.value.total, dec!(150));
    assert!(recomputed.events.is_empty());
}

#[tokio::test]
async fn age_policy_change_reprices_booked_line() {
    let (service, category_id) = service_with_store(Arc::new(InMemoryStore::new())).await;
    let mut tour = boat_tour(category_id);
    service.save_service(tour.clone()).await.unwrap();
    let order = service.create_order(NewOrder::default()).await.unwrap().value;
    service
        .add_line(order.id, family_line(category_id, tour.id))
        .await
        .unwrap();

    // unit prices stay frozen, the classification follows the current policy
    tour.accepts_half_price = false;
    service.save_service(tour).await.unwrap();

    let recomputed = service.recompute_order_total(order.id).await.unwrap();
    assert_eq!(recomputed.value.total, dec!(200));
    assert_eq!(
        recomputed.events,
        vec![PricingEvent::TotalRecomputed {
            order_id: order.id,
            previous: dec!(150),
            total: dec!(200),
        }]
    );
}

#[tokio::test]
async fn dropping_exemption_charges_the_toddler() {
    let (service, category_id) = service_with_store(Arc::new(InMemoryStore::new())).await;
    let mut tour = boat_tour(category_id);
    service.save_service(tour.clone()).await.unwrap();
    let order = service.create_order(NewOrder::default()).await.unwrap().value;
    service
        .add_line(order.id, family_line(category_id, tour.id))
        .await
        .unwrap();

    tour.has_exemption = false;
    service.save_service(tour).await.unwrap();

    let totals = service.recompute_order_total(order.id).await.unwrap().value;
    assert_eq!(totals.lines_total, dec!(200));
    assert_eq!(totals.total, dec!(200));
}

#[tokio::test]
async fn recompute_sees_policy_edited_outside_the_engine() {
    let (service, category_id) = service_with_store(Arc::new(InMemoryStore::new())).await;
    let mut tour = boat_tour(category_id);
    service.save_service(tour.clone()).await.unwrap();
    let order = service.create_order(NewOrder::default()).await.unwrap().value;
    service
        .add_line(order.id, family_line(category_id, tour.id))
        .await
        .unwrap();
    // warm the cache with the old policy
    service.service(tour.id).await.unwrap();

    tour.accepts_half_price = false;
    service.store().upsert_service(&tour).await.unwrap();

    let totals = service.recompute_order_total(order.id).await.unwrap().value;
    assert_eq!(totals.total, dec!(200));
    assert!(!service.service(tour.id).await.unwrap().accepts_half_price);
}

#[tokio::test]
async fn service_inactivated_outside_the_engine_cannot_be_booked() {
    let (service, category_id) = service_with_store(Arc::new(InMemoryStore::new())).await;
    let mut tour = boat_tour(category_id);
    service.save_service(tour.clone()).await.unwrap();
    service.service(tour.id).await.unwrap();
    let order = service.create_order(NewOrder::default()).await.unwrap().value;

    tour.active = false;
    service.store().upsert_service(&tour).await.unwrap();

    let err = service
        .add_line(order.id, family_line(category_id, tour.id))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        PricingError::Inactive {
            entity: "service",
            id: tour.id
        }
    );
}

#[tokio::test]
async fn inactive_category_cannot_be_booked() {
    let (service, category_id) = service_with_store(Arc::new(InMemoryStore::new())).await;
    let tour = boat_tour(category_id);
    service.save_service(tour.clone()).await.unwrap();
    let order = service.create_order(NewOrder::default()).await.unwrap().value;

    service
        .save_category(Category {
            id: category_id,
            name: "Atrativos".to_string(),
            active: false,
            sort_order: 0,
        })
        .await
        .unwrap();

    let err = service
        .add_line(order.id, family_line(category_id, tour.id))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(
        err,
        PricingError::Inactive {
            entity: "category",
            id: category_id
        }
    );
    assert!(service.store().lines_for_order(order.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn order_total_sums_lines_and_transfers() {
    let (service, category_id) = service_with_store(Arc::new(InMemoryStore::new())).await;
    let tour = boat_tour(category_id);
    service.save_service(tour.clone()).await.unwrap();
    let transfer = Transfer {
        id: Uuid::new_v4(),
        name: "Aeroporto - Hotel".to_string(),
        unit_price: dec!(75.50),
        description: String::new(),
        active: true,
    };
    service.save_transfer(transfer.clone()).await.unwrap();

    let order = service.create_order(NewOrder::default()).await.unwrap().value;
    service
        .add_line(order.id, family_line(category_id, tour.id))
        .await
        .unwrap();
    service
        .add_transfer(
            order.id,
            NewTransferCharge {
                transfer_id: transfer.id,
                transfer_date: date(3, 9),
                quantity: 2,
                notes: "Voo G3 1234".to_string(),
            },
        )
        .await
        .unwrap();

    let totals = service.recompute_order_total(order.id).await.unwrap().value;
    assert_eq!(totals.lines_total, dec!(150));
    assert_eq!(totals.transfers_total, dec!(151.00));
    assert_eq!(totals.total, dec!(301.00));
}

#[tokio::test]
async fn messenger_text_reflects_order() {
    let (service, category_id) = service_with_store(Arc::new(InMemoryStore::new())).await;
    let tour = boat_tour(category_id);
    service.save_service(tour.clone()).await.unwrap();
    let client = Client {
        id: Uuid::new_v4(),
        name: "Ana Lima".to_string(),
        email: String::new(),
        phone: String::new(),
        whatsapp: "+55 84 99999-0000".to_string(),
        active: true,
    };
    service.save_client(client.clone()).await.unwrap();

    let order = service
        .create_order(NewOrder {
            client_id: Some(client.id),
            start_date: Some(date(3, 10)),
            end_date: Some(date(3, 12)),
            notes: String::new(),
        })
        .await
        .unwrap()
        .value;
    service
        .add_line(order.id, family_line(category_id, tour.id))
        .await
        .unwrap();

    let text = service.messenger_text(order.id).await.unwrap();
    assert!(text.starts_with("*ROTEIRO - OS 2025-00001*\n*Cliente:* Ana Lima\n"));
    assert!(text.contains("*Período:* 10/03/2025 a 12/03/2025"));
    assert!(text.contains("MONDAY 10/03"));
    assert!(text.contains("\nPasseio de Barco:\n- Saída às 9h\nR$ 150,00\n"));
    assert!(text.ends_with("*VALOR TOTAL: R$ 150,00*"));
}

// ==================== order numbering scenarios ====================

/// Store whose order-number scans can lag behind committed inserts.
struct StaleScanStore {
    inner: InMemoryStore,
    stale_scans: AtomicU32,
}

impl StaleScanStore {
    fn new(stale_scans: u32) -> Self {
        Self {
            inner: InMemoryStore::new(),
            stale_scans: AtomicU32::new(stale_scans),
        }
    }
}

#[async_trait]
impl OrderStore for StaleScanStore {
    async fn category(&self, id: Uuid) -> StoreResult<Option<Category>> {
        self.inner.category(id).await
    }
    async fn upsert_category(&self, category: &Category) -> StoreResult<()> {
        self.inner.upsert_category(category).await
    }
    async fn service(&self, id: Uuid) -> StoreResult<Option<ServiceCatalogEntry>> {
        self.inner.service(id).await
    }
    async fn upsert_service(&self, service: &ServiceCatalogEntry) -> StoreResult<()> {
        self.inner.upsert_service(service).await
    }
    async fn transfer(&self, id: Uuid) -> StoreResult<Option<Transfer>> {
        self.inner.transfer(id).await
    }
    async fn upsert_transfer(&self, transfer: &Transfer) -> StoreResult<()> {
        self.inner.upsert_transfer(transfer).await
    }
    async fn client(&self, id: Uuid) -> StoreResult<Option<Client>> {
        self.inner.client(id).await
    }
    async fn upsert_client(&self, client: &Client) -> StoreResult<()> {
        self.inner.upsert_client(client).await
    }

    async fn order_numbers_for_year(&self, year: i32) -> StoreResult<Vec<String>> {
        let stale = self
            .stale_scans
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if stale {
            return Ok(Vec::new());
        }
        self.inner.order_numbers_for_year(year).await
    }

    async fn insert_order(&self, order: &Order) -> StoreResult<()> {
        self.inner.insert_order(order).await
    }
    async fn order(&self, id: Uuid) -> StoreResult<Option<Order>> {
        self.inner.order(id).await
    }
    async fn update_order(&self, order: &Order) -> StoreResult<()> {
        self.inner.update_order(order).await
    }
    async fn update_order_total(&self, id: Uuid, total: Decimal) -> StoreResult<()> {
        self.inner.update_order_total(id, total).await
    }
    async fn delete_order(&self, id: Uuid) -> StoreResult<()> {
        self.inner.delete_order(id).await
    }
    async fn insert_line(&self, line: &LineItem) -> StoreResult<()> {
        self.inner.insert_line(line).await
    }
    async fn delete_line(&self, order_id: Uuid, line_id: Uuid) -> StoreResult<()> {
        self.inner.delete_line(order_id, line_id).await
    }
    async fn lines_for_order(&self, order_id: Uuid) -> StoreResult<Vec<LineItem>> {
        self.inner.lines_for_order(order_id).await
    }
    async fn insert_transfer_charge(&self, charge: &TransferCharge) -> StoreResult<()> {
        self.inner.insert_transfer_charge(charge).await
    }
    async fn transfer_charges_for_order(&self, order_id: Uuid) -> StoreResult<Vec<TransferCharge>> {
        self.inner.transfer_charges_for_order(order_id).await
    }
}

#[tokio::test]
async fn scenario_d_conflict_is_retried_with_next_number() {
    let store = Arc::new(StaleScanStore::new(1));
    store
        .inner
        .reserve_number(OrderNumber::new(2025, 1).unwrap())
        .await;
    let (service, _) = service_with_store(store).await;

    let created = service.create_order(NewOrder::default()).await.unwrap();
    assert_eq!(created.value.number.to_string(), "2025-00002");
    assert_eq!(
        created.events,
        vec![PricingEvent::OrderCreated {
            order_id: created.value.id,
            order_number: "2025-00002".to_string(),
            attempts: 2,
        }]
    );
}

#[tokio::test]
async fn scenario_d_retries_are_bounded() {
    let store = Arc::new(StaleScanStore::new(u32::MAX));
    store
        .inner
        .reserve_number(OrderNumber::new(2025, 1).unwrap())
        .await;
    let (service, _) = service_with_store(store).await;

    let err = service.create_order(NewOrder::default()).await.unwrap_err();
    assert_eq!(
        err,
        PricingError::Conflict {
            number: "2025-00001".to_string(),
            attempts: 3,
        }
    );

    let service = service.with_order_number_attempts(1);
    let err = service.create_order(NewOrder::default()).await.unwrap_err();
    assert!(matches!(err, PricingError::Conflict { attempts: 1, .. }));
}

#[tokio::test]
async fn concurrent_creates_never_share_a_number() {
    let (service, _) = service_with_store(Arc::new(InMemoryStore::new())).await;
    let service = Arc::new(service.with_order_number_attempts(10));

    let mut handles = Vec::new();
    for _ in 0..5 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            service.create_order(NewOrder::default()).await
        }));
    }

    let mut numbers = HashSet::new();
    for handle in handles {
        let order = handle.await.unwrap().unwrap().value;
        assert!(numbers.insert(order.number.to_string()));
    }
    assert_eq!(numbers.len(), 5);
}

#[tokio::test]
async fn store_reports_duplicate_number_as_conflict() {
    let store = InMemoryStore::new();
    let number = OrderNumber::new(2025, 4).unwrap();
    store.reserve_number(number).await;

    let order = Order {
        id: Uuid::new_v4(),
        number,
        client_id: None,
        created_at: Utc::now(),
        start_date: None,
        end_date: None,
        status: Default::default(),
        itinerary: String::new(),
        notes: String::new(),
        total_amount: Decimal::ZERO,
    };
    assert!(matches!(
        store.insert_order(&order).await,
        Err(StoreError::Conflict(_))
    ));
}
