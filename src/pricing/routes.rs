//! Axum routes for the pricing API.
//!
//! Handlers are thin: parse the DTO, call `OrderService`, log the returned
//! events and shape the response.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use crate::cache::CacheStats;
use crate::error::{AppError, Result};

use super::calculators::{calculate_order_total, line_breakdown};
use super::classifier::classify_ages;
use super::error::ValidationError;
use super::events::PricingEvent;
use super::models::{BookedLine, Category, Client, ServiceCatalogEntry, Transfer, MAX_QUANTITY};
use super::requests::{
    AddLineRequest, AddTransferRequest, ClassifyAgesRequest, CreateOrderRequest,
    QuoteLineRequest, SetItineraryRequest, SetStatusRequest,
};
use super::responses::{
    ClassificationResponse, HealthResponse, LineResponse, OrderDetailResponse, OrderResponse,
    QuoteResponse, TextResponse, TotalsResponse, TransferChargeResponse,
};
use super::services::OrderService;
use super::store::OrderStore;
use super::validation::LineQuantities;

type AppState<S> = State<Arc<OrderService<S>>>;

/// Build the pricing router around an order service.
pub fn router<S: OrderStore + 'static>(service: Arc<OrderService<S>>) -> Router {
    Router::new()
        .route("/health", get(health::<S>))
        .route("/api/pricing/classify", post(classify))
        .route("/api/pricing/quote", post(quote::<S>))
        .route("/api/catalog/categories", put(save_category::<S>))
        .route("/api/catalog/services", put(save_service::<S>))
        .route("/api/catalog/services/:id", get(catalog_service::<S>))
        .route("/api/catalog/transfers", put(save_transfer::<S>))
        .route("/api/catalog/clients", put(save_client::<S>))
        .route("/api/catalog/cache/invalidate", post(invalidate_catalog::<S>))
        .route("/api/orders", post(create_order::<S>))
        .route("/api/orders/:id", get(order_detail::<S>).delete(delete_order::<S>))
        .route("/api/orders/:id/lines", post(add_line::<S>))
        .route("/api/orders/:id/lines/:line_id", delete(remove_line::<S>))
        .route(
            "/api/orders/:id/lines/:line_id/confirmation",
            get(line_confirmation::<S>),
        )
        .route("/api/orders/:id/transfers", post(add_transfer::<S>))
        .route("/api/orders/:id/recompute", post(recompute::<S>))
        .route("/api/orders/:id/status", put(set_status::<S>))
        .route(
            "/api/orders/:id/itinerary",
            get(itinerary::<S>).put(set_itinerary::<S>),
        )
        .route("/api/orders/:id/messenger", get(messenger::<S>))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

fn log_events(events: &[PricingEvent]) {
    for event in events {
        info!(event = event.name(), details = ?event, "pricing event");
    }
}

async fn health<S: OrderStore + 'static>(State(service): AppState<S>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        cache: service.cache().stats(),
    })
}

async fn classify(
    Json(req): Json<ClassifyAgesRequest>,
) -> Result<Json<ClassificationResponse>> {
    let declared = match req.declared {
        Some(declared) => declared,
        None => u32::try_from(req.ages.len())
            .map_err(|_| AppError::from(ValidationError::QuantityTooLarge { max: MAX_QUANTITY }))?,
    };
    let classification = classify_ages(&req.ages, declared, &req.policy)?;
    Ok(Json(classification.into()))
}

async fn quote<S: OrderStore + 'static>(
    State(service): AppState<S>,
    Json(req): Json<QuoteLineRequest>,
) -> Result<Json<QuoteResponse>> {
    let quantities = LineQuantities::try_from(req.quantities)?;
    let quote = service
        .quote_line(req.category_id, req.service_id, &quantities)
        .await?;
    Ok(Json(quote.into()))
}

// ==================== Catalog ====================

async fn save_category<S: OrderStore + 'static>(
    State(service): AppState<S>,
    Json(category): Json<Category>,
) -> Result<Json<Category>> {
    let saved = service.save_category(category).await?;
    log_events(&saved.events);
    Ok(Json(saved.value))
}

async fn save_service<S: OrderStore + 'static>(
    State(service): AppState<S>,
    Json(entry): Json<ServiceCatalogEntry>,
) -> Result<Json<ServiceCatalogEntry>> {
    let saved = service.save_service(entry).await?;
    log_events(&saved.events);
    Ok(Json(saved.value))
}

async fn catalog_service<S: OrderStore + 'static>(
    State(service): AppState<S>,
    Path(id): Path<Uuid>,
) -> Result<Json<ServiceCatalogEntry>> {
    let entry = service.service(id).await?;
    Ok(Json((*entry).clone()))
}

async fn save_transfer<S: OrderStore + 'static>(
    State(service): AppState<S>,
    Json(transfer): Json<Transfer>,
) -> Result<Json<Transfer>> {
    let saved = service.save_transfer(transfer).await?;
    log_events(&saved.events);
    Ok(Json(saved.value))
}

async fn save_client<S: OrderStore + 'static>(
    State(service): AppState<S>,
    Json(client): Json<Client>,
) -> Result<Json<Client>> {
    let saved = service.save_client(client).await?;
    log_events(&saved.events);
    Ok(Json(saved.value))
}

async fn invalidate_catalog<S: OrderStore + 'static>(
    State(service): AppState<S>,
) -> Json<CacheStats> {
    Json(service.invalidate_catalog().await)
}

// ==================== Orders ====================

async fn create_order<S: OrderStore + 'static>(
    State(service): AppState<S>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>)> {
    let created = service.create_order(req.into()).await?;
    log_events(&created.events);
    Ok((StatusCode::CREATED, Json(created.value.into())))
}

async fn order_detail<S: OrderStore + 'static>(
    State(service): AppState<S>,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderDetailResponse>> {
    let aggregate = service.load_aggregate(id).await?;
    let totals = calculate_order_total(&aggregate)?;
    let breakdowns = aggregate
        .lines
        .iter()
        .map(|line| line_breakdown(&line.item, &line.service.age_policy()))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(Json(OrderDetailResponse::new(aggregate, breakdowns, totals)))
}

async fn delete_order<S: OrderStore + 'static>(
    State(service): AppState<S>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    let deleted = service.delete_order(id).await?;
    log_events(&deleted.events);
    Ok(StatusCode::NO_CONTENT)
}

async fn add_line<S: OrderStore + 'static>(
    State(service): AppState<S>,
    Path(id): Path<Uuid>,
    Json(req): Json<AddLineRequest>,
) -> Result<(StatusCode, Json<LineResponse>)> {
    let added = service.add_line(id, req.try_into()?).await?;
    log_events(&added.events);

    let line_service = service.service(added.value.service_id).await?;
    let category = service.category(added.value.category_id).await?;
    let breakdown = line_breakdown(&added.value, &line_service.age_policy())?;
    let booked = BookedLine {
        item: added.value,
        service: (*line_service).clone(),
        category_name: category.name.clone(),
    };
    Ok((StatusCode::CREATED, Json(LineResponse::new(booked, breakdown))))
}

async fn remove_line<S: OrderStore + 'static>(
    State(service): AppState<S>,
    Path((id, line_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode> {
    let removed = service.remove_line(id, line_id).await?;
    log_events(&removed.events);
    Ok(StatusCode::NO_CONTENT)
}

async fn line_confirmation<S: OrderStore + 'static>(
    State(service): AppState<S>,
    Path((id, line_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<TextResponse>> {
    let text = service.line_confirmation(id, line_id).await?;
    Ok(Json(TextResponse { text }))
}

async fn add_transfer<S: OrderStore + 'static>(
    State(service): AppState<S>,
    Path(id): Path<Uuid>,
    Json(req): Json<AddTransferRequest>,
) -> Result<(StatusCode, Json<TransferChargeResponse>)> {
    let added = service.add_transfer(id, req.into()).await?;
    log_events(&added.events);
    Ok((StatusCode::CREATED, Json(added.value.into())))
}

async fn recompute<S: OrderStore + 'static>(
    State(service): AppState<S>,
    Path(id): Path<Uuid>,
) -> Result<Json<TotalsResponse>> {
    let totals = service.recompute_order_total(id).await?;
    log_events(&totals.events);
    Ok(Json(totals.value.into()))
}

async fn set_status<S: OrderStore + 'static>(
    State(service): AppState<S>,
    Path(id): Path<Uuid>,
    Json(req): Json<SetStatusRequest>,
) -> Result<Json<OrderResponse>> {
    let updated = service.set_status(id, req.status).await?;
    log_events(&updated.events);
    Ok(Json(updated.value.into()))
}

async fn set_itinerary<S: OrderStore + 'static>(
    State(service): AppState<S>,
    Path(id): Path<Uuid>,
    Json(req): Json<SetItineraryRequest>,
) -> Result<Json<OrderResponse>> {
    let updated = service.set_itinerary(id, &req.itinerary).await?;
    log_events(&updated.events);
    Ok(Json(updated.value.into()))
}

async fn itinerary<S: OrderStore + 'static>(
    State(service): AppState<S>,
    Path(id): Path<Uuid>,
) -> Result<Json<TextResponse>> {
    let text = service.itinerary(id).await?;
    Ok(Json(TextResponse { text }))
}

async fn messenger<S: OrderStore + 'static>(
    State(service): AppState<S>,
    Path(id): Path<Uuid>,
) -> Result<Json<TextResponse>> {
    let text = service.messenger_text(id).await?;
    Ok(Json(TextResponse { text }))
}
