//! Receptivo pricing service: tourism pricing and order aggregation.

pub mod cache;
pub mod config;
pub mod error;
pub mod pricing;
pub mod telemetry;

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::sync::Arc;

use crate::cache::CatalogCache;
use crate::config::AppConfig;
use crate::error::Result;
use crate::pricing::queries::PgStore;
use crate::pricing::OrderService;

/// Open the connection pool and bring the schema up to date.
pub async fn connect(config: &AppConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(config.database.require_url()?)
        .await?;

    sqlx::migrate!()
        .run(&pool)
        .await
        .map_err(sqlx::Error::from)?;

    Ok(pool)
}

/// Order service over PostgreSQL, tuned from the configuration.
pub fn order_service(config: &AppConfig, pool: PgPool) -> Arc<OrderService<PgStore>> {
    let cache = CatalogCache::new(config.pricing.catalog_cache_ttl);
    Arc::new(
        OrderService::new(Arc::new(PgStore::new(pool)), cache)
            .with_order_number_attempts(config.pricing.order_number_attempts),
    )
}
