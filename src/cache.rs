//! In-memory caching using moka
//!
//! Catalog entries back display lookups for a short TTL. Booking and total
//! recompute read the store directly and refresh the entry they read; saves
//! through the engine drop it.

use moka::future::Cache;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use crate::pricing::models::{Category, ServiceCatalogEntry, Transfer};

/// Catalog cache keyed by record id
#[derive(Clone)]
pub struct CatalogCache {
    pub services: Cache<Uuid, Arc<ServiceCatalogEntry>>,
    pub categories: Cache<Uuid, Arc<Category>>,
    pub transfers: Cache<Uuid, Arc<Transfer>>,
}

impl CatalogCache {
    /// Create a new cache instance with the given time-to-live
    pub fn new(ttl: Duration) -> Self {
        Self {
            services: Cache::builder()
                .max_capacity(1_000)
                .time_to_live(ttl)
                .build(),

            categories: Cache::builder()
                .max_capacity(100)
                .time_to_live(ttl)
                .build(),

            transfers: Cache::builder()
                .max_capacity(200)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Get cache statistics for monitoring
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            services_size: self.services.entry_count(),
            categories_size: self.categories.entry_count(),
            transfers_size: self.transfers.entry_count(),
        }
    }

    /// Invalidate all caches
    pub async fn invalidate_all(&self) {
        self.services.invalidate_all();
        self.categories.invalidate_all();
        self.transfers.invalidate_all();
        self.services.run_pending_tasks().await;
        self.categories.run_pending_tasks().await;
        self.transfers.run_pending_tasks().await;
        info!("Catalog cache invalidated");
    }
}

impl Default for CatalogCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(5 * 60))
    }
}

/// Cache statistics for monitoring endpoint
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub services_size: u64,
    pub categories_size: u64,
    pub transfers_size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_and_invalidate_category() {
        let cache = CatalogCache::default();
        let id = Uuid::new_v4();
        cache
            .categories
            .insert(
                id,
                Arc::new(Category {
                    id,
                    name: "Atrativos".to_string(),
                    active: true,
                    sort_order: 0,
                }),
            )
            .await;
        assert!(cache.categories.get(&id).await.is_some());

        cache.categories.invalidate(&id).await;
        assert!(cache.categories.get(&id).await.is_none());
    }

    #[tokio::test]
    async fn test_invalidate_all_drops_every_kind() {
        let cache = CatalogCache::default();
        let id = Uuid::new_v4();
        cache
            .transfers
            .insert(
                id,
                Arc::new(Transfer {
                    id,
                    name: "Aeroporto - Hotel".to_string(),
                    unit_price: rust_decimal::Decimal::new(8000, 2),
                    description: String::new(),
                    active: true,
                }),
            )
            .await;

        cache.invalidate_all().await;
        assert!(cache.transfers.get(&id).await.is_none());
    }
}
