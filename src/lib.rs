pub mod cache;
pub mod config;
pub mod controllers;
pub mod database;
pub mod error;
pub mod models;
pub mod redis_client;
pub mod services;
pub mod store;

use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{Config, StoreBackend};
use crate::services::booking::{BookingGranularity, BookingService};
use crate::services::sessions::SessionRegistry;
use crate::store::{MemoryStore, PgStore, Store};

// Shared state for every request handler
#[derive(Clone)]
pub struct AppState {
    pub booking: BookingService,
    pub sessions: SessionRegistry,
}

impl AppState {
    pub fn new(booking: BookingService) -> Arc<Self> {
        Arc::new(Self { booking, sessions: SessionRegistry::new() })
    }

    /// State over an in-process store, with no seat cache.
    pub fn in_memory(store: MemoryStore, granularity: BookingGranularity) -> Arc<Self> {
        Self::new(BookingService::new(Arc::new(store), None, granularity))
    }

    /// Connects the configured store and cache. The database handle is
    /// returned so the caller can close the pool on shutdown.
    pub async fn from_config(config: &Config) -> anyhow::Result<(Arc<Self>, Option<database::Database>)> {
        let (store, db): (Arc<dyn Store>, Option<database::Database>) = match config.database.backend {
            StoreBackend::Postgres => {
                let db = database::Database::connect(&config.database).await?;
                db.run_migrations().await?;
                let store: Arc<dyn Store> = Arc::new(PgStore::new(db.clone()));
                (store, Some(db))
            }
            StoreBackend::Memory => {
                warn!("Using the in-memory store with demo data; nothing will be persisted");
                let store: Arc<dyn Store> = Arc::new(MemoryStore::with_demo_data());
                (store, None)
            }
        };

        let cache = match &config.redis.url {
            Some(url) => match redis_client::RedisClient::connect(url).await {
                Ok(redis) => Some(cache::CacheService::new(redis, config.redis.seat_cache_ttl_seconds)),
                Err(e) => {
                    warn!("Seat cache disabled, Redis unreachable: {}", e);
                    None
                }
            },
            None => None,
        };

        info!(
            "Booking granularity: {:?}, seat cache: {}",
            config.booking.granularity,
            if cache.is_some() { "on" } else { "off" }
        );

        let booking = BookingService::new(store, cache, config.booking.granularity);
        Ok((Self::new(booking), db))
    }
}
