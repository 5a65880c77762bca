//! Redis cache of derived seat grids.
//!
//! The store stays the source of truth: a miss or a Redis failure falls
//! through to the store, and every ticket insert drops the showtime's entry.

use redis::AsyncCommands;
use tracing::{debug, warn};

use crate::models::ShowtimeId;
use crate::redis_client::RedisClient;
use crate::services::seat_grid::SeatGrid;

#[derive(Clone)]
pub struct CacheService {
    redis: RedisClient,
    ttl_seconds: u64,
}

fn seats_key(showtime_id: ShowtimeId) -> String {
    format!("seats:{}", showtime_id)
}

impl CacheService {
    pub fn new(redis: RedisClient, ttl_seconds: u64) -> Self {
        Self { redis, ttl_seconds }
    }

    pub async fn get_seat_grid(&self, showtime_id: ShowtimeId) -> Option<SeatGrid> {
        let mut conn = self.redis.conn.clone();
        let data: Option<String> = match conn.get(seats_key(showtime_id)).await {
            Ok(data) => data,
            Err(e) => {
                warn!("seat cache read failed for showtime {}: {}", showtime_id, e);
                return None;
            }
        };

        let grid = data.and_then(|json| match serde_json::from_str::<SeatGrid>(&json) {
            Ok(grid) => Some(grid),
            Err(e) => {
                warn!("dropping unreadable seat cache entry for showtime {}: {}", showtime_id, e);
                None
            }
        });
        if grid.is_some() {
            debug!("seat cache hit for showtime {}", showtime_id);
        }
        grid
    }

    pub async fn save_seat_grid(&self, grid: &SeatGrid) {
        let data = match serde_json::to_string(grid) {
            Ok(data) => data,
            Err(e) => {
                warn!("could not serialize seat grid for showtime {}: {}", grid.showtime_id, e);
                return;
            }
        };

        let mut conn = self.redis.conn.clone();
        let saved: redis::RedisResult<()> = conn
            .set_ex(seats_key(grid.showtime_id), data, self.ttl_seconds)
            .await;
        if let Err(e) = saved {
            warn!("seat cache write failed for showtime {}: {}", grid.showtime_id, e);
        }
    }

    pub async fn invalidate_seats(&self, showtime_id: ShowtimeId) {
        let mut conn = self.redis.conn.clone();
        let deleted: redis::RedisResult<()> = conn.del(seats_key(showtime_id)).await;
        match deleted {
            Ok(()) => debug!("Invalidated seats cache for showtime {}", showtime_id),
            Err(e) => warn!("seat cache invalidation failed for showtime {}: {}", showtime_id, e),
        }
    }
}
