use crate::redis_client::RedisClient;
use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};
use tracing::warn;

pub mod events;
pub mod movies;

/// Best-effort Redis cache. A failing Redis only costs a trip to the source.
#[derive(Clone)]
pub struct CacheService {
    redis: RedisClient,
}

impl CacheService {
    pub fn new(redis: RedisClient) -> Self {
        Self { redis }
    }

    async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut conn = self.redis.conn.clone();
        let data: Option<String> = match conn.get::<_, Option<String>>(key).await {
            Ok(data) => data,
            Err(e) => {
                warn!("Cache read of {} failed: {}", key, e);
                return None;
            }
        };
        // A corrupt entry counts as a miss
        serde_json::from_str(&data?).ok()
    }

    async fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl_seconds: u64) {
        let data = match serde_json::to_string(value) {
            Ok(data) => data,
            Err(e) => {
                warn!("Failed to serialize cache entry {}: {}", key, e);
                return;
            }
        };
        let mut conn = self.redis.conn.clone();
        let result: redis::RedisResult<()> = conn.set_ex(key, data, ttl_seconds).await;
        if let Err(e) = result {
            warn!("Cache write of {} failed: {}", key, e);
        }
    }

    async fn delete(&self, key: &str) {
        let mut conn = self.redis.conn.clone();
        let result: redis::RedisResult<()> = conn.del(key).await;
        if let Err(e) = result {
            warn!("Cache invalidation of {} failed: {}", key, e);
        }
    }
}
