use crate::cache::CacheService;
use uuid::Uuid;

const FREE_MOVIES_KEY: &str = "movies:free";

impl CacheService {
    pub async fn get_free_movies(&self) -> Option<Vec<Uuid>> {
        self.get_json(FREE_MOVIES_KEY).await
    }

    pub async fn cache_free_movies(&self, ids: &[Uuid], ttl_seconds: u64) {
        self.set_json(FREE_MOVIES_KEY, ids, ttl_seconds).await;
    }
}
