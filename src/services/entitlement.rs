//! Movie entitlement: a host may screen a movie that is either in the
//! globally free catalog (remote HTTP service) or purchased by that host.

use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::cache::CacheService;
use crate::config::{CircuitBreakerConfig, EntitlementConfig};
use crate::error::EngineError;
use crate::models::PurchasedMovie;
use crate::services::circuit_breaker::CircuitBreaker;

#[async_trait]
pub trait MovieEntitlementGate: Send + Sync {
    async fn is_entitled(&self, movie_id: Uuid, host_id: Uuid) -> Result<bool, EngineError>;

    async fn free_movies(&self) -> Result<Vec<Uuid>, EngineError>;
}

#[async_trait]
pub trait PurchaseRegistry: Send + Sync {
    async fn is_purchased(&self, movie_id: Uuid, host_id: Uuid) -> Result<bool, EngineError>;
}

pub struct PgPurchaseRegistry {
    pool: PgPool,
}

impl PgPurchaseRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PurchaseRegistry for PgPurchaseRegistry {
    async fn is_purchased(&self, movie_id: Uuid, host_id: Uuid) -> Result<bool, EngineError> {
        Ok(PurchasedMovie::is_purchased_by(&self.pool, movie_id, host_id).await?)
    }
}

/// HTTP client for `GET /free_movies`, returning a JSON array of movie ids.
pub struct FreeMovieClient {
    http: reqwest::Client,
    url: String,
    breaker: Arc<CircuitBreaker>,
}

impl FreeMovieClient {
    pub fn new(url: impl Into<String>, timeout_seconds: u64, breaker: Arc<CircuitBreaker>) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()?;
        Ok(Self {
            http,
            url: url.into(),
            breaker,
        })
    }

    pub async fn fetch(&self) -> Result<Vec<Uuid>, EngineError> {
        if !self.breaker.can_execute() {
            warn!("Circuit breaker is OPEN - blocking free movie catalog request");
            return Err(EngineError::ServiceUnavailable(
                "free movie catalog temporarily unavailable".to_string(),
            ));
        }

        let response = match self.http.get(&self.url).send().await {
            Ok(response) => response,
            Err(e) => {
                error!("Free movie catalog request failed: {:?}", e);
                self.breaker.record_failure();
                return Err(EngineError::ServiceUnavailable(
                    "free movie catalog is unreachable".to_string(),
                ));
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!("Free movie catalog answered {}", status);
            self.breaker.record_failure();
            return Err(EngineError::ServiceUnavailable(format!(
                "free movie catalog answered {status}"
            )));
        }

        match response.json::<Vec<Uuid>>().await {
            Ok(ids) => {
                self.breaker.record_success();
                Ok(ids)
            }
            Err(e) => {
                error!("Free movie catalog returned malformed body: {:?}", e);
                self.breaker.record_failure();
                Err(EngineError::ServiceUnavailable(
                    "free movie catalog returned a malformed response".to_string(),
                ))
            }
        }
    }
}

pub struct HttpEntitlementGate {
    client: FreeMovieClient,
    purchases: Arc<dyn PurchaseRegistry>,
    cache: Option<CacheService>,
    cache_ttl_seconds: u64,
}

impl HttpEntitlementGate {
    pub fn new(
        client: FreeMovieClient,
        purchases: Arc<dyn PurchaseRegistry>,
        cache: Option<CacheService>,
        cache_ttl_seconds: u64,
    ) -> Self {
        Self {
            client,
            purchases,
            cache,
            cache_ttl_seconds,
        }
    }

    pub fn from_config(
        entitlement: &EntitlementConfig,
        circuit_breaker: &CircuitBreakerConfig,
        pool: PgPool,
        cache: Option<CacheService>,
    ) -> Result<Self, reqwest::Error> {
        let breaker = Arc::new(CircuitBreaker::new(
            circuit_breaker.failure_threshold,
            circuit_breaker.timeout_seconds,
        ));
        let client = FreeMovieClient::new(&entitlement.free_movies_url, entitlement.timeout_seconds, breaker)?;
        Ok(Self::new(
            client,
            Arc::new(PgPurchaseRegistry::new(pool)),
            cache,
            entitlement.cache_ttl_seconds,
        ))
    }
}

#[async_trait]
impl MovieEntitlementGate for HttpEntitlementGate {
    async fn is_entitled(&self, movie_id: Uuid, host_id: Uuid) -> Result<bool, EngineError> {
        if self.free_movies().await?.contains(&movie_id) {
            return Ok(true);
        }
        self.purchases.is_purchased(movie_id, host_id).await
    }

    async fn free_movies(&self) -> Result<Vec<Uuid>, EngineError> {
        if let Some(cache) = &self.cache {
            if let Some(ids) = cache.get_free_movies().await {
                debug!("Free movie list served from cache");
                return Ok(ids);
            }
        }

        let ids = self.client.fetch().await?;

        if let Some(cache) = &self.cache {
            cache.cache_free_movies(&ids, self.cache_ttl_seconds).await;
        }
        Ok(ids)
    }
}
