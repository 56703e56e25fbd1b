use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::str::FromStr;

// Top-level configuration, one section per concern
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub jwt: JwtConfig,
    pub entitlement: EntitlementConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub booking: BookingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
}

// Free movie catalog endpoint used by the entitlement gate
#[derive(Debug, Clone, Deserialize)]
pub struct EntitlementConfig {
    pub free_movies_url: String,
    pub timeout_seconds: u64,
    pub cache_ttl_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookingConfig {
    /// RESERVED bookings older than this are released. 0 disables expiry.
    pub reservation_ttl_seconds: u64,
    pub cleanup_interval_seconds: u64,
}

impl BookingConfig {
    pub fn reservation_ttl(&self) -> Option<u64> {
        (self.reservation_ttl_seconds > 0).then_some(self.reservation_ttl_seconds)
    }
}

fn required(key: &str) -> Result<String> {
    env::var(key).with_context(|| format!("{key} must be set"))
}

fn parsed_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("{key} must be a valid value, got {raw:?}")),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            app: AppConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parsed_or("PORT", 8000)?,
                environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
                rust_log: env::var("RUST_LOG")
                    .unwrap_or_else(|_| "screening_booking=debug,tower_http=debug".to_string()),
            },
            database: DatabaseConfig {
                url: required("DATABASE_URL")?,
                pool_size: parsed_or("DB_POOL_SIZE", 20)?,
            },
            redis: RedisConfig {
                url: required("REDIS_URL")?,
            },
            jwt: JwtConfig {
                secret: required("JWT_SECRET")?,
            },
            entitlement: EntitlementConfig {
                free_movies_url: env::var("FREE_MOVIES_URL").unwrap_or_else(|_| {
                    "http://127.0.0.1:8001/free_movies".to_string()
                }),
                timeout_seconds: parsed_or("ENTITLEMENT_TIMEOUT_SECONDS", 5)?,
                cache_ttl_seconds: parsed_or("FREE_MOVIES_CACHE_TTL_SECONDS", 300)?,
            },
            circuit_breaker: CircuitBreakerConfig {
                failure_threshold: parsed_or("CIRCUIT_BREAKER_FAILURE_THRESHOLD", 5)?,
                timeout_seconds: parsed_or("CIRCUIT_BREAKER_TIMEOUT_SECONDS", 60)?,
            },
            booking: BookingConfig {
                reservation_ttl_seconds: parsed_or("RESERVATION_TTL_SECONDS", 0)?,
                cleanup_interval_seconds: parsed_or("CLEANUP_INTERVAL_SECONDS", 60)?,
            },
        })
    }
}
