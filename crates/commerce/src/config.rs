//! Commerce configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `COMMERCE_DATABASE_URL` - `PostgreSQL` connection string (falls back to
//!   the generic `DATABASE_URL`)
//!
//! ## Optional
//! - `COMMERCE_CACHE_CAPACITY` - Max cached entries (default: 1000)
//! - `COMMERCE_LISTING_CACHE_TTL_SECS` - TTL for listing queries (default: 3600)
//! - `COMMERCE_DETAIL_CACHE_TTL_SECS` - TTL for per-entity lookups (default: 300)

use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Commerce application configuration.
#[derive(Debug, Clone)]
pub struct CommerceConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// Cache settings for catalog reads
    pub cache: CacheConfig,
}

/// Cache sizing and staleness ceilings.
///
/// Listings change less often than they are read, so they get the longer
/// TTL; both families are invalidated eagerly on writes, making the TTL a
/// staleness ceiling rather than the consistency mechanism.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of cached entries.
    pub capacity: u64,
    /// TTL for listing-query entries.
    pub listing_ttl: Duration,
    /// TTL for single-entity detail entries.
    pub detail_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 1000,
            listing_ttl: Duration::from_secs(3600),
            detail_ttl: Duration::from_secs(300),
        }
    }
}

impl CommerceConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("COMMERCE_DATABASE_URL")?;

        let cache = CacheConfig {
            capacity: get_parsed_or("COMMERCE_CACHE_CAPACITY", 1000)?,
            listing_ttl: Duration::from_secs(get_parsed_or(
                "COMMERCE_LISTING_CACHE_TTL_SECS",
                3600,
            )?),
            detail_ttl: Duration::from_secs(get_parsed_or("COMMERCE_DETAIL_CACHE_TTL_SECS", 300)?),
        };

        Ok(Self {
            database_url,
            cache,
        })
    }
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an environment variable parsed to `T`, or the default if unset.
fn get_parsed_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_config_defaults() {
        let cache = CacheConfig::default();
        assert_eq!(cache.capacity, 1000);
        assert!(cache.listing_ttl > cache.detail_ttl);
    }

    #[test]
    fn test_get_parsed_or_default() {
        let value: u64 = get_parsed_or("COMMERCE_TEST_UNSET_VAR", 42).unwrap();
        assert_eq!(value, 42);
    }
}
