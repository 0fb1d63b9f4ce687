//! Configuration management
//!
//! Every field has a default, so an empty TOML/JSON document is a valid
//! configuration. Durations are expressed in (fractional) seconds to match
//! the environment variables the loader reads.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_CACHE_MAX_CAPACITY, DEFAULT_CACHE_TTL_SECS, DEFAULT_VENDOR_BASE_URL,
    DEFAULT_VENDOR_NAME,
};
use crate::errors::{Result, StockadeError};

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub vendor: VendorConfig,
    pub breaker: BreakerConfig,
    pub retry: BackoffConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Reject settings no component could run with.
    ///
    /// # Errors
    /// Returns `StockadeError::Config` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.database.path.trim().is_empty() {
            return Err(config_error("database.path", "must not be empty"));
        }
        if self.database.pool_size == 0 {
            return Err(config_error("database.pool_size", "must be at least 1"));
        }
        if self.vendor.base_url.trim().is_empty() {
            return Err(config_error("vendor.base_url", "must not be empty"));
        }
        positive_secs("vendor.timeout_secs", self.vendor.timeout_secs)?;
        if self.vendor.pool_max_idle == 0 {
            return Err(config_error("vendor.pool_max_idle", "must be at least 1"));
        }
        if self.breaker.failure_threshold == 0 {
            return Err(config_error("breaker.failure_threshold", "must be at least 1"));
        }
        positive_secs("breaker.recovery_time_secs", self.breaker.recovery_time_secs)?;
        if self.breaker.half_open_success_threshold == 0 {
            return Err(config_error("breaker.half_open_success_threshold", "must be at least 1"));
        }
        if self.breaker.half_open_max_calls == 0 {
            return Err(config_error("breaker.half_open_max_calls", "must be at least 1"));
        }
        if self.retry.attempts == 0 {
            return Err(config_error("retry.attempts", "must be at least 1"));
        }
        non_negative_secs("retry.wait_min_secs", self.retry.wait_min_secs)?;
        non_negative_secs("retry.jitter_secs", self.retry.jitter_secs)?;
        non_negative_secs("retry.wait_max_secs", self.retry.wait_max_secs)?;
        if !self.retry.multiplier.is_finite() || self.retry.multiplier < 1.0 {
            return Err(config_error("retry.multiplier", "must be a finite number >= 1.0"));
        }
        if let Some(budget) = self.retry.budget_secs {
            positive_secs("retry.budget_secs", budget)?;
        }
        if self.cache.max_capacity == 0 {
            return Err(config_error("cache.max_capacity", "must be at least 1"));
        }
        Ok(())
    }
}

fn config_error(field: &str, message: &str) -> StockadeError {
    StockadeError::Config(format!("{field} {message}"))
}

fn positive_secs(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(config_error(field, "must be a positive number of seconds"));
    }
    Ok(())
}

fn non_negative_secs(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(config_error(field, "must be a non-negative number of seconds"));
    }
    Ok(())
}

/// Seconds to `Duration`, falling back to zero for values `validate` rejects.
pub fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

/// Database configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
    pub pool_size: u32,
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: "stockade.db".to_string(), pool_size: 8, busy_timeout_ms: 5_000 }
    }
}

impl DatabaseConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

/// Upstream price vendor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VendorConfig {
    /// Breaker name reported in snapshots and errors
    pub name: String,
    pub base_url: String,
    /// Per-request timeout, independent of the retry budget
    pub timeout_secs: f64,
    /// Idle connections kept per host
    pub pool_max_idle: usize,
}

impl Default for VendorConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_VENDOR_NAME.to_string(),
            base_url: DEFAULT_VENDOR_BASE_URL.to_string(),
            timeout_secs: 2.0,
            pool_max_idle: 10,
        }
    }
}

impl VendorConfig {
    pub fn timeout(&self) -> Duration {
        secs(self.timeout_secs)
    }
}

/// Circuit breaker thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub recovery_time_secs: f64,
    pub half_open_success_threshold: u32,
    /// Concurrent trial calls admitted while half-open
    pub half_open_max_calls: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_time_secs: 15.0,
            half_open_success_threshold: 2,
            half_open_max_calls: 1,
        }
    }
}

impl BreakerConfig {
    pub fn recovery_time(&self) -> Duration {
        secs(self.recovery_time_secs)
    }
}

/// Retry backoff for upstream calls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    pub attempts: u32,
    /// Delay before the first retry
    pub wait_min_secs: f64,
    pub multiplier: f64,
    pub jitter_secs: f64,
    /// Cap on a single backoff delay
    pub wait_max_secs: f64,
    /// Total time allowed for one call including retries; `None` is unbounded
    pub budget_secs: Option<f64>,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            wait_min_secs: 0.5,
            multiplier: 2.0,
            jitter_secs: 0.1,
            wait_max_secs: 10.0,
            budget_secs: Some(5.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_secs: u64,
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_secs: DEFAULT_CACHE_TTL_SECS, max_capacity: DEFAULT_CACHE_MAX_CAPACITY }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = StockadeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(StockadeError::Config(format!("unknown log format '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive when `RUST_LOG` is unset
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Pretty }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.vendor.timeout(), Duration::from_secs(2));
        assert_eq!(config.breaker.recovery_time(), Duration::from_secs(15));
        assert_eq!(config.cache.ttl(), Duration::from_secs(300));
    }

    #[test]
    fn test_validate_rejects_impossible_settings() {
        let mut config = Config::default();
        config.database.pool_size = 0;
        assert!(matches!(config.validate(), Err(StockadeError::Config(m)) if m.contains("pool_size")));

        let mut config = Config::default();
        config.retry.multiplier = 0.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.retry.budget_secs = Some(0.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_secs_handles_invalid() {
        assert_eq!(secs(-1.0), Duration::ZERO);
        assert_eq!(secs(0.25), Duration::from_millis(250));
    }
}
