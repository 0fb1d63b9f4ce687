//! Configuration loader
//!
//! ## Loading Strategy
//! 1. Read `.env` from the working directory, if present
//! 2. Load a config file: `STOCKADE_CONFIG` when set, otherwise the first of
//!    [`probe_config_paths`]; no file means defaults
//! 3. Apply environment overrides on top
//! 4. Validate the result
//!
//! ## Environment Variables
//! - `STOCKADE_DB_PATH`, `STOCKADE_DB_POOL_SIZE`, `STOCKADE_DB_BUSY_TIMEOUT_MS`
//! - `VENDOR_BASE_URL`, `VENDOR_TIMEOUT` (seconds), `VENDOR_POOL_MAXSIZE`
//! - `CB_FAILURE_THRESHOLD`, `CB_RECOVERY_TIME` (seconds), `CB_HALF_OPEN_SUCC`,
//!   `CB_HALF_OPEN_MAX_CALLS`
//! - `RETRY_ATTEMPTS`, `RETRY_WAIT_MIN`, `RETRY_WAIT_MAX`, `RETRY_MULTIPLIER`,
//!   `RETRY_JITTER` (seconds), `VENDOR_RETRY_BUDGET` (seconds)
//! - `CACHE_TTL_SECONDS`, `CACHE_MAX_CAPACITY`
//! - `STOCKADE_LOG_LEVEL`, `STOCKADE_LOG_FORMAT` (`pretty` or `json`)
//!
//! Unparsable or below-minimum values are logged and ignored; the file or
//! default value stays in effect.

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use stockade_domain::{Config, LogFormat, Result, StockadeError};

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "STOCKADE_CONFIG";

/// Load configuration from `.env`, an optional file and the environment.
///
/// # Errors
/// Returns `StockadeError::Config` if the named file is missing or
/// malformed, or the merged configuration fails validation.
pub fn load() -> Result<Config> {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(path = %path.display(), "Loaded .env file"),
        Err(err) if err.not_found() => {}
        Err(err) => tracing::warn!(error = %err, "Ignoring unreadable .env file"),
    }

    let mut config = match std::env::var(CONFIG_PATH_ENV) {
        Ok(path) => load_from_file(Some(PathBuf::from(path)))?,
        Err(_) => match probe_config_paths() {
            Some(path) => load_from_file(Some(path))?,
            None => {
                tracing::info!("No config file found, using defaults");
                Config::default()
            }
        },
    };

    apply_env_overrides(&mut config);
    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations.
/// Supports JSON and TOML (detected by file extension).
///
/// # Errors
/// Returns `StockadeError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(StockadeError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            StockadeError::Config("No config file found in any of the standard locations".into())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| StockadeError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

/// Parse configuration from string content, format chosen by extension.
///
/// # Errors
/// Returns `StockadeError::Config` if the format is unknown or parsing fails.
pub fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| StockadeError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| StockadeError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(StockadeError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// First existing `stockade.toml` / `stockade.json` in the working directory
/// or next to the executable.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.push(cwd.join("stockade.toml"));
        candidates.push(cwd.join("stockade.json"));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.push(exe_dir.join("stockade.toml"));
            candidates.push(exe_dir.join("stockade.json"));
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

/// Apply overrides from the process environment.
pub fn apply_env_overrides(config: &mut Config) {
    apply_overrides(config, |key| std::env::var(key).ok());
}

/// Apply overrides read through `lookup`.
pub fn apply_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let env = Overrides { lookup };

    if let Some(path) = env.string("STOCKADE_DB_PATH") {
        config.database.path = path;
    }
    env.set("STOCKADE_DB_POOL_SIZE", 1_u32, &mut config.database.pool_size);
    env.set("STOCKADE_DB_BUSY_TIMEOUT_MS", 0_u64, &mut config.database.busy_timeout_ms);

    if let Some(url) = env.string("VENDOR_BASE_URL") {
        config.vendor.base_url = url;
    }
    env.set("VENDOR_TIMEOUT", 0.1, &mut config.vendor.timeout_secs);
    env.set("VENDOR_POOL_MAXSIZE", 1_usize, &mut config.vendor.pool_max_idle);

    env.set("CB_FAILURE_THRESHOLD", 1_u32, &mut config.breaker.failure_threshold);
    env.set("CB_RECOVERY_TIME", 0.1, &mut config.breaker.recovery_time_secs);
    env.set("CB_HALF_OPEN_SUCC", 1_u32, &mut config.breaker.half_open_success_threshold);
    env.set("CB_HALF_OPEN_MAX_CALLS", 1_u32, &mut config.breaker.half_open_max_calls);

    env.set("RETRY_ATTEMPTS", 1_u32, &mut config.retry.attempts);
    env.set("RETRY_WAIT_MIN", 0.0, &mut config.retry.wait_min_secs);
    env.set("RETRY_WAIT_MAX", 0.1, &mut config.retry.wait_max_secs);
    env.set("RETRY_MULTIPLIER", 1.0, &mut config.retry.multiplier);
    env.set("RETRY_JITTER", 0.0, &mut config.retry.jitter_secs);
    let mut budget = config.retry.budget_secs.unwrap_or(0.0);
    if env.set("VENDOR_RETRY_BUDGET", 0.1, &mut budget) {
        config.retry.budget_secs = Some(budget);
    }

    env.set("CACHE_TTL_SECONDS", 0_u64, &mut config.cache.ttl_secs);
    env.set("CACHE_MAX_CAPACITY", 1_u64, &mut config.cache.max_capacity);

    if let Some(level) = env.string("STOCKADE_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(raw) = env.string("STOCKADE_LOG_FORMAT") {
        match raw.parse::<LogFormat>() {
            Ok(format) => config.logging.format = format,
            Err(err) => tracing::warn!(
                key = "STOCKADE_LOG_FORMAT",
                value = %raw,
                error = %err,
                "Ignoring invalid environment override"
            ),
        }
    }
}

struct Overrides<F> {
    lookup: F,
}

impl<F> Overrides<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, key: &str) -> Option<String> {
        (self.lookup)(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
    }

    /// Overwrite `target` with the parsed value when it is at least `min`.
    /// Returns whether `target` changed.
    fn set<T>(&self, key: &str, min: T, target: &mut T) -> bool
    where
        T: FromStr + PartialOrd + Display + Copy,
    {
        let Some(raw) = self.string(key) else {
            return false;
        };
        match raw.parse::<T>() {
            Ok(value) if value >= min => {
                *target = value;
                true
            }
            Ok(value) => {
                tracing::warn!(
                    key,
                    %value,
                    %min,
                    keeping = %target,
                    "Environment override below minimum"
                );
                false
            }
            Err(_) => {
                tracing::warn!(
                    key,
                    value = %raw,
                    keeping = %target,
                    "Ignoring invalid environment override"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use once_cell::sync::Lazy;

    use super::*;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn overrides_replace_file_values() {
        let mut config = Config::default();
        apply_overrides(
            &mut config,
            lookup(&[
                ("VENDOR_BASE_URL", "http://vendor.test"),
                ("VENDOR_TIMEOUT", "0.5"),
                ("CB_FAILURE_THRESHOLD", "3"),
                ("RETRY_ATTEMPTS", "4"),
                ("VENDOR_RETRY_BUDGET", "1.5"),
                ("STOCKADE_LOG_FORMAT", "json"),
            ]),
        );

        assert_eq!(config.vendor.base_url, "http://vendor.test");
        assert!((config.vendor.timeout_secs - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.breaker.failure_threshold, 3);
        assert_eq!(config.retry.attempts, 4);
        assert_eq!(config.retry.budget_secs, Some(1.5));
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn invalid_or_below_minimum_values_keep_defaults() {
        let mut config = Config::default();
        apply_overrides(
            &mut config,
            lookup(&[
                ("CB_FAILURE_THRESHOLD", "0"),
                ("VENDOR_TIMEOUT", "0.01"),
                ("RETRY_ATTEMPTS", "many"),
                ("VENDOR_POOL_MAXSIZE", ""),
                ("STOCKADE_LOG_FORMAT", "xml"),
            ]),
        );

        assert_eq!(config, Config::default());
    }

    #[test]
    fn process_environment_is_read() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");

        std::env::set_var("CB_RECOVERY_TIME", "2.5");
        let mut config = Config::default();
        apply_env_overrides(&mut config);
        std::env::remove_var("CB_RECOVERY_TIME");

        assert!((config.breaker.recovery_time_secs - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let err = parse_config("", Path::new("stockade.yaml")).unwrap_err();
        assert!(matches!(err, StockadeError::Config(msg) if msg.contains("yaml")));
    }
}
