//! Tracing subscriber setup

use stockade_domain::{LogFormat, LoggingConfig, Result, StockadeError};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `config.level`. Returns `false` when a subscriber
/// was already installed, which is not an error.
///
/// # Errors
/// Returns `StockadeError::Config` when the level directive does not parse.
pub fn init_tracing(config: &LoggingConfig) -> Result<bool> {
    let filter = env_filter(config)?;

    let (pretty, json) = match config.format {
        LogFormat::Pretty => (Some(fmt::layer().with_target(false)), None),
        LogFormat::Json => {
            (None, Some(fmt::layer().json().with_target(false).with_thread_ids(true)))
        }
    };

    let installed = tracing_subscriber::registry().with(filter).with(pretty).with(json).try_init();
    match installed {
        Ok(()) => {
            tracing::debug!(level = %config.level, format = ?config.format, "tracing initialised");
            Ok(true)
        }
        Err(_) => Ok(false),
    }
}

fn env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.level)
        .map_err(|err| StockadeError::Config(format!("invalid log level '{}': {err}", config.level)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_a_no_op() {
        let config = LoggingConfig::default();
        init_tracing(&config).unwrap();
        assert!(!init_tracing(&config).unwrap());
    }

    #[test]
    fn level_directive_is_validated() {
        std::env::remove_var("RUST_LOG");
        let config = LoggingConfig { level: "stockade=loudest".into(), ..LoggingConfig::default() };
        assert!(matches!(env_filter(&config), Err(StockadeError::Config(_))));
    }
}
