//! Process-wide tracing setup.

use tracing_log::LogTracer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{LogFormat, LoggingConfig};
use crate::error::ReportflowError;

/// Builds the filter: `RUST_LOG` wins over the configured level.
pub fn env_filter(config: &LoggingConfig) -> Result<EnvFilter, ReportflowError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|e| ReportflowError::Logging(format!("invalid level '{}': {}", config.level, e))),
    }
}

/// Installs the global subscriber and routes `log` records into it.
///
/// Fails if a global subscriber or logger is already set.
pub fn init_logging(config: &LoggingConfig) -> Result<(), ReportflowError> {
    let filter = env_filter(config)?;
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match config.format {
        LogFormat::Text => {
            tracing::subscriber::set_global_default(registry.with(fmt::layer().with_target(true)))
        }
        LogFormat::Json => tracing::subscriber::set_global_default(
            registry.with(fmt::layer().json().with_current_span(true).with_span_list(true)),
        ),
    };
    installed.map_err(|e| ReportflowError::Logging(e.to_string()))?;

    // db and worker code log through the `log` facade.
    LogTracer::init().map_err(|e| ReportflowError::Logging(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn config(level: &str) -> LoggingConfig {
        LoggingConfig {
            level: level.to_string(),
            format: LogFormat::Text,
        }
    }

    #[test]
    #[serial]
    fn test_configured_level_used_without_env() {
        std::env::remove_var("RUST_LOG");
        let filter = env_filter(&config("reportflow=debug,warn")).unwrap();
        assert!(filter.to_string().contains("reportflow=debug"));
    }

    #[test]
    #[serial]
    fn test_rust_log_overrides_config() {
        std::env::set_var("RUST_LOG", "trace");
        let filter = env_filter(&config("info")).unwrap();
        std::env::remove_var("RUST_LOG");
        assert_eq!(filter.to_string(), "trace");
    }

    #[test]
    #[serial]
    fn test_invalid_level_rejected() {
        std::env::remove_var("RUST_LOG");
        assert!(matches!(
            env_filter(&config("reportflow=loud")),
            Err(ReportflowError::Logging(_))
        ));
    }
}
