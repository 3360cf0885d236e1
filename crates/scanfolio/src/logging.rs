use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::ScanfolioError;

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` overrides the configured level. Records emitted through the `log` facade are
/// forwarded into tracing.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), ScanfolioError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| ScanfolioError::Logging(format!("invalid log level '{}': {}", config.level, e)))?;

    let json_layer = config.json.then(|| fmt::layer().json().with_current_span(true));
    let plain_layer = (!config.json).then(|| fmt::layer().with_target(true));

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(plain_layer);

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| ScanfolioError::Logging(e.to_string()))?;

    tracing_log::LogTracer::init().map_err(|e| ScanfolioError::Logging(e.to_string()))?;

    tracing::info!(level = %config.level, json = config.json, "Tracing initialized");
    Ok(())
}
