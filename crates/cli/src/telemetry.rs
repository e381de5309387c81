use arma_core::config::{LogFormat, LoggingConfig};
use tracing_subscriber::EnvFilter;

/// Initializes the global subscriber from the logging config. `RUST_LOG`
/// wins over the configured level when set. Safe to call more than once;
/// later calls are no-ops.
pub fn init(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let _ = match logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
