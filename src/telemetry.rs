use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Install a stderr fmt subscriber for front ends embedding the library.
///
/// `RUST_LOG` wins over the configured filter. Returns false if a global
/// subscriber was already set.
pub fn init_tracing(cfg: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cfg.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(cfg.ansi)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}
