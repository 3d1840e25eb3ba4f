//! Tracing setup for the `fcat` binary.
//!
//! Logs go to stderr so stdout stays parseable. `RUST_LOG` overrides the
//! default filter.

use anyhow::{anyhow, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "file_catalog=info,file_catalog_core=info";
const VERBOSE_LOG_FILTER: &str = "file_catalog=debug,file_catalog_core=debug";

pub struct LogConfig {
    pub verbose: bool,
    /// No ANSI colors.
    pub plain: bool,
}

pub fn init_logging(config: LogConfig) -> Result<()> {
    let filter = if config.verbose {
        EnvFilter::new(VERBOSE_LOG_FILTER)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(!config.plain)
                .with_target(config.verbose)
                .with_filter(filter),
        )
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))
}
