//! Logging setup and configuration

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Setup the tracing subscriber for the application
///
/// `RUST_LOG` takes precedence over the supplied default level, so operators
/// can raise verbosity per module without touching the config file. Output
/// carries thread names; the link runs on named worker threads
/// (link-supervisor, link-sender, link-receiver).
pub fn setup_logging(default_level: &str) -> crate::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| crate::Error::Config(format!("Invalid log filter: {}", e)))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_thread_names(true))
        .init();

    Ok(())
}
