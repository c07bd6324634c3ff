// src/logging.rs

//! Logging setup using `tracing` + `tracing-subscriber`.
//!
//! The log level comes from the `PROCWARDEN_LOG` environment variable
//! (e.g. "info", "debug", or any `EnvFilter` directive) and defaults to
//! `info`. Logs go to STDERR so the host's stdout, and any child stdout
//! a caller forwards there, stay clean.

use anyhow::{anyhow, Result};
use tracing_subscriber::{fmt, EnvFilter};

/// Initialise the global logging subscriber.
///
/// Call once at host startup; a second call reports an error instead of
/// panicking so library users embedding their own subscriber are fine.
pub fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_env("PROCWARDEN_LOG")
        .unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("installing tracing subscriber: {e}"))?;

    Ok(())
}
