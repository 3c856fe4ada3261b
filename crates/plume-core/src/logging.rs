//! Process-wide tracing setup.
//!
//! Library code only emits `tracing` events; binaries, examples and benches
//! call [`init_tracing`] once to print them.

use std::io::IsTerminal;
use std::sync::OnceLock;

use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

static INITIALISED: OnceLock<()> = OnceLock::new();

/// Filter used when `RUST_LOG` is unset or unparsable.
pub const DEFAULT_FILTER: &str = "info";

/// Errors emitted when configuring the tracing subscriber.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("tracing has already been initialised")]
    AlreadyInitialised,
    #[error("failed to install the global subscriber: {0}")]
    Subscriber(String),
}

/// Installs a fmt subscriber filtered by `RUST_LOG` (default `info`).
pub fn init_tracing() -> Result<(), InitError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    install(filter)
}

/// Installs a fmt subscriber with an explicit filter directive, ignoring
/// `RUST_LOG`.
pub fn init_tracing_with(directives: &str) -> Result<(), InitError> {
    install(EnvFilter::new(directives))
}

fn install(filter: EnvFilter) -> Result<(), InitError> {
    INITIALISED
        .set(())
        .map_err(|_| InitError::AlreadyInitialised)?;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(std::io::stdout().is_terminal());
    Registry::default()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| InitError::Subscriber(e.to_string()))
}
