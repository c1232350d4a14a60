//! Structured logging bootstrap shared by every binary in the
//! workspace: env-filtered, human-readable in a terminal, JSON under a
//! non-interactive environment.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Installs the global `tracing` subscriber. `RUST_LOG` (or `default`
/// if unset) controls the filter; call once at process start.
pub fn init(default_filter: &str, format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let registry = Registry::default().with(env_filter);
    match format {
        LogFormat::Pretty => {
            registry.with(tracing_subscriber::fmt::layer()).init();
        }
        LogFormat::Json => {
            registry.with(tracing_subscriber::fmt::layer().json()).init();
        }
    }
}
