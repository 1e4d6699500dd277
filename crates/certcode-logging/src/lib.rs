//! # certcode-logging
//!
//! Logging for the cert-code collector.
//!
//! ## Key Types
//!
//! - [`Logger`] - Structured pipeline event logging
//! - [`LogEvent`] - Pipeline event types
//! - [`LogFormat`] - Output formats (Pretty, JSON, Compact)
//!
//! Library crates emit ordinary `tracing` events; [`init_tracing`] installs
//! the subscriber that renders them.

mod events;

pub use events::{LogEvent, LogFormat, Logger, ToolKind};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize tracing for the application. `RUST_LOG` overrides `level`.
pub fn init_tracing(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_target(false).with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty | LogFormat::Compact => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
                .init();
        }
    }
}
