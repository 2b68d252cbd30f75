//! S7 Bridge Framework
//!
//! Plumbing shared by the S7 bridge binary:
//!
//! - [`BridgeConfig`] for JSON5 configuration loading and validation
//! - [`BridgeRunner`] for lifecycle management (logging, Zenoh session, Ctrl+C shutdown)
//! - [`Publisher`] for text payloads, with retained topics backed by a zenoh-ext cache
//! - [`SetListener`] for inbound write requests (puts and acknowledged queries)
//! - [`BridgeArgs`] for CLI parsing
//! - [`BridgeStatus`] for status documents

mod args;
mod config;
mod error;
mod listener;
mod publisher;
mod runner;
mod session;
mod status;

pub use args::BridgeArgs;
pub use config::{BridgeConfig, LogFormat, LoggingConfig, ZenohConfig};
pub use error::{BridgeError, Result};
pub use listener::{ACK_OK, InboundWrite, SetListener};
pub use publisher::{Publisher, join_key};
pub use runner::BridgeRunner;
pub use session::connect;
pub use status::{BridgeStatus, StatusPublisher};

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let installed = match config.format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .try_init(),
    };

    installed.map_err(|e| BridgeError::config(format!("Failed to initialize tracing: {}", e)))
}
