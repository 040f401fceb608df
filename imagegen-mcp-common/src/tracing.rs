//! Tracing initialization for the imagegen MCP server.
//!
//! Log lines go to **stderr**: with the stdio transport, stdout carries the
//! MCP protocol stream and must not be interleaved with logs.
//!
//! # Usage
//!
//! ```no_run
//! use imagegen_mcp_common::tracing::init_tracing;
//!
//! fn main() {
//!     init_tracing();
//!     tracing::info!("Application started");
//! }
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Controls the log level and filtering. Examples:
//!   - `RUST_LOG=debug` - Enable debug logging for all modules
//!   - `RUST_LOG=imagegen_mcp_image=debug` - Enable debug for the server crate
//!   - `RUST_LOG=warn,imagegen_mcp_image::client=debug` - Trace retry decisions only

use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    prelude::*,
    registry::Registry,
};

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

fn fmt_layer<S>() -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .with_span_events(FmtSpan::NONE)
}

fn subscriber(filter: EnvFilter) -> impl tracing::Subscriber + Send + Sync {
    Registry::default().with(filter).with(fmt_layer())
}

/// Initialize the tracing subscriber with `RUST_LOG` filtering (default `info`).
///
/// # Panics
///
/// Panics if a global subscriber is already set.
pub fn init_tracing() {
    init_tracing_with_default("info");
}

/// Initialize tracing with a custom default level used when `RUST_LOG` is unset.
///
/// # Panics
///
/// Panics if a global subscriber is already set.
pub fn init_tracing_with_default(default_level: &str) {
    subscriber(env_filter(default_level)).init();
}

/// Try to initialize tracing, returning an error if already initialized.
///
/// Unlike `init_tracing()`, this never panics, which makes it safe to call
/// from tests.
pub fn try_init_tracing() -> Result<(), ()> {
    subscriber(env_filter("info")).try_init().map_err(|_| ())
}
