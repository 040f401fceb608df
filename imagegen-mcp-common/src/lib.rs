//! Imagegen MCP Common Library
//!
//! Shared configuration, error taxonomy, tracing setup and MCP transport
//! plumbing for the imagegen MCP server.

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod config;
pub mod error;
pub mod server;
pub mod tracing;
pub mod transport;


pub use config::{ApiConfig, Config, ImageConfig, OutputConfig};
pub use error::{
    ConfigError, Error, ErrorCategory, GenerationFailure, PathError, PersistError, RequestError,
    Result,
};
pub use server::{McpServerBuilder, ServerError, shutdown_channel};
pub use transport::{Transport, TransportArgs, TransportMode};
