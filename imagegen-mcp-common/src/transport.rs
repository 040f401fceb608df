//! MCP transport selection.
//!
//! Two transports are supported:
//!
//! - **Stdio**: default, the IDE launches the server as a subprocess
//! - **HTTP**: streamable HTTP transport served under `/mcp`
//!
//! # Example
//!
//! ```ignore
//! use imagegen_mcp_common::transport::TransportArgs;
//! use clap::Parser;
//!
//! #[derive(Parser)]
//! struct Args {
//!     #[command(flatten)]
//!     transport: TransportArgs,
//! }
//!
//! let transport = Args::parse().transport.into_transport();
//! ```

use clap::{Args, ValueEnum};
use std::fmt;

/// Transport mode for MCP server communication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transport {
    /// Standard input/output transport (default).
    #[default]
    Stdio,
    /// Streamable HTTP transport on the given port.
    Http {
        /// Port to listen on
        port: u16,
    },
}

impl Transport {
    /// Create a new stdio transport.
    pub fn stdio() -> Self {
        Transport::Stdio
    }

    /// Create a new HTTP transport on the specified port.
    pub fn http(port: u16) -> Self {
        Transport::Http { port }
    }

    /// Check if this is a stdio transport.
    pub fn is_stdio(&self) -> bool {
        matches!(self, Transport::Stdio)
    }

    /// Get the port if this is a network transport.
    pub fn port(&self) -> Option<u16> {
        match self {
            Transport::Stdio => None,
            Transport::Http { port } => Some(*port),
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Stdio => write!(f, "stdio"),
            Transport::Http { port } => write!(f, "http (port {})", port),
        }
    }
}

/// Transport mode parsed from command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum TransportMode {
    #[default]
    Stdio,
    Http,
}

/// Command-line arguments for transport configuration.
#[derive(Args, Debug, Clone)]
pub struct TransportArgs {
    /// Transport mode
    #[arg(long, value_enum, ignore_case = true, default_value_t = TransportMode::Stdio)]
    pub transport: TransportMode,

    /// Port for the HTTP transport
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,
}

impl TransportArgs {
    /// Convert command-line arguments into a Transport configuration.
    pub fn into_transport(self) -> Transport {
        match self.transport {
            TransportMode::Stdio => Transport::Stdio,
            TransportMode::Http => Transport::Http { port: self.port },
        }
    }
}

impl Default for TransportArgs {
    fn default() -> Self {
        Self {
            transport: TransportMode::Stdio,
            port: 8080,
        }
    }
}
