//! MCP server runner.
//!
//! Wraps an `rmcp` handler with the configured transport and shuts down on
//! SIGINT/SIGTERM or when a programmatic shutdown signal fires.
//!
//! # Example
//!
//! ```ignore
//! use imagegen_mcp_common::server::McpServerBuilder;
//! use imagegen_mcp_common::transport::Transport;
//!
//! McpServerBuilder::new(handler)
//!     .with_transport(Transport::stdio())
//!     .run()
//!     .await?;
//! ```

use crate::transport::Transport;
use rmcp::{ServerHandler, ServiceExt};
use thiserror::Error;
use tokio::sync::oneshot;

/// Errors that can occur when running an MCP server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to the specified port
    #[error("Failed to bind to port {port}: {message}")]
    BindFailed { port: u16, message: String },

    /// Transport error during communication
    #[error("Transport error: {0}")]
    Transport(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Builder for configuring and running MCP servers.
pub struct McpServerBuilder<H> {
    handler: H,
    transport: Transport,
    shutdown_rx: Option<oneshot::Receiver<()>>,
}

impl<H> McpServerBuilder<H>
where
    H: ServerHandler + Clone + Send + Sync + 'static,
{
    /// Create a new server builder with the given handler.
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            transport: Transport::default(),
            shutdown_rx: None,
        }
    }

    /// Set the transport mode for the server.
    pub fn with_transport(mut self, transport: Transport) -> Self {
        self.transport = transport;
        self
    }

    /// Stop the server when `shutdown_rx` fires or its sender is dropped,
    /// instead of waiting for an OS signal.
    pub fn with_shutdown(mut self, shutdown_rx: oneshot::Receiver<()>) -> Self {
        self.shutdown_rx = Some(shutdown_rx);
        self
    }

    /// Run until the client disconnects or shutdown is requested.
    pub async fn run(self) -> Result<(), ServerError> {
        tracing::info!(transport = %self.transport, "Starting MCP server");

        match self.transport {
            Transport::Stdio => self.run_stdio().await,
            Transport::Http { port } => self.run_http(port).await,
        }
    }

    async fn run_stdio(self) -> Result<(), ServerError> {
        let shutdown = shutdown_future(self.shutdown_rx);

        let service = self
            .handler
            .serve(rmcp::transport::io::stdio())
            .await
            .map_err(|e| ServerError::Transport(e.to_string()))?;

        tokio::select! {
            result = service.waiting() => {
                result.map_err(|e| ServerError::Transport(e.to_string()))?;
                Ok(())
            }
            _ = shutdown => {
                tracing::info!("Received shutdown signal, stopping server");
                Ok(())
            }
        }
    }

    async fn run_http(self, port: u16) -> Result<(), ServerError> {
        use rmcp::transport::streamable_http_server::{
            StreamableHttpService, session::local::LocalSessionManager,
        };

        let handler = self.handler.clone();
        let service = StreamableHttpService::new(
            move || Ok(handler.clone()),
            LocalSessionManager::default().into(),
            Default::default(),
        );

        let router = axum::Router::new().nest_service("/mcp", service);

        let bind_addr = format!("0.0.0.0:{}", port);
        let listener = tokio::net::TcpListener::bind(&bind_addr)
            .await
            .map_err(|e| ServerError::BindFailed {
                port,
                message: e.to_string(),
            })?;

        tracing::info!(port, "HTTP server listening");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_future(self.shutdown_rx))
            .await
            .map_err(|e| ServerError::Transport(e.to_string()))?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn shutdown_future(shutdown_rx: Option<oneshot::Receiver<()>>) {
    match shutdown_rx {
        Some(rx) => {
            let _ = rx.await;
        }
        None => wait_for_shutdown_signal().await,
    }
}

/// Wait for SIGTERM or SIGINT (Ctrl+C elsewhere).
async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(term), Ok(int)) => (term, int),
                (Err(e), _) | (_, Err(e)) => {
                    tracing::error!(error = %e, "Failed to register signal handlers");
                    std::future::pending::<()>().await;
                    return;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => tracing::info!("Received SIGTERM"),
            _ = sigint.recv() => tracing::info!("Received SIGINT"),
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to register Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        tracing::info!("Received Ctrl+C");
    }
}

/// Create a sender/receiver pair for programmatic shutdown.
pub fn shutdown_channel() -> (oneshot::Sender<()>, oneshot::Receiver<()>) {
    oneshot::channel()
}
