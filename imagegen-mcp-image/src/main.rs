//! Imagegen MCP Image Server
//!
//! MCP server for text-to-image generation saved to local files.

use anyhow::Result;
use clap::Parser;
use imagegen_mcp_common::{Config, McpServerBuilder, TransportArgs, tracing::init_tracing};
use imagegen_mcp_image::ImageServer;

/// Command-line arguments for the image server.
#[derive(Parser, Debug)]
#[command(name = "imagegen-mcp-image")]
#[command(about = "MCP server for text-to-image generation")]
struct Args {
    /// Transport configuration
    #[command(flatten)]
    transport: TransportArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    tracing::info!("imagegen-mcp-image server starting...");

    let args = Args::parse();

    let config = Config::from_env()?;
    tracing::info!(
        model = %config.api.model,
        endpoint = %config.api.url,
        max_retries = config.api.max_retries,
        output_dir = %config.output.base_folder.display(),
        "Configuration loaded"
    );

    let server = ImageServer::new(config);

    McpServerBuilder::new(server)
        .with_transport(args.transport.into_transport())
        .run()
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}
