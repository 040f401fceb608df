//! MCP server implementation for the image server.
//!
//! Exposes:
//! - `generate_image` tool for text-to-image generation saved to disk
//! - `use_description` tool listing the available tools
//! - Resources for aspect ratios and generation defaults

use crate::handler::{GenerateImageParams, ImageHandler};
use crate::resources::{self, ASPECT_RATIOS_URI, DEFAULTS_URI};
use imagegen_mcp_common::config::Config;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    model::{
        CallToolResult, Content, ListResourcesResult, ReadResourceResult, ResourceContents,
        ServerCapabilities, ServerInfo,
    },
};
use schemars::JsonSchema;
use serde::Deserialize;
use std::borrow::Cow;
use std::sync::Arc;
use tracing::{debug, info};

pub const GENERATE_IMAGE_TOOL: &str = "generate_image";
pub const USE_DESCRIPTION_TOOL: &str = "use_description";

/// MCP server for image generation.
#[derive(Clone)]
pub struct ImageServer {
    handler: Arc<ImageHandler>,
}

/// `use_description` takes no arguments.
#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct UseDescriptionParams {}

fn input_schema(schema: schemars::schema::RootSchema) -> Arc<serde_json::Map<String, serde_json::Value>> {
    match serde_json::to_value(&schema).unwrap_or_default() {
        serde_json::Value::Object(map) => Arc::new(map),
        _ => Arc::new(serde_json::Map::new()),
    }
}

impl ImageServer {
    pub fn new(config: Config) -> Self {
        Self {
            handler: Arc::new(ImageHandler::new(config)),
        }
    }

    pub fn handler(&self) -> &ImageHandler {
        &self.handler
    }

    /// Generate images and report the envelope as text content.
    ///
    /// Failure envelopes are returned as tool errors, not protocol errors.
    pub async fn generate_image(&self, params: GenerateImageParams) -> Result<CallToolResult, McpError> {
        let response = self.handler.generate_image(params).await;
        let content = vec![Content::text(response.to_json())];

        if response.success {
            Ok(CallToolResult::success(content))
        } else {
            Ok(CallToolResult::error(content))
        }
    }

    pub fn use_description(&self) -> Result<CallToolResult, McpError> {
        let catalog = self.handler.describe_tools();
        Ok(CallToolResult::success(vec![Content::text(catalog.to_string())]))
    }
}

impl ServerHandler for ImageServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Image generation server. Use generate_image to create images from a text prompt \
                 and save them into an absolute directory path, and use_description to list \
                 the available tools and their parameters."
                    .to_string(),
            ),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            ..Default::default()
        }
    }

    fn list_tools(
        &self,
        _params: Option<rmcp::model::PaginatedRequestParam>,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<rmcp::model::ListToolsResult, McpError>> + Send + '_ {
        async move {
            use rmcp::model::{ListToolsResult, Tool};
            use schemars::schema_for;

            Ok(ListToolsResult {
                tools: vec![
                    Tool {
                        name: Cow::Borrowed(GENERATE_IMAGE_TOOL),
                        description: Some(Cow::Borrowed(
                            "Generate images from a text prompt and save them to a local directory. \
                             save_folder must be an absolute path. Returns a JSON object with \
                             success, error and the list of saved image paths.",
                        )),
                        input_schema: input_schema(schema_for!(GenerateImageParams)),
                        annotations: None,
                        icons: None,
                        meta: None,
                        output_schema: None,
                        title: None,
                    },
                    Tool {
                        name: Cow::Borrowed(USE_DESCRIPTION_TOOL),
                        description: Some(Cow::Borrowed(
                            "List all available tools and their parameters.",
                        )),
                        input_schema: input_schema(schema_for!(UseDescriptionParams)),
                        annotations: None,
                        icons: None,
                        meta: None,
                        output_schema: None,
                        title: None,
                    },
                ],
                next_cursor: None,
                meta: None,
            })
        }
    }

    fn call_tool(
        &self,
        params: rmcp::model::CallToolRequestParam,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<CallToolResult, McpError>> + Send + '_ {
        async move {
            info!(tool = %params.name, "Tool called");

            match params.name.as_ref() {
                GENERATE_IMAGE_TOOL => {
                    let tool_params: GenerateImageParams = params
                        .arguments
                        .map(|args| serde_json::from_value(serde_json::Value::Object(args)))
                        .transpose()
                        .map_err(|e| McpError::invalid_params(format!("Invalid parameters: {}", e), None))?
                        .ok_or_else(|| McpError::invalid_params("Missing parameters", None))?;

                    self.generate_image(tool_params).await
                }
                USE_DESCRIPTION_TOOL => self.use_description(),
                _ => Err(McpError::invalid_params(format!("Unknown tool: {}", params.name), None)),
            }
        }
    }

    fn list_resources(
        &self,
        _params: Option<rmcp::model::PaginatedRequestParam>,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListResourcesResult, McpError>> + Send + '_ {
        async move {
            debug!("Listing resources");

            let aspect_ratios = rmcp::model::Resource {
                raw: rmcp::model::RawResource {
                    uri: ASPECT_RATIOS_URI.to_string(),
                    name: "Aspect Ratios".to_string(),
                    title: None,
                    description: Some("Supported aspect ratios and the dimensions they map to".to_string()),
                    mime_type: Some("application/json".to_string()),
                    size: None,
                    icons: None,
                    meta: None,
                },
                annotations: None,
            };

            let defaults = rmcp::model::Resource {
                raw: rmcp::model::RawResource {
                    uri: DEFAULTS_URI.to_string(),
                    name: "Generation Defaults".to_string(),
                    title: None,
                    description: Some("Model, default and maximum dimensions, steps and file extensions".to_string()),
                    mime_type: Some("application/json".to_string()),
                    size: None,
                    icons: None,
                    meta: None,
                },
                annotations: None,
            };

            Ok(ListResourcesResult {
                resources: vec![aspect_ratios, defaults],
                next_cursor: None,
                meta: None,
            })
        }
    }

    fn read_resource(
        &self,
        params: rmcp::model::ReadResourceRequestParam,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ReadResourceResult, McpError>> + Send + '_ {
        async move {
            let uri = &params.uri;
            debug!(uri = %uri, "Reading resource");

            let content = match uri.as_str() {
                ASPECT_RATIOS_URI => resources::aspect_ratios_resource_json(),
                DEFAULTS_URI => resources::defaults_resource_json(self.handler.config()),
                _ => {
                    return Err(McpError::resource_not_found(
                        format!("Unknown resource: {}", uri),
                        None,
                    ));
                }
            };

            Ok(ReadResourceResult {
                contents: vec![ResourceContents::text(content, uri.clone())],
            })
        }
    }
}
