//! Image generation handler for the MCP image server.
//!
//! [`ImageHandler::generate_image`] runs one tool call end to end: output
//! directory validation, request building, the API call and saving to disk.
//! Every outcome is rendered as a [`ToolResponse`] envelope.

use crate::client::GenerationClient;
use crate::path;
use crate::persist::{ImagePersister, saved_paths};
use crate::request::{DimensionSpec, MAX_STEPS, MIN_STEPS, RequestBuilder, valid_aspect_ratios};
use imagegen_mcp_common::config::{Config, home_dir};
use imagegen_mcp_common::error::Error;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::PathBuf;
use tracing::{debug, info, instrument, warn};

/// Parameters of the `generate_image` tool.
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
pub struct GenerateImageParams {
    /// Text description of the image. Keeping it under 500 characters is recommended.
    pub prompt: String,

    /// File name to save as, without directories. Defaults to .png when the
    /// extension is missing or not one of .png, .jpg, .jpeg.
    pub file_name: String,

    /// Absolute path of the directory to save into. Empty uses the server's
    /// default output folder.
    #[serde(default)]
    pub save_folder: String,

    /// Aspect ratio: "1:1", "4:3", "16:9", "3:4" or "9:16". Cannot be combined
    /// with width/height.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<String>,

    /// Image width in pixels (1-1024).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<i64>,

    /// Image height in pixels (1-1024).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<i64>,

    /// Number of sampling steps (1-4). More steps is slower but usually better.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<i64>,
}

/// JSON envelope returned for every `generate_image` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResponse {
    pub success: bool,
    pub error: Option<String>,
    pub images: Vec<String>,
}

impl ToolResponse {
    pub fn ok(images: Vec<String>) -> Self {
        Self {
            success: true,
            error: None,
            images,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
            images: Vec::new(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_value(self).unwrap_or_default().to_string()
    }
}

/// Example directory shown in tool descriptions.
pub fn example_save_folder() -> PathBuf {
    home_dir()
        .unwrap_or_else(|| PathBuf::from("/home/user"))
        .join("Documents")
        .join("images")
}

/// Orchestrates validation, generation and persistence for tool calls.
#[derive(Debug, Clone)]
pub struct ImageHandler {
    config: Config,
    builder: RequestBuilder,
    client: GenerationClient,
    persister: ImagePersister,
}

impl ImageHandler {
    #[instrument(level = "debug", name = "image_handler_new", skip_all)]
    pub fn new(config: Config) -> Self {
        debug!("Initializing ImageHandler");
        Self {
            builder: RequestBuilder::new(config.image.clone()),
            client: GenerationClient::new(config.api.clone()),
            persister: ImagePersister::new(config.output.clone()),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run a `generate_image` call. Never fails; errors become a failure envelope.
    #[instrument(level = "info", name = "generate_image", skip(self, params), fields(file_name = %params.file_name))]
    pub async fn generate_image(&self, params: GenerateImageParams) -> ToolResponse {
        info!(prompt = %params.prompt, "Received generation request");

        match self.run(params).await {
            Ok(images) => {
                info!(count = images.len(), "Image generation succeeded");
                ToolResponse::ok(images)
            }
            Err(e) => {
                warn!(category = %e.category(), error = %e, "Image generation failed");
                ToolResponse::failure(e.to_string())
            }
        }
    }

    async fn run(&self, params: GenerateImageParams) -> Result<Vec<String>, Error> {
        let folder = if params.save_folder.trim().is_empty() {
            self.config.output.base_folder.clone()
        } else {
            PathBuf::from(&params.save_folder)
        };
        let dir = path::validate(&folder).await?;

        let dimensions = DimensionSpec::from_parts(params.aspect_ratio, params.width, params.height)?;
        let request = self.builder.build(&params.prompt, &dimensions, params.steps)?;

        let images = self.client.generate(&request).await?;
        let results = self.persister.persist(&images, &dir, &params.file_name).await;

        Ok(saved_paths(&results)?)
    }

    /// Catalog of the tools this server offers, with parameter descriptions.
    pub fn describe_tools(&self) -> serde_json::Value {
        let example = example_save_folder();
        json!({
            "tools": [
                {
                    "name": "generate_image",
                    "description": "Generate images from a text prompt and save them to a local directory",
                    "parameters": {
                        "prompt": {
                            "type": "string",
                            "description": "Image generation prompt, recommended to be under 500 characters",
                            "required": true
                        },
                        "file_name": {
                            "type": "string",
                            "description": "File name to save (without path, defaults to .png if no extension)",
                            "required": true
                        },
                        "save_folder": {
                            "type": "string",
                            "description": format!("Absolute path to save directory (example: {})", example.display()),
                            "required": true
                        },
                        "aspect_ratio": {
                            "type": "string",
                            "description": format!("Image aspect ratio, supports {}. Cannot be combined with width/height", valid_aspect_ratios()),
                            "required": false
                        },
                        "width": {
                            "type": "number",
                            "description": format!("Image width in pixels, at most {}, default {}", self.config.image.max_width, self.config.image.default_width),
                            "required": false
                        },
                        "height": {
                            "type": "number",
                            "description": format!("Image height in pixels, at most {}, default {}", self.config.image.max_height, self.config.image.default_height),
                            "required": false
                        },
                        "steps": {
                            "type": "number",
                            "description": format!(
                                "Number of sampling steps, more steps usually means higher quality but slower generation. Supports {}-{}, default {}",
                                MIN_STEPS, MAX_STEPS, self.config.image.default_steps
                            ),
                            "required": false
                        }
                    }
                },
                {
                    "name": "use_description",
                    "description": "List available tools and their parameters",
                    "parameters": {}
                }
            ]
        })
    }
}
