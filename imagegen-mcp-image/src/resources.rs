//! MCP resources for the image server.
//!
//! - `image://aspect_ratios` - supported aspect ratios and their dimensions
//! - `image://defaults` - generation defaults and limits

use crate::request::{ASPECT_RATIOS, MAX_STEPS, MIN_STEPS};
use imagegen_mcp_common::config::Config;
use serde::Serialize;

pub const ASPECT_RATIOS_URI: &str = "image://aspect_ratios";
pub const DEFAULTS_URI: &str = "image://defaults";

/// One entry of the aspect ratio table.
#[derive(Debug, Clone, Serialize)]
pub struct AspectRatioInfo {
    pub ratio: &'static str,
    pub width: u32,
    pub height: u32,
}

/// Generation defaults exposed to clients. Never carries credentials.
#[derive(Debug, Clone, Serialize)]
pub struct DefaultsInfo {
    pub model: String,
    pub default_width: u32,
    pub default_height: u32,
    pub max_width: u32,
    pub max_height: u32,
    pub default_steps: u8,
    pub min_steps: u8,
    pub max_steps: u8,
    pub batch_size: u8,
    pub allowed_extensions: Vec<String>,
    pub default_extension: String,
}

pub fn list_aspect_ratios() -> Vec<AspectRatioInfo> {
    ASPECT_RATIOS
        .iter()
        .map(|&(ratio, width, height)| AspectRatioInfo { ratio, width, height })
        .collect()
}

pub fn defaults(config: &Config) -> DefaultsInfo {
    DefaultsInfo {
        model: config.api.model.clone(),
        default_width: config.image.default_width,
        default_height: config.image.default_height,
        max_width: config.image.max_width,
        max_height: config.image.max_height,
        default_steps: config.image.default_steps,
        min_steps: MIN_STEPS,
        max_steps: MAX_STEPS,
        batch_size: config.image.batch_size,
        allowed_extensions: config.output.allowed_extensions.clone(),
        default_extension: config.output.default_extension.clone(),
    }
}

/// Get the aspect ratio table as a JSON string.
pub fn aspect_ratios_resource_json() -> String {
    serde_json::to_string_pretty(&list_aspect_ratios()).unwrap_or_else(|_| "[]".to_string())
}

/// Get the generation defaults as a JSON string.
pub fn defaults_resource_json(config: &Config) -> String {
    serde_json::to_string_pretty(&defaults(config)).unwrap_or_else(|_| "{}".to_string())
}
