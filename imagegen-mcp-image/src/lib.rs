//! Imagegen MCP Image Server Library
//!
//! Text-to-image generation over MCP: validates an output directory, calls a
//! remote generation API with retries and saves the returned images to disk.

pub mod client;
pub mod handler;
pub mod path;
pub mod persist;
pub mod request;
pub mod resources;
pub mod server;

pub use client::{EncodedImage, GenerationClient, GenerationOutcome};
pub use handler::{GenerateImageParams, ImageHandler, ToolResponse};
pub use path::ValidatedPath;
pub use persist::{ImagePersister, SaveResult};
pub use request::{DimensionSpec, GenerationRequest, RequestBuilder};
pub use server::ImageServer;
