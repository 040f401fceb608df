//! Error types for the imagegen MCP server.
//!
//! This module provides a unified error hierarchy using `thiserror`. Every
//! pipeline stage returns its own typed error, and all of them convert into
//! [`Error`] so the tool façade can render a single failure envelope.
//!
//! # Error Categories
//!
//! - `ConfigError`: Missing or invalid configuration
//! - `PathError`: Unusable output directory
//! - `RequestError`: Invalid generation parameters
//! - `GenerationFailure`: Remote generation API failures (transient or terminal)
//! - `PersistError`: No image could be written to disk
//! - `Error::Io`: Other file system operations

use std::path::PathBuf;
use thiserror::Error;

/// Unified error type for the imagegen MCP server.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration errors (missing env vars, invalid values)
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Output directory validation errors
    #[error(transparent)]
    Path(#[from] PathError),

    /// Generation parameter validation errors
    #[error(transparent)]
    Request(#[from] RequestError),

    /// Generation API failures
    #[error(transparent)]
    Generation(#[from] GenerationFailure),

    /// Image persistence errors
    #[error(transparent)]
    Persist(#[from] PersistError),

    /// File system I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Coarse classification of an [`Error`], used for logging and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad configuration; the server cannot start.
    Config,
    /// Bad path or parameters. Never retried.
    Validation,
    /// Rate limit, server error, timeout or connection failure.
    TransientApi,
    /// Auth failure, malformed response or a non-retryable HTTP status.
    TerminalApi,
    /// Every image failed to save.
    Persistence,
    /// Unclassified I/O failure.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Validation => write!(f, "validation"),
            ErrorCategory::TransientApi => write!(f, "transient_api"),
            ErrorCategory::TerminalApi => write!(f, "terminal_api"),
            ErrorCategory::Persistence => write!(f, "persistence"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

impl Error {
    /// Classify this error.
    ///
    /// # Example
    ///
    /// ```
    /// use imagegen_mcp_common::error::{Error, ErrorCategory, GenerationFailure};
    ///
    /// let err: Error = GenerationFailure::RateLimited.into();
    /// assert_eq!(err.category(), ErrorCategory::TransientApi);
    /// ```
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) => ErrorCategory::Config,
            Error::Path(_) | Error::Request(_) => ErrorCategory::Validation,
            Error::Generation(failure) if failure.is_transient() => ErrorCategory::TransientApi,
            Error::Generation(_) => ErrorCategory::TerminalApi,
            Error::Persist(_) => ErrorCategory::Persistence,
            Error::Io(_) => ErrorCategory::Io,
        }
    }
}

/// Configuration errors.
///
/// These errors occur when loading or validating configuration from
/// environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is not set
    #[error("Required environment variable {0} is not set")]
    MissingEnvVar(String),

    /// An environment variable has an invalid value
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl ConfigError {
    /// Create a new missing environment variable error.
    pub fn missing_env_var(name: impl Into<String>) -> Self {
        ConfigError::MissingEnvVar(name.into())
    }

    /// Create a new invalid value error.
    pub fn invalid_value(name: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue(name.into(), reason.into())
    }
}

/// Output directory validation errors.
#[derive(Debug, Error)]
pub enum PathError {
    /// The path is relative
    #[error("Please use an absolute path instead of '{path}'. Example: {example}")]
    NotAbsolute {
        /// The path as supplied by the caller
        path: String,
        /// A corrected absolute path the caller can reuse
        example: String,
    },

    /// The immediate parent of the target directory does not exist
    #[error("Parent directory does not exist: {}", .0.display())]
    ParentMissing(PathBuf),

    /// The directory could not be created or written to
    #[error("No permission to create or write to directory {}: {reason}", .path.display())]
    PermissionDenied {
        /// The target directory
        path: PathBuf,
        /// Underlying failure
        reason: String,
    },

    /// Any other filesystem failure during validation
    #[error("Path validation failed: {0}")]
    ValidationFailed(String),
}

impl PathError {
    /// Create a new permission denied error.
    pub fn permission_denied(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        PathError::PermissionDenied {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Generation parameter validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    /// The prompt is empty or whitespace
    #[error("Prompt cannot be empty")]
    EmptyPrompt,

    /// Steps outside the supported range
    #[error("Steps parameter must be between {min}-{max}, current value: {value}")]
    InvalidSteps {
        /// Requested step count
        value: i64,
        /// Smallest accepted value
        min: u8,
        /// Largest accepted value
        max: u8,
    },

    /// Aspect ratio key not present in the ratio table
    #[error("Unsupported aspect ratio: {ratio}, please use one of: {valid}")]
    UnsupportedRatio {
        /// Requested ratio key
        ratio: String,
        /// Comma separated list of supported keys
        valid: String,
    },

    /// Width or height outside `(0, max]`
    #[error(
        "Width and height must be greater than 0 and not exceed {max_width}x{max_height}, \
         current values: width={width}, height={height}"
    )]
    InvalidDimensions {
        /// Requested width
        width: i64,
        /// Requested height
        height: i64,
        /// Configured maximum width
        max_width: u32,
        /// Configured maximum height
        max_height: u32,
    },

    /// Both an aspect ratio and explicit dimensions were supplied
    #[error("Specify either aspect_ratio or width/height, not both")]
    ConflictingDimensions,
}

/// Failures returned by the generation client.
///
/// Transient kinds are the ones the client retries with linear backoff; the
/// variant reported after the last attempt keeps the kind of that attempt.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GenerationFailure {
    /// HTTP 200 with a well-formed payload holding no images
    #[error("API returned success but no image data")]
    EmptyResult,

    /// HTTP 200 with a payload of unexpected shape
    #[error("API returned incorrect structure: {0}")]
    MalformedResponse(String),

    /// HTTP 401
    #[error("API authentication failed, please check API key")]
    AuthError,

    /// HTTP 429 on the final attempt
    #[error("API rate limited")]
    RateLimited,

    /// HTTP 5xx on the final attempt
    #[error("API server error (HTTP {status}): {body}")]
    ServerError {
        /// HTTP status code
        status: u16,
        /// Truncated response body
        body: String,
    },

    /// Any other non-success HTTP status
    #[error("API request failed (HTTP {status}): {body}")]
    RequestFailed {
        /// HTTP status code
        status: u16,
        /// Truncated response body
        body: String,
    },

    /// Network timeout on the final attempt
    #[error("API request timeout after {attempts} attempt(s)")]
    Timeout {
        /// Number of attempts made
        attempts: u32,
    },

    /// DNS, refused or reset connection on the final attempt
    #[error("Connection to API server failed, please check network connection: {0}")]
    ConnectionError(String),

    /// Unexpected failure that is not worth retrying
    #[error("Error generating image: {0}")]
    InternalError(String),

    /// The retry loop ended without a terminal outcome
    #[error("Maximum retry attempts reached, image generation failed")]
    RetriesExhausted,
}

impl GenerationFailure {
    /// Whether this failure belongs to the retryable class.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GenerationFailure::RateLimited
                | GenerationFailure::ServerError { .. }
                | GenerationFailure::Timeout { .. }
                | GenerationFailure::ConnectionError(_)
                | GenerationFailure::RetriesExhausted
        )
    }
}

/// Image persistence errors.
#[derive(Debug, Error)]
pub enum PersistError {
    /// Not a single image could be written
    #[error(
        "All image saves failed ({attempted} attempted). Please ensure:\n\
         1. Using absolute path (example: /Users/username/Documents/images)\n\
         2. Directory has write permissions\n\
         3. Sufficient disk space"
    )]
    AllSavesFailed {
        /// Number of images the persister tried to write
        attempted: usize,
    },
}

/// Result type alias using the unified Error type.
pub type Result<T> = std::result::Result<T, Error>;
