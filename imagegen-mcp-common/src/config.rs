//! Configuration module for loading environment variables and settings.

use crate::error::ConfigError;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default generation endpoint.
pub const DEFAULT_API_URL: &str = "https://api.together.xyz/v1/images/generations";

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "black-forest-labs/FLUX.1-schnell-Free";

/// Environment variable holding the API bearer token.
pub const API_KEY_VAR: &str = "TOGETHER_API_KEY";

/// Largest image side the model accepts.
pub const MAX_DIMENSION: u32 = 1024;

/// Largest batch the API accepts per request.
pub const MAX_BATCH_SIZE: u8 = 4;

/// Remote API settings.
#[derive(Clone)]
pub struct ApiConfig {
    /// Generation endpoint URL
    pub url: String,
    /// Model identifier sent with every request
    pub model: String,
    /// Bearer token
    pub api_key: String,
    /// Per-attempt timeout for a 1024x1024 image
    pub timeout: Duration,
    /// Total number of attempts per call
    pub max_retries: u32,
    /// Base delay for linear backoff
    pub retry_delay: Duration,
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("url", &self.url)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("retry_delay", &self.retry_delay)
            .finish()
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_API_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: String::new(),
            timeout: Duration::from_secs(60),
            max_retries: 3,
            retry_delay: Duration::from_secs(5),
        }
    }
}

/// Image dimension and step limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageConfig {
    pub max_width: u32,
    pub max_height: u32,
    pub default_width: u32,
    pub default_height: u32,
    pub default_steps: u8,
    /// Number of images requested per call (`n` on the wire)
    pub batch_size: u8,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            max_width: MAX_DIMENSION,
            max_height: MAX_DIMENSION,
            default_width: 1024,
            default_height: 1024,
            default_steps: 3,
            batch_size: MAX_BATCH_SIZE,
        }
    }
}

/// Output file settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputConfig {
    /// Directory used when the caller passes an empty save folder
    pub base_folder: PathBuf,
    /// Accepted file extensions, lowercase with leading dot
    pub allowed_extensions: Vec<String>,
    /// Extension applied when the requested one is missing or not allowed
    pub default_extension: String,
}

impl OutputConfig {
    fn with_home(home: Option<PathBuf>) -> Self {
        let home = home.unwrap_or_else(|| PathBuf::from("/home/user"));
        Self {
            base_folder: home.join("Documents").join("generate_images"),
            allowed_extensions: vec![".png".to_string(), ".jpg".to_string(), ".jpeg".to_string()],
            default_extension: ".png".to_string(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::with_home(home_dir())
    }
}

/// Application configuration loaded from environment variables.
///
/// The listening port is a transport concern and comes from `TransportArgs`.
#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub image: ImageConfig,
    pub output: OutputConfig,
}

impl Config {
    /// Build a configuration with every default and the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api: ApiConfig {
                api_key: api_key.into(),
                ..ApiConfig::default()
            },
            image: ImageConfig::default(),
            output: OutputConfig::default(),
        }
    }

    /// Load configuration from environment variables and .env file.
    ///
    /// # Errors
    /// Returns `ConfigError::MissingEnvVar` if TOGETHER_API_KEY is not set and
    /// `ConfigError::InvalidValue` if any numeric setting does not parse or is
    /// out of range.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup(API_KEY_VAR)
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ConfigError::missing_env_var(API_KEY_VAR))?;

        let defaults = ApiConfig::default();
        let api = ApiConfig {
            url: lookup("IMAGE_API_URL").unwrap_or(defaults.url),
            model: lookup("IMAGE_MODEL").unwrap_or(defaults.model),
            api_key,
            timeout: Duration::from_secs(parse_var(&lookup, "IMAGE_API_TIMEOUT_SECS", 60)?),
            max_retries: parse_var(&lookup, "IMAGE_API_MAX_RETRIES", defaults.max_retries)?,
            retry_delay: Duration::from_secs(parse_var(&lookup, "IMAGE_API_RETRY_DELAY_SECS", 5)?),
        };
        if api.max_retries == 0 {
            return Err(ConfigError::invalid_value("IMAGE_API_MAX_RETRIES", "must be at least 1"));
        }

        let image = ImageConfig {
            default_steps: parse_var(&lookup, "IMAGE_DEFAULT_STEPS", 3)?,
            batch_size: parse_var(&lookup, "IMAGE_BATCH_SIZE", MAX_BATCH_SIZE)?,
            ..ImageConfig::default()
        };
        if !(1..=4).contains(&image.default_steps) {
            return Err(ConfigError::invalid_value("IMAGE_DEFAULT_STEPS", "must be between 1 and 4"));
        }
        if image.batch_size == 0 || image.batch_size > MAX_BATCH_SIZE {
            return Err(ConfigError::invalid_value(
                "IMAGE_BATCH_SIZE",
                format!("must be between 1 and {}", MAX_BATCH_SIZE),
            ));
        }

        let mut output = OutputConfig::with_home(lookup("HOME").map(PathBuf::from));
        if let Some(dir) = lookup("IMAGE_OUTPUT_DIR") {
            output.base_folder = PathBuf::from(dir);
        }

        Ok(Self { api, image, output })
    }
}

fn parse_var<F, T>(lookup: &F, name: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::invalid_value(name, e.to_string())),
        None => Ok(default),
    }
}

/// The current user's home directory, if the environment names one.
pub fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
}
