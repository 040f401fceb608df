//! Generation request construction.
//!
//! Turns the logical tool parameters (prompt, aspect ratio or explicit
//! dimensions, step count) into an immutable [`GenerationRequest`], applying
//! configured defaults and limits. Nothing here touches the network or disk.

use imagegen_mcp_common::config::ImageConfig;
use imagegen_mcp_common::error::RequestError;

/// Supported aspect ratios and the dimensions they resolve to.
pub const ASPECT_RATIOS: &[(&str, u32, u32)] = &[
    ("1:1", 1024, 1024),
    ("4:3", 1024, 768),
    ("16:9", 1024, 576),
    ("3:4", 768, 1024),
    ("9:16", 576, 1024),
];

/// Minimum number of inference steps.
pub const MIN_STEPS: u8 = 1;

/// Maximum number of inference steps.
pub const MAX_STEPS: u8 = 4;

/// Look up the dimensions for an aspect ratio key.
pub fn resolve_aspect_ratio(key: &str) -> Option<(u32, u32)> {
    ASPECT_RATIOS
        .iter()
        .find(|(ratio, _, _)| *ratio == key)
        .map(|(_, width, height)| (*width, *height))
}

/// Comma separated list of every supported aspect ratio key.
pub fn valid_aspect_ratios() -> String {
    ASPECT_RATIOS
        .iter()
        .map(|(ratio, _, _)| *ratio)
        .collect::<Vec<_>>()
        .join(", ")
}

/// How the caller chose the image dimensions.
///
/// Aspect-ratio and explicit-dimension modes are mutually exclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DimensionSpec {
    /// Use the configured default width and height.
    #[default]
    Default,
    /// Resolve through [`ASPECT_RATIOS`].
    AspectRatio(String),
    /// Explicit dimensions; a missing side takes its configured default.
    Explicit {
        width: Option<i64>,
        height: Option<i64>,
    },
}

impl DimensionSpec {
    /// Build a spec from raw tool parameters.
    ///
    /// A blank aspect ratio counts as absent.
    ///
    /// # Errors
    /// Returns `RequestError::ConflictingDimensions` if both an aspect ratio
    /// and a width or height were supplied.
    pub fn from_parts(
        aspect_ratio: Option<String>,
        width: Option<i64>,
        height: Option<i64>,
    ) -> Result<Self, RequestError> {
        let aspect_ratio = aspect_ratio
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());
        let has_dims = width.is_some() || height.is_some();

        match (aspect_ratio, has_dims) {
            (Some(_), true) => Err(RequestError::ConflictingDimensions),
            (Some(ratio), false) => Ok(DimensionSpec::AspectRatio(ratio)),
            (None, true) => Ok(DimensionSpec::Explicit { width, height }),
            (None, false) => Ok(DimensionSpec::Default),
        }
    }
}

/// A validated generation request.
///
/// Fields are private so a request can only come out of [`RequestBuilder::build`]
/// with its invariants intact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    prompt: String,
    width: u32,
    height: u32,
    steps: u8,
    batch_size: u8,
}

impl GenerationRequest {
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn steps(&self) -> u8 {
        self.steps
    }

    pub fn batch_size(&self) -> u8 {
        self.batch_size
    }

    /// Requested pixel count.
    pub fn pixel_area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// Builds [`GenerationRequest`]s against a fixed set of image limits.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    config: ImageConfig,
}

impl RequestBuilder {
    pub fn new(config: ImageConfig) -> Self {
        Self { config }
    }

    /// Validate parameters and build a request.
    ///
    /// Checks run in order: prompt, steps, dimensions. The first failure is
    /// returned.
    pub fn build(
        &self,
        prompt: &str,
        dimensions: &DimensionSpec,
        steps: Option<i64>,
    ) -> Result<GenerationRequest, RequestError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(RequestError::EmptyPrompt);
        }

        let steps = steps.unwrap_or_else(|| i64::from(self.config.default_steps));
        if steps < i64::from(MIN_STEPS) || steps > i64::from(MAX_STEPS) {
            return Err(RequestError::InvalidSteps {
                value: steps,
                min: MIN_STEPS,
                max: MAX_STEPS,
            });
        }

        let (width, height) = self.resolve_dimensions(dimensions)?;

        Ok(GenerationRequest {
            prompt: prompt.to_string(),
            width,
            height,
            // Range checked above.
            steps: steps as u8,
            batch_size: self.config.batch_size,
        })
    }

    fn resolve_dimensions(&self, dimensions: &DimensionSpec) -> Result<(u32, u32), RequestError> {
        let (width, height) = match dimensions {
            DimensionSpec::Default => (
                i64::from(self.config.default_width),
                i64::from(self.config.default_height),
            ),
            DimensionSpec::AspectRatio(ratio) => {
                let (w, h) = resolve_aspect_ratio(ratio).ok_or_else(|| {
                    RequestError::UnsupportedRatio {
                        ratio: ratio.clone(),
                        valid: valid_aspect_ratios(),
                    }
                })?;
                (i64::from(w), i64::from(h))
            }
            DimensionSpec::Explicit { width, height } => (
                width.unwrap_or_else(|| i64::from(self.config.default_width)),
                height.unwrap_or_else(|| i64::from(self.config.default_height)),
            ),
        };

        let fits = |value: i64, max: u32| value > 0 && value <= i64::from(max);
        if !fits(width, self.config.max_width) || !fits(height, self.config.max_height) {
            return Err(RequestError::InvalidDimensions {
                width,
                height,
                max_width: self.config.max_width,
                max_height: self.config.max_height,
            });
        }

        Ok((width as u32, height as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> RequestBuilder {
        RequestBuilder::new(ImageConfig::default())
    }

    #[test]
    fn test_aspect_ratio_table() {
        assert_eq!(resolve_aspect_ratio("1:1"), Some((1024, 1024)));
        assert_eq!(resolve_aspect_ratio("4:3"), Some((1024, 768)));
        assert_eq!(resolve_aspect_ratio("16:9"), Some((1024, 576)));
        assert_eq!(resolve_aspect_ratio("3:4"), Some((768, 1024)));
        assert_eq!(resolve_aspect_ratio("9:16"), Some((576, 1024)));
        assert_eq!(resolve_aspect_ratio("2:1"), None);
    }

    #[test]
    fn test_every_ratio_builds_documented_dimensions() {
        for (ratio, width, height) in ASPECT_RATIOS {
            let request = builder()
                .build("a cat", &DimensionSpec::AspectRatio(ratio.to_string()), None)
                .unwrap();
            assert_eq!((request.width(), request.height()), (*width, *height), "ratio {}", ratio);
        }
    }

    #[test]
    fn test_defaults_applied() {
        let request = builder().build("a cat", &DimensionSpec::Default, None).unwrap();
        assert_eq!(request.width(), 1024);
        assert_eq!(request.height(), 1024);
        assert_eq!(request.steps(), 3);
        assert_eq!(request.batch_size(), 4);
        assert_eq!(request.prompt(), "a cat");
        assert_eq!(request.pixel_area(), 1024 * 1024);
    }

    #[test]
    fn test_prompt_is_trimmed() {
        let request = builder().build("  a cat \n", &DimensionSpec::Default, None).unwrap();
        assert_eq!(request.prompt(), "a cat");
    }

    #[test]
    fn test_empty_prompt() {
        let err = builder().build("   ", &DimensionSpec::Default, Some(2)).unwrap_err();
        assert_eq!(err, RequestError::EmptyPrompt);
    }

    #[test]
    fn test_unsupported_ratio_lists_valid_keys() {
        let err = builder()
            .build("a cat", &DimensionSpec::AspectRatio("21:9".to_string()), None)
            .unwrap_err();
        let msg = err.to_string();
        assert!(matches!(err, RequestError::UnsupportedRatio { .. }));
        for (ratio, _, _) in ASPECT_RATIOS {
            assert!(msg.contains(ratio), "message should list {}: {}", ratio, msg);
        }
    }

    #[test]
    fn test_explicit_dimensions() {
        let spec = DimensionSpec::Explicit {
            width: Some(512),
            height: Some(768),
        };
        let request = builder().build("a cat", &spec, Some(4)).unwrap();
        assert_eq!((request.width(), request.height(), request.steps()), (512, 768, 4));
    }

    #[test]
    fn test_explicit_missing_side_uses_default() {
        let spec = DimensionSpec::Explicit {
            width: Some(640),
            height: None,
        };
        let request = builder().build("a cat", &spec, None).unwrap();
        assert_eq!((request.width(), request.height()), (640, 1024));
    }

    #[test]
    fn test_oversized_dimensions_rejected() {
        let spec = DimensionSpec::Explicit {
            width: Some(2048),
            height: Some(1024),
        };
        let err = builder().build("a cat", &spec, None).unwrap_err();
        assert!(matches!(err, RequestError::InvalidDimensions { width: 2048, .. }));
        assert!(err.to_string().contains("1024x1024"));
    }

    #[test]
    fn test_zero_dimension_rejected() {
        let spec = DimensionSpec::Explicit {
            width: Some(0),
            height: Some(512),
        };
        assert!(matches!(
            builder().build("a cat", &spec, None),
            Err(RequestError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn test_steps_checked_before_dimensions() {
        let spec = DimensionSpec::AspectRatio("bogus".to_string());
        let err = builder().build("a cat", &spec, Some(9)).unwrap_err();
        assert!(matches!(err, RequestError::InvalidSteps { value: 9, .. }));
    }

    #[test]
    fn test_from_parts() {
        assert_eq!(DimensionSpec::from_parts(None, None, None), Ok(DimensionSpec::Default));
        assert_eq!(
            DimensionSpec::from_parts(Some("  ".to_string()), None, None),
            Ok(DimensionSpec::Default)
        );
        assert_eq!(
            DimensionSpec::from_parts(Some("16:9".to_string()), None, None),
            Ok(DimensionSpec::AspectRatio("16:9".to_string()))
        );
        assert_eq!(
            DimensionSpec::from_parts(None, Some(512), None),
            Ok(DimensionSpec::Explicit {
                width: Some(512),
                height: None
            })
        );
        assert_eq!(
            DimensionSpec::from_parts(Some("1:1".to_string()), Some(512), Some(512)),
            Err(RequestError::ConflictingDimensions)
        );
    }

    #[test]
    fn test_valid_aspect_ratios_listing() {
        assert_eq!(valid_aspect_ratios(), "1:1, 4:3, 16:9, 3:4, 9:16");
    }
}
