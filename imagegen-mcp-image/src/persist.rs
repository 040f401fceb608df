//! Writing generated images to disk.

use crate::client::EncodedImage;
use crate::path::ValidatedPath;
use imagegen_mcp_common::config::OutputConfig;
use imagegen_mcp_common::error::PersistError;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{error, info};

/// Stem used when the requested file name has none.
pub const FALLBACK_STEM: &str = "image";

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Outcome of saving one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveResult {
    pub path: PathBuf,
    pub succeeded: bool,
    pub error: Option<String>,
}

impl SaveResult {
    fn saved(path: PathBuf) -> Self {
        Self {
            path,
            succeeded: true,
            error: None,
        }
    }

    fn failed(path: PathBuf, error: impl Into<String>) -> Self {
        Self {
            path,
            succeeded: false,
            error: Some(error.into()),
        }
    }
}

/// Collect the paths that were written.
///
/// Fails only when nothing was saved.
pub fn saved_paths(results: &[SaveResult]) -> Result<Vec<String>, PersistError> {
    let paths: Vec<String> = results
        .iter()
        .filter(|r| r.succeeded)
        .map(|r| r.path.display().to_string())
        .collect();

    if paths.is_empty() {
        return Err(PersistError::AllSavesFailed {
            attempted: results.len(),
        });
    }
    Ok(paths)
}

/// Saves decoded images under deterministic, collision-free names.
#[derive(Debug, Clone)]
pub struct ImagePersister {
    config: OutputConfig,
}

impl ImagePersister {
    pub fn new(config: OutputConfig) -> Self {
        Self { config }
    }

    /// Split a requested file name into `(stem, extension)`.
    ///
    /// Directory components are dropped. An extension outside the allowed
    /// set is replaced with the default one.
    pub fn normalize_file_name(&self, file_name: &str) -> (String, String) {
        let name = Path::new(file_name.trim())
            .file_name()
            .map(Path::new)
            .unwrap_or_else(|| Path::new(""));

        let stem = name
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or(FALLBACK_STEM)
            .to_string();

        let extension = name
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e))
            .filter(|e| self.is_allowed(e))
            .unwrap_or_else(|| self.config.default_extension.clone());

        (stem, extension)
    }

    fn is_allowed(&self, extension: &str) -> bool {
        self.config
            .allowed_extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(extension))
    }

    /// Path for the image at `index`: `stem.ext` first, then `stem_1.ext`, ...
    pub fn target_path(&self, dir: &Path, file_name: &str, index: usize) -> PathBuf {
        let (stem, extension) = self.normalize_file_name(file_name);
        if index == 0 {
            dir.join(format!("{}{}", stem, extension))
        } else {
            dir.join(format!("{}_{}{}", stem, index, extension))
        }
    }

    /// Decode and write each image, continuing past individual failures.
    ///
    /// Results are in the same order as `images`.
    pub async fn persist(
        &self,
        images: &[EncodedImage],
        dir: &ValidatedPath,
        file_name: &str,
    ) -> Vec<SaveResult> {
        let mut results = Vec::with_capacity(images.len());

        for (index, image) in images.iter().enumerate() {
            let target = self.target_path(dir.as_path(), file_name, index);

            let bytes = match image.decode() {
                Ok(bytes) if bytes.is_empty() => {
                    error!(path = %target.display(), "Image data is empty");
                    results.push(SaveResult::failed(target, "empty image data"));
                    continue;
                }
                Ok(bytes) => bytes,
                Err(e) => {
                    error!(path = %target.display(), error = %e, "Image data is not valid base64");
                    results.push(SaveResult::failed(target, format!("invalid image data: {}", e)));
                    continue;
                }
            };

            match write_atomic(dir.as_path(), &target, &bytes).await {
                Ok(()) => {
                    info!(path = %target.display(), bytes = bytes.len(), "Image saved");
                    results.push(SaveResult::saved(target));
                }
                Err(e) => {
                    error!(path = %target.display(), error = %e, "Failed to save image");
                    results.push(SaveResult::failed(target, e.to_string()));
                }
            }
        }

        results
    }
}

/// Write via a hidden temporary file in `dir`, then rename onto `target`.
async fn write_atomic(dir: &Path, target: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let temp = dir.join(format!(
        ".imagegen-{}-{}.tmp",
        std::process::id(),
        TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));

    let written = match tokio::fs::write(&temp, bytes).await {
        Ok(()) => tokio::fs::rename(&temp, target).await,
        Err(e) => Err(e),
    };

    if written.is_err() {
        let _ = tokio::fs::remove_file(&temp).await;
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_B64: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNk+M9QDwADhgGAWjR9awAAAABJRU5ErkJggg==";

    fn persister() -> ImagePersister {
        ImagePersister::new(OutputConfig {
            base_folder: PathBuf::from("/unused"),
            allowed_extensions: vec![".png".into(), ".jpg".into(), ".jpeg".into()],
            default_extension: ".png".into(),
        })
    }

    async fn validated_dir() -> (tempfile::TempDir, ValidatedPath) {
        let temp = tempfile::tempdir().unwrap();
        let dir = crate::path::validate(temp.path()).await.unwrap();
        (temp, dir)
    }

    fn file_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_normalize_keeps_allowed_extension() {
        let p = persister();
        assert_eq!(p.normalize_file_name("cat.png"), ("cat".into(), ".png".into()));
        assert_eq!(p.normalize_file_name("cat.jpeg"), ("cat".into(), ".jpeg".into()));
        assert_eq!(p.normalize_file_name("Cat.JPG"), ("Cat".into(), ".JPG".into()));
    }

    #[test]
    fn test_normalize_replaces_or_appends_default() {
        let p = persister();
        assert_eq!(p.normalize_file_name("cat"), ("cat".into(), ".png".into()));
        assert_eq!(p.normalize_file_name("cat.gif"), ("cat".into(), ".png".into()));
        assert_eq!(p.normalize_file_name("my.cat.webp"), ("my.cat".into(), ".png".into()));
    }

    #[test]
    fn test_normalize_strips_directories_and_empty_names() {
        let p = persister();
        assert_eq!(p.normalize_file_name("../../etc/cat.jpg"), ("cat".into(), ".jpg".into()));
        assert_eq!(p.normalize_file_name(""), ("image".into(), ".png".into()));
        assert_eq!(p.normalize_file_name(".."), ("image".into(), ".png".into()));
    }

    #[test]
    fn test_target_paths_are_indexed() {
        let p = persister();
        let dir = Path::new("/out");
        assert_eq!(p.target_path(dir, "sunset.jpg", 0), PathBuf::from("/out/sunset.jpg"));
        assert_eq!(p.target_path(dir, "sunset.jpg", 1), PathBuf::from("/out/sunset_1.jpg"));
        assert_eq!(p.target_path(dir, "sunset", 3), PathBuf::from("/out/sunset_3.png"));
    }

    #[tokio::test]
    async fn test_persist_writes_decoded_bytes() {
        let (_temp, dir) = validated_dir().await;
        let images = vec![EncodedImage::new("aGVsbG8="), EncodedImage::new("d29ybGQ=")];

        let results = persister().persist(&images, &dir, "greeting.txt").await;

        assert!(results.iter().all(|r| r.succeeded));
        assert_eq!(std::fs::read(dir.as_path().join("greeting.png")).unwrap(), b"hello");
        assert_eq!(std::fs::read(dir.as_path().join("greeting_1.png")).unwrap(), b"world");
        assert_eq!(file_names(dir.as_path()), vec!["greeting.png", "greeting_1.png"]);
    }

    #[tokio::test]
    async fn test_persist_skips_undecodable_image() {
        let (_temp, dir) = validated_dir().await;
        let images = vec![
            EncodedImage::new(PNG_B64),
            EncodedImage::new(PNG_B64),
            EncodedImage::new("%%% not base64 %%%"),
            EncodedImage::new(PNG_B64),
        ];

        let results = persister().persist(&images, &dir, "name").await;

        assert_eq!(results.len(), 4);
        assert!(!results[2].succeeded);
        assert!(results[2].error.as_deref().unwrap().contains("invalid image data"));

        let paths = saved_paths(&results).unwrap();
        assert_eq!(paths.len(), 3);
        assert_eq!(file_names(dir.as_path()), vec!["name.png", "name_1.png", "name_3.png"]);
    }

    #[tokio::test]
    async fn test_persist_never_writes_empty_file() {
        let (_temp, dir) = validated_dir().await;
        let images = vec![EncodedImage::new(""), EncodedImage::new(PNG_B64)];

        let results = persister().persist(&images, &dir, "blank.png").await;

        assert!(!results[0].succeeded);
        assert_eq!(results[0].error.as_deref(), Some("empty image data"));
        assert!(results[1].succeeded);
        assert_eq!(file_names(dir.as_path()), vec!["blank_1.png"]);
    }

    #[tokio::test]
    async fn test_persist_overwrites_existing_file() {
        let (_temp, dir) = validated_dir().await;
        std::fs::write(dir.as_path().join("old.png"), b"stale").unwrap();

        let results = persister()
            .persist(&[EncodedImage::new("ZnJlc2g=")], &dir, "old.png")
            .await;

        assert!(results[0].succeeded);
        assert_eq!(std::fs::read(dir.as_path().join("old.png")).unwrap(), b"fresh");
    }

    #[tokio::test]
    async fn test_failed_write_leaves_no_temp_file() {
        let (_temp, dir) = validated_dir().await;
        // A non-empty directory at the target name makes the rename fail.
        let blocker = dir.as_path().join("blocked.png");
        std::fs::create_dir(&blocker).unwrap();
        std::fs::write(blocker.join("inner"), b"x").unwrap();

        let results = persister()
            .persist(&[EncodedImage::new(PNG_B64)], &dir, "blocked.png")
            .await;

        assert!(!results[0].succeeded);
        assert!(results[0].error.is_some());
        assert_eq!(file_names(dir.as_path()), vec!["blocked.png"]);
        assert!(matches!(
            saved_paths(&results),
            Err(PersistError::AllSavesFailed { attempted: 1 })
        ));
    }

    #[test]
    fn test_saved_paths_keeps_order() {
        let results = vec![
            SaveResult::saved(PathBuf::from("/a/x.png")),
            SaveResult::failed(PathBuf::from("/a/x_1.png"), "disk full"),
            SaveResult::saved(PathBuf::from("/a/x_2.png")),
        ];
        assert_eq!(saved_paths(&results).unwrap(), vec!["/a/x.png", "/a/x_2.png"]);
    }

    #[test]
    fn test_all_failed_message_has_hints() {
        let results = vec![SaveResult::failed(PathBuf::from("/a/x.png"), "denied")];
        let msg = saved_paths(&results).unwrap_err().to_string();
        assert!(msg.contains("absolute path"));
        assert!(msg.contains("write permissions"));
    }
}
