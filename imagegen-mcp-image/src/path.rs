//! Output directory validation.

use imagegen_mcp_common::config::home_dir;
use imagegen_mcp_common::error::PathError;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Name of the zero-byte file used to probe write access.
pub const WRITE_PROBE_NAME: &str = ".write_test";

/// An absolute directory that exists and accepted a probe write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedPath(PathBuf);

impl ValidatedPath {
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }
}

impl AsRef<Path> for ValidatedPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

/// Validate `path` as an image output directory.
///
/// The target directory is created if missing, but its parent must already
/// exist. The directory is left in place even if validation fails at the
/// write probe.
pub async fn validate(path: impl AsRef<Path>) -> Result<ValidatedPath, PathError> {
    let path = path.as_ref();

    if !path.is_absolute() {
        return Err(PathError::NotAbsolute {
            path: path.display().to_string(),
            example: absolute_example(path).display().to_string(),
        });
    }

    if let Some(parent) = path.parent() {
        match tokio::fs::metadata(parent).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Err(PathError::ParentMissing(parent.to_path_buf())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(PathError::ParentMissing(parent.to_path_buf()));
            }
            Err(e) => {
                return Err(PathError::ValidationFailed(format!(
                    "cannot inspect {}: {}",
                    parent.display(),
                    e
                )));
            }
        }
    }

    if let Err(e) = tokio::fs::create_dir_all(path).await {
        return Err(match e.kind() {
            ErrorKind::AlreadyExists => PathError::ValidationFailed(format!(
                "{} exists and is not a directory",
                path.display()
            )),
            ErrorKind::PermissionDenied => PathError::permission_denied(path, e.to_string()),
            _ => PathError::ValidationFailed(format!("cannot create {}: {}", path.display(), e)),
        });
    }

    let probe = path.join(WRITE_PROBE_NAME);
    tokio::fs::File::create(&probe)
        .await
        .map_err(|e| PathError::permission_denied(path, e.to_string()))?;
    tokio::fs::remove_file(&probe)
        .await
        .map_err(|e| PathError::permission_denied(path, e.to_string()))?;

    debug!(path = %path.display(), "Output directory validated");
    Ok(ValidatedPath(path.to_path_buf()))
}

/// Suggest an absolute version of a relative path, rooted at the home directory.
fn absolute_example(path: &Path) -> PathBuf {
    let home = home_dir().unwrap_or_else(|| PathBuf::from("/home/user"));
    let relative: PathBuf = path
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect();

    if relative.as_os_str().is_empty() {
        home.join("Documents").join("images")
    } else {
        home.join(relative)
    }
}
