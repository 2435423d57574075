//! The transient profile file handed to the enforcement facility.

use std::io::Write;
use std::path::Path;

use tempfile::TempPath;
use tracing::{debug, warn};

use crate::error::{ExecError, ExecResult};

/// A rendered profile on disk, removed when the guard goes away.
///
/// Created exclusively with mode 0600 under a fresh random name, so
/// nothing else can have opened or swapped it before the facility reads it.
#[derive(Debug)]
pub struct SandboxArtifact {
    path: Option<TempPath>,
}

impl SandboxArtifact {
    /// Write `text` to a new `agbox-*.sb` file in `dir`, or in the system
    /// temp directory when `dir` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::Artifact`] if the file cannot be created,
    /// written or synced.
    pub fn create(text: &str, dir: Option<&Path>) -> ExecResult<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("agbox-").suffix(".sb");
        let mut file = match dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(ExecError::Artifact)?;

        file.write_all(text.as_bytes()).map_err(ExecError::Artifact)?;
        file.as_file().sync_all().map_err(ExecError::Artifact)?;

        let path = file.into_temp_path();
        debug!(path = %path.display(), bytes = text.len(), "Wrote sandbox profile");
        Ok(Self { path: Some(path) })
    }

    /// The artifact's path, or `None` once removed.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Delete the file now. Safe to call more than once; failures are
    /// logged and otherwise ignored.
    pub fn remove(&mut self) {
        if let Some(path) = self.path.take() {
            let shown = path.display().to_string();
            match path.close() {
                Ok(()) => debug!(path = %shown, "Removed sandbox profile"),
                Err(e) => warn!(path = %shown, error = %e, "Failed to remove sandbox profile"),
            }
        }
    }
}

impl Drop for SandboxArtifact {
    fn drop(&mut self) {
        self.remove();
    }
}

#[cfg(test)]
mod tests {
    use std::os::unix::fs::PermissionsExt;

    use super::*;

    #[test]
    fn test_create_writes_private_file() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = SandboxArtifact::create("(version 1)\n", Some(dir.path())).unwrap();
        let path = artifact.path().unwrap().to_path_buf();

        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("agbox-"));
        assert!(name.ends_with(".sb"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "(version 1)\n");
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut artifact = SandboxArtifact::create("x", Some(dir.path())).unwrap();
        let path = artifact.path().unwrap().to_path_buf();
        artifact.remove();
        assert!(!path.exists());
        assert!(artifact.path().is_none());
        artifact.remove();
    }

    #[test]
    fn test_drop_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = {
            let artifact = SandboxArtifact::create("x", Some(dir.path())).unwrap();
            artifact.path().unwrap().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_already_deleted_file_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut artifact = SandboxArtifact::create("x", Some(dir.path())).unwrap();
        std::fs::remove_file(artifact.path().unwrap()).unwrap();
        artifact.remove();
    }
}
