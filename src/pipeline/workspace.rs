//! Per-build workspaces.
//!
//! A workspace is a freshly created, uniquely named directory holding the
//! submitted source, the compiler log and the produced artifact. Its directory
//! name is also what makes the resulting route unique.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tempfile::TempDir;

use crate::config::RetentionPolicy;

/// Name of the program entry file inside a workspace.
pub const SOURCE_FILE: &str = "main.rs";

/// Name of the combined compiler output file inside a workspace.
pub const BUILD_LOG: &str = "build.log";

/// Prefix of every workspace directory name.
pub const WORKSPACE_PREFIX: &str = "addhandler";

/// Crate name passed to the compiler; the artifact is the platform library file for it.
pub const ARTIFACT_CRATE: &str = "handler";

/// Platform library filename of the artifact (`libhandler.so`, `handler.dll`, ...).
pub fn artifact_filename() -> OsString {
    libloading::library_filename(ARTIFACT_CRATE)
}

/// A workspace owned by one pipeline run.
///
/// Dropping it without [`Workspace::persist`] applies the retention policy
/// for failed runs.
#[derive(Debug)]
pub struct Workspace {
    dir: Option<TempDir>,
    path: PathBuf,
    retention: RetentionPolicy,
}

impl Workspace {
    /// Create a new uniquely named directory under `root`.
    pub fn create(root: &Path, retention: RetentionPolicy) -> std::io::Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir_in(root)?;
        let path = dir.path().to_path_buf();
        Ok(Self { dir: Some(dir), path, retention })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the program entry file verbatim.
    pub fn write_source(&self, source: &[u8]) -> std::io::Result<PathBuf> {
        let path = self.path.join(SOURCE_FILE);
        std::fs::write(&path, source)?;
        Ok(path)
    }

    pub fn artifact_path(&self) -> PathBuf {
        self.path.join(artifact_filename())
    }

    /// URL path under which the artifact's handler is served.
    pub fn route(&self) -> String {
        let dir_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!("/{}/{}", dir_name, artifact_filename().to_string_lossy())
    }

    /// Keep the directory on disk past this value's lifetime.
    pub fn persist(mut self) -> PathBuf {
        if let Some(dir) = self.dir.take() {
            let _ = dir.keep();
        }
        self.path.clone()
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        if self.retention == RetentionPolicy::KeepAll {
            let _ = dir.keep();
            return;
        }
        if let Err(e) = dir.close() {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove workspace");
        } else {
            tracing::debug!(path = %self.path.display(), "Removed workspace of failed submission");
        }
    }
}

/// Workspaces kept because their artifacts back live routes.
#[derive(Debug, Default)]
pub struct RetainedWorkspaces {
    paths: Mutex<Vec<PathBuf>>,
}

impl RetainedWorkspaces {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn retain(&self, workspace: Workspace) -> PathBuf {
        let path = workspace.persist();
        if let Ok(mut paths) = self.paths.lock() {
            paths.push(path.clone());
        }
        path
    }

    pub fn len(&self) -> usize {
        self.paths.lock().map(|p| p.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Delete every retained workspace. Returns how many were removed.
    ///
    /// Loaded libraries stay mapped; only their files disappear.
    pub fn purge(&self) -> usize {
        let paths = match self.paths.lock() {
            Ok(mut paths) => std::mem::take(&mut *paths),
            Err(_) => return 0,
        };
        let mut removed = 0;
        for path in paths {
            match std::fs::remove_dir_all(&path) {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to purge workspace"),
            }
        }
        removed
    }
}
