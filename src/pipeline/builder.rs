//! Build service: submitted source → loadable artifact.
//!
//! # Responsibilities
//! - Create a fresh workspace per build and write the source into it verbatim
//! - Run the external compiler with the workspace as working directory
//! - Capture combined stdout/stderr as the only diagnostic for the submitter
//! - Enforce a deadline, a concurrency limit and cancellation on shutdown
//!
//! # Design Decisions
//! - stdout and stderr share one log file, so their interleaving is preserved
//! - The child is killed on drop: a dropped submission stops its compiler
//! - Build settings are hot-swappable; the permit count is fixed at startup

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use tokio::process::Command;
use tokio::sync::Semaphore;

use crate::config::{BuildConfig, RetentionPolicy};
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::pipeline::error::BuildError;
use crate::pipeline::workspace::{
    artifact_filename, RetainedWorkspaces, Workspace, ARTIFACT_CRATE, BUILD_LOG, SOURCE_FILE,
};

/// A successfully built artifact together with the workspace that holds it.
#[derive(Debug)]
pub struct Artifact {
    path: PathBuf,
    route: String,
    workspace: Workspace,
}

impl Artifact {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn route(&self) -> &str {
        &self.route
    }
}

/// Compiles submitted programs into dynamically loadable artifacts.
pub struct Builder {
    settings: ArcSwap<BuildConfig>,
    permits: Arc<Semaphore>,
    max_concurrent: usize,
    workspace_root: PathBuf,
    retention: RetentionPolicy,
    retained: RetainedWorkspaces,
    shutdown: Shutdown,
}

impl Builder {
    /// Create a builder. Concurrency limit, workspace root and retention are fixed here.
    pub fn new(config: BuildConfig, shutdown: Shutdown) -> Self {
        let workspace_root = config
            .workspace_root
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        let max_concurrent = config.max_concurrent_builds.max(1);
        let retention = config.retention;

        Self {
            settings: ArcSwap::from_pointee(config),
            permits: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            workspace_root,
            retention,
            retained: RetainedWorkspaces::new(),
            shutdown,
        }
    }

    /// Swap in new compiler settings. Builds already running keep the old ones.
    pub fn update_settings(&self, config: BuildConfig) {
        self.settings.store(Arc::new(config));
    }

    /// Number of builds currently holding a permit.
    pub fn in_flight(&self) -> usize {
        self.max_concurrent - self.permits.available_permits()
    }

    /// Number of workspaces kept alive for registered routes.
    pub fn retained_workspaces(&self) -> usize {
        self.retained.len()
    }

    /// Compile `source` into an artifact.
    ///
    /// Waits for a free build slot first. On failure the workspace is handled
    /// according to the retention policy.
    pub async fn build(&self, source: &[u8]) -> Result<Artifact, BuildError> {
        let _permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| BuildError::Cancelled)?;

        let started = Instant::now();
        let result = self.build_with_permit(source).await;
        metrics::record_build(
            match &result {
                Ok(_) => "success",
                Err(e) => e.kind(),
            },
            started,
        );
        result
    }

    async fn build_with_permit(&self, source: &[u8]) -> Result<Artifact, BuildError> {
        // Subscribe before checking the flag so a signal in between is not missed.
        let mut shutdown = self.shutdown.subscribe();
        if self.shutdown.is_triggered() {
            return Err(BuildError::Cancelled);
        }
        let settings = self.settings.load_full();

        let workspace = Workspace::create(&self.workspace_root, self.retention)
            .map_err(BuildError::io(format!("creating workspace in {}", self.workspace_root.display())))?;
        workspace
            .write_source(source)
            .map_err(BuildError::io(format!("writing {}", SOURCE_FILE)))?;

        let log_path = workspace.path().join(BUILD_LOG);
        let log = std::fs::File::create(&log_path)
            .map_err(BuildError::io(format!("creating {}", BUILD_LOG)))?;
        let log_for_stderr = log
            .try_clone()
            .map_err(BuildError::io(format!("creating {}", BUILD_LOG)))?;

        let mut command = Command::new(&settings.compiler);
        command
            .arg("--crate-type")
            .arg("cdylib")
            .arg("--edition")
            .arg("2021")
            .arg("--crate-name")
            .arg(ARTIFACT_CRATE)
            .arg("-o")
            .arg(artifact_filename())
            .arg(SOURCE_FILE)
            .args(&settings.extra_args)
            .current_dir(workspace.path())
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_for_stderr))
            .kill_on_drop(true);

        tracing::debug!(
            workspace = %workspace.path().display(),
            compiler = %settings.compiler,
            "Starting compiler"
        );

        let mut child = command
            .spawn()
            .map_err(BuildError::io(format!("starting compiler `{}`", settings.compiler)))?;

        let deadline = Duration::from_secs(settings.timeout_secs);

        let status = tokio::select! {
            status = child.wait() => status.map_err(BuildError::io("waiting for compiler"))?,
            _ = tokio::time::sleep(deadline) => {
                let _ = child.kill().await;
                tracing::warn!(workspace = %workspace.path().display(), timeout = ?deadline, "Compiler exceeded deadline, killed");
                return Err(BuildError::Timeout { after: deadline });
            }
            _ = shutdown.recv() => {
                let _ = child.kill().await;
                tracing::info!(workspace = %workspace.path().display(), "Build cancelled by shutdown");
                return Err(BuildError::Cancelled);
            }
        };

        if !status.success() {
            let output = std::fs::read(&log_path)
                .map_err(BuildError::io(format!("reading {}", BUILD_LOG)))?;
            tracing::info!(
                workspace = %workspace.path().display(),
                status = %status,
                "Compiler rejected submission"
            );
            return Err(BuildError::Compile {
                output: String::from_utf8_lossy(&output).into_owned(),
            });
        }

        let path = workspace.artifact_path();
        let route = workspace.route();
        tracing::info!(artifact = %path.display(), "Build succeeded");
        Ok(Artifact { path, route, workspace })
    }

    /// Keep the artifact's workspace for as long as its route lives.
    pub fn retain(&self, artifact: Artifact) -> PathBuf {
        self.retained.retain(artifact.workspace)
    }

    /// Apply the shutdown half of the retention policy.
    pub fn purge_retained(&self) -> usize {
        if self.retention != RetentionPolicy::PurgeOnShutdown {
            return 0;
        }
        let removed = self.retained.purge();
        tracing::info!(removed, "Purged retained workspaces");
        removed
    }
}
