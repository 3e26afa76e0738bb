//! Configuration file watcher for hot reload.
//!
//! Only the `[build]` section is reloadable. Editor saves often fire several
//! events for one change, so a reload is forwarded only when the build
//! settings actually differ from the last ones sent.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use notify::{Watcher, RecursiveMode, Event, RecommendedWatcher, Config};
use tokio::sync::mpsc;
use crate::config::loader::load_config;
use crate::config::schema::{AppConfig, BuildConfig};

/// Watches the configuration file and publishes changed build settings.
pub struct ConfigWatcher {
    path: PathBuf,
    current: BuildConfig,
    update_tx: mpsc::UnboundedSender<AppConfig>,
}

impl ConfigWatcher {
    /// Create a watcher for `path`, seeded with the build settings already in effect.
    ///
    /// Returns the watcher and a receiver for configuration updates.
    pub fn new(path: &Path, current: BuildConfig) -> (Self, mpsc::UnboundedReceiver<AppConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (Self {
            path: path.to_path_buf(),
            current,
            update_tx,
        }, update_rx)
    }

    /// Start watching the file in a background thread.
    ///
    /// The returned watcher must be kept alive for as long as updates are wanted.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx;
        let path = self.path.clone();
        let last_sent = Mutex::new(self.current);

        let mut watcher = RecommendedWatcher::new(move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    tracing::error!(error = ?e, "Config watch error");
                    return;
                }
            };
            if !(event.kind.is_modify() || event.kind.is_create()) {
                return;
            }

            let new_config = match load_config(&path) {
                Ok(config) => config,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to reload config, keeping current build settings");
                    return;
                }
            };

            let Ok(mut last) = last_sent.lock() else {
                return;
            };
            if *last == new_config.build {
                tracing::debug!("Config file touched but build settings unchanged");
                return;
            }
            if last.max_concurrent_builds != new_config.build.max_concurrent_builds
                || last.workspace_root != new_config.build.workspace_root
            {
                tracing::warn!("build.max_concurrent_builds and build.workspace_root only take effect on restart");
            }

            tracing::info!(
                compiler = %new_config.build.compiler,
                timeout_secs = new_config.build.timeout_secs,
                "Build settings changed, reloading"
            );
            *last = new_config.build.clone();
            let _ = tx.send(new_config);
        }, Config::default().with_poll_interval(Duration::from_secs(2)))?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}
