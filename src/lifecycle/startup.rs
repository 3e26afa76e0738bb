//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize subsystems in dependency order
//! - Start background tasks (metrics exporter, config watcher, signal listener)
//! - Bind the listener and begin accepting traffic
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Template is loaded before the socket is bound
//! - Listener starts last (traffic only when ready)

use std::net::SocketAddr;
use std::path::PathBuf;

use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::config::watcher::ConfigWatcher;
use crate::config::AppConfig;
use crate::http::listing::TemplateError;
use crate::http::HttpServer;
use crate::lifecycle::signals::spawn_signal_listener;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("loading page template: {0}")]
    Template(#[from] TemplateError),

    #[error("binding {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("watching config file: {0}")]
    Watch(#[from] notify::Error),

    #[error("serving: {0}")]
    Serve(#[source] std::io::Error),
}

/// Start every subsystem and serve until a shutdown signal arrives.
pub async fn run(config: AppConfig, config_path: Option<PathBuf>) -> Result<(), StartupError> {
    let shutdown = Shutdown::new();
    let server = HttpServer::new(config.clone(), &shutdown)?;

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // The watcher must stay alive for the lifetime of the server.
    let (_watcher, config_updates) = match config_path {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(&path, config.build.clone());
            (Some(watcher.run()?), updates)
        }
        None => {
            let (_, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let listener = TcpListener::bind(&config.listener.bind_address)
        .await
        .map_err(|source| StartupError::Bind {
            address: config.listener.bind_address.clone(),
            source,
        })?;
    tracing::info!(
        address = %config.listener.bind_address,
        max_concurrent_builds = config.build.max_concurrent_builds,
        build_timeout_secs = config.build.timeout_secs,
        "Listening for submissions"
    );
    tracing::warn!("Submissions are unauthenticated and run in-process; expose only to trusted networks");

    spawn_signal_listener(shutdown.clone());

    server
        .run(listener, config_updates, shutdown.subscribe())
        .await
        .map_err(StartupError::Serve)
}
