//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration for the handler server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Build service settings (compiler, deadline, concurrency, retention).
    pub build: BuildConfig,

    /// Listing page settings.
    pub listing: ListingConfig,

    /// Request limits.
    pub security: SecurityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// What happens to build workspaces once a submission is finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RetentionPolicy {
    /// Never delete anything.
    KeepAll,
    /// Delete workspaces of failed builds and loads; keep those backing a live route.
    #[default]
    RemoveFailed,
    /// Like `RemoveFailed`, and delete every kept workspace on graceful shutdown.
    PurgeOnShutdown,
}

/// Build service configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Compiler executable (looked up on PATH if not absolute).
    pub compiler: String,

    /// Extra arguments appended after the fixed ones.
    pub extra_args: Vec<String>,

    /// Deadline for a single compiler run in seconds.
    pub timeout_secs: u64,

    /// Maximum number of compiler processes running at once.
    pub max_concurrent_builds: usize,

    /// Directory in which workspaces are created (system temp dir if unset).
    pub workspace_root: Option<PathBuf>,

    /// Workspace retention policy.
    pub retention: RetentionPolicy,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            compiler: "rustc".to_string(),
            extra_args: vec!["-C".to_string(), "opt-level=1".to_string()],
            timeout_secs: 60,
            max_concurrent_builds: 4,
            workspace_root: None,
            retention: RetentionPolicy::default(),
        }
    }
}

/// Listing page configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ListingConfig {
    /// Path to an HTML template. The built-in template is used when unset.
    pub template_path: Option<PathBuf>,
}

/// Request limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum body size in bytes (submissions and dispatched requests).
    pub max_body_size: usize,

    /// Overall HTTP request timeout in seconds. Must exceed the build deadline.
    pub request_timeout_secs: u64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
            request_timeout_secs: 120,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
        }
    }
}
