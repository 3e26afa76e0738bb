//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated)
//!     → HttpServer::new hands each subsystem its section
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → atomic swap of the build settings
//!     → next build observes new settings
//! ```
//!
//! # Design Decisions
//! - Every field is defaulted; an empty file is a valid config
//! - serde rejects malformed files, validation.rs rejects inconsistent ones
//! - Only compiler, extra args and build timeout hot-reload; everything else
//!   (listener, limits, workspace root, permit count) needs a restart

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::AppConfig;
pub use schema::ListenerConfig;
pub use schema::BuildConfig;
pub use schema::RetentionPolicy;
pub use schema::ObservabilityConfig;
