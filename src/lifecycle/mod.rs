//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load template → Initialize subsystems → Start listener
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Cancel builds → Stop accepting → Drain → Purge workspaces → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: template first, then core, then listeners
//! - In-flight builds are cancelled rather than awaited

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
