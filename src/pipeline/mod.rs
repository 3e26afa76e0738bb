//! Submission pipeline.
//!
//! # Data Flow
//! ```text
//! POST /addhandler (program source)
//!     → coordinator.rs (sequencing, no rollback)
//!     → builder.rs    (workspace.rs + external compiler → artifact)
//!     → loader.rs     (dlopen → resolve `H` → abi.rs descriptor check)
//!     → routing::LiveRoutes::register (handler, then registry entry)
//!     → 302 to the new route
//! ```
//!
//! # Design Decisions
//! - Every stage error propagates unchanged to the HTTP boundary (error.rs)
//! - Builds are bounded: deadline, semaphore, cancellation on shutdown
//! - The only unsafe code in the crate lives in loader.rs and abi.rs
//!
//! # Open gap
//! Submissions are unauthenticated and accepted code runs in-process with the
//! server's privileges. Deploying this beyond a trusted network needs an
//! explicit policy decision first.

pub mod abi;
pub mod builder;
pub mod coordinator;
pub mod error;
pub mod loader;
pub mod workspace;

pub use builder::{Artifact, Builder};
pub use coordinator::Pipeline;
pub use error::{BuildError, LoadError, PipelineError, RegisterError};
pub use loader::LoadedHandler;
