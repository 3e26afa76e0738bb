//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request (path)
//!     → router.rs (exact lookup in the live handler table)
//!     → Return: handler or NoMatch (listing view)
//!
//! Registration (after a successful load):
//!     commit lock
//!     → router.rs   insert path → handler   (dispatchable)
//!     → registry.rs insert path → source    (visible in listing)
//! ```
//!
//! # Design Decisions
//! - Two independently locked structures; readers only ever take one of them
//! - Writers serialise on a commit lock and always insert handler before entry,
//!   so any path a reader can see in the registry is already dispatchable
//! - Nothing is ever removed, so a visible entry stays dispatchable forever

pub mod registry;
pub mod router;

use std::sync::{Arc, Mutex};

use crate::http::request::HandlerRequest;
use crate::http::response::ResponseBuffer;
use crate::observability::metrics;
use crate::pipeline::error::RegisterError;

pub use registry::{Registry, RegistryEntry};
pub use router::HandlerTable;

/// Something that can answer a dispatched request.
///
/// `serve` is synchronous and may block; callers run it on a blocking thread.
pub trait RouteHandler: Send + Sync {
    fn serve(&self, request: &HandlerRequest, response: &mut ResponseBuffer);
}

/// Handler table and program registry, kept consistent with each other.
#[derive(Default)]
pub struct LiveRoutes {
    commit: Mutex<()>,
    table: HandlerTable,
    registry: Registry,
}

impl LiveRoutes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `path` dispatchable to `handler` and list it with `source`.
    ///
    /// Either both structures gain the path or neither does.
    pub fn register(
        &self,
        path: &str,
        source: String,
        handler: Arc<dyn RouteHandler>,
    ) -> Result<(), RegisterError> {
        let _commit = self.commit.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        if self.table.contains(path) {
            return Err(RegisterError::Duplicate(path.to_string()));
        }
        // Handler first: the registry entry must never be visible before it is dispatchable.
        self.table.insert(path, handler)?;
        self.registry.insert(path, source)?;

        metrics::set_handlers_registered(self.table.len());
        tracing::info!(path = %path, "Route registered");
        Ok(())
    }

    pub fn handler(&self, path: &str) -> Option<Arc<dyn RouteHandler>> {
        self.table.get(path)
    }

    pub fn snapshot(&self) -> Vec<RegistryEntry> {
        self.registry.snapshot()
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }
}
