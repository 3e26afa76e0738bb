//! Live route table.
//!
//! # Responsibilities
//! - Map a request path to the handler loaded for it
//! - Accept new routes while requests are being dispatched
//!
//! # Design Decisions
//! - Exact path match only; every route is a unique generated path
//! - Sharded concurrent map: lookups never wait on unrelated inserts
//! - Insert-only: a route, once added, is never replaced or removed

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::pipeline::error::RegisterError;
use crate::routing::RouteHandler;

/// Concurrent path → handler table.
#[derive(Default)]
pub struct HandlerTable {
    routes: DashMap<String, Arc<dyn RouteHandler>>,
}

impl HandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a route. Fails if the path is already taken.
    pub fn insert(&self, path: &str, handler: Arc<dyn RouteHandler>) -> Result<(), RegisterError> {
        match self.routes.entry(path.to_string()) {
            Entry::Occupied(_) => Err(RegisterError::Duplicate(path.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(handler);
                Ok(())
            }
        }
    }

    /// Look up the handler for an exact path.
    pub fn get(&self, path: &str) -> Option<Arc<dyn RouteHandler>> {
        self.routes.get(path).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, path: &str) -> bool {
        self.routes.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
