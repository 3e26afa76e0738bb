//! Submission coordinator.
//!
//! Drives one submission through `Received → Built → Loaded → Registered`.
//! There are no rollback transitions: a failure while building or loading
//! returns immediately and leaves the live routes untouched.

use std::sync::Arc;
use std::time::Instant;

use crate::pipeline::builder::{Artifact, Builder};
use crate::pipeline::error::{PipelineError, RegisterError};
use crate::pipeline::loader;
use crate::routing::{LiveRoutes, RouteHandler};

pub struct Pipeline {
    builder: Arc<Builder>,
    routes: Arc<LiveRoutes>,
}

impl Pipeline {
    pub fn new(builder: Arc<Builder>, routes: Arc<LiveRoutes>) -> Self {
        Self { builder, routes }
    }

    /// Build, load and register `source`, returning the new route path.
    pub async fn handle_submission(&self, source: String) -> Result<String, PipelineError> {
        let started = Instant::now();

        let artifact = self.builder.build(source.as_bytes()).await?;

        let path = artifact.path().to_path_buf();
        let handler = tokio::task::spawn_blocking(move || loader::load(&path)).await??;

        let route = self.commit(artifact, source, Arc::new(handler))?;

        tracing::info!(
            route = %route,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Submission registered"
        );
        Ok(route)
    }

    /// Register the artifact's route, then keep its workspace.
    ///
    /// A rejected registration drops the artifact, so its workspace goes the
    /// way of any other failed submission.
    fn commit(
        &self,
        artifact: Artifact,
        source: String,
        handler: Arc<dyn RouteHandler>,
    ) -> Result<String, RegisterError> {
        let route = artifact.route().to_string();
        self.routes.register(&route, source, handler)?;
        self.builder.retain(artifact);
        Ok(route)
    }
}
