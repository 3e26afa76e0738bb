//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, limits, timeout, request ID)
//! - Bind server to listener
//! - Drive submissions through the pipeline
//! - Dispatch requests for registered routes to their loaded handlers
//! - Render the listing view for everything else
//! - Apply build-setting reloads while running

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, State},
    http::{header, Request, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{any, post},
    Router,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin::setup_admin_router;
use crate::config::AppConfig;
use crate::http::listing::{ListingTemplate, TemplateError};
use crate::http::request::{request_id, HandlerRequest, MakeRequestUuidV4, ProgramSource, X_REQUEST_ID};
use crate::http::response::ResponseBuffer;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::pipeline::{Builder, Pipeline, PipelineError};
use crate::routing::{LiveRoutes, RouteHandler};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub routes: Arc<LiveRoutes>,
    pub builder: Arc<Builder>,
    pub listing: Arc<ListingTemplate>,
    pub config: Arc<AppConfig>,
}

/// HTTP server for submissions, listing and dynamic routes.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    ///
    /// Fails if the listing template cannot be loaded.
    pub fn new(config: AppConfig, shutdown: &Shutdown) -> Result<Self, TemplateError> {
        let listing = Arc::new(ListingTemplate::load(config.listing.template_path.as_deref())?);
        let builder = Arc::new(Builder::new(config.build.clone(), shutdown.clone()));
        let routes = Arc::new(LiveRoutes::new());
        let pipeline = Arc::new(Pipeline::new(builder.clone(), routes.clone()));

        let state = AppState {
            pipeline,
            routes,
            builder,
            listing,
            config: Arc::new(config),
        };

        let router = Self::build_router(state.clone());
        Ok(Self { router, state })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: AppState) -> Router {
        let security = state.config.security.clone();

        let mut router = Router::new()
            .route("/addhandler", post(add_handler))
            .route("/favicon.ico", any(|| async { StatusCode::NOT_FOUND }))
            .fallback(dispatch_or_list)
            .with_state(state.clone());

        if state.config.admin.enabled {
            router = router.merge(setup_admin_router(state));
        }

        router
            .layer(DefaultBodyLimit::max(security.max_body_size))
            .layer(RequestBodyLimitLayer::new(security.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(security.request_timeout_secs)))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuidV4))
    }

    /// Live routes shared with the pipeline.
    pub fn routes(&self) -> Arc<LiveRoutes> {
        self.state.routes.clone()
    }

    /// The assembled router, for serving without `run` (e.g. in-process tests).
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// Config updates replace the build settings; the shutdown receiver stops
    /// accepting and lets in-flight requests finish.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<AppConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            "HTTP server starting"
        );

        let builder = self.state.builder.clone();
        let reloader = tokio::spawn(async move {
            while let Some(new_config) = config_updates.recv().await {
                builder.update_settings(new_config.build);
                tracing::info!("Build settings reloaded");
            }
        });

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server shutting down");
            })
            .await?;

        reloader.abort();
        self.state.builder.purge_retained();

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// `POST /addhandler`: build, load and register the submitted program.
async fn add_handler(
    State(state): State<AppState>,
    ProgramSource(program): ProgramSource,
) -> Result<Response, PipelineError> {
    tracing::info!(bytes = program.len(), "Submission received");

    let route = state.pipeline.handle_submission(program).await.map_err(|e| {
        tracing::warn!(error = %e, "Submission failed");
        e
    })?;

    Ok((StatusCode::FOUND, [(header::LOCATION, route)]).into_response())
}

/// Fallback: registered routes dispatch, everything else shows the listing.
async fn dispatch_or_list(State(state): State<AppState>, request: Request<Body>) -> Response {
    let path = request.uri().path().to_string();
    match state.routes.handler(&path) {
        Some(handler) => dispatch(&state, handler, request).await,
        None => render_listing(&state),
    }
}

async fn dispatch(state: &AppState, handler: Arc<dyn RouteHandler>, request: Request<Body>) -> Response {
    let started = Instant::now();
    let request_id = request_id(&request).to_string();

    let owned = match HandlerRequest::from_request(request, state.config.security.max_body_size).await {
        Ok(owned) => owned,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Failed to read request body");
            metrics::record_dispatch(StatusCode::PAYLOAD_TOO_LARGE.as_u16(), started);
            return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
        }
    };
    let path = owned.path.clone();

    let served = tokio::task::spawn_blocking(move || {
        let mut response = ResponseBuffer::new();
        handler.serve(&owned, &mut response);
        response
    })
    .await;

    match served {
        Ok(response) => {
            tracing::debug!(
                request_id = %request_id,
                path = %path,
                status = %response.status(),
                "Dispatched to loaded handler"
            );
            metrics::record_dispatch(response.status().as_u16(), started);
            response.into_response()
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, path = %path, error = %e, "Handler task failed");
            metrics::record_dispatch(500, started);
            (StatusCode::INTERNAL_SERVER_ERROR, "Handler failed").into_response()
        }
    }
}

fn render_listing(state: &AppState) -> Response {
    // Snapshot first; the registry lock is already released when rendering starts.
    let entries = state.routes.snapshot();
    Html(state.listing.render(&entries)).into_response()
}
