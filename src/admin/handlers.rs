use axum::{
    extract::State,
    Json,
};
use serde::Serialize;
use crate::http::server::AppState;
use crate::routing::RegistryEntry;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub handlers: usize,
    pub builds_in_flight: usize,
    pub retained_workspaces: usize,
}

pub async fn get_status(
    State(state): State<AppState>,
) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        handlers: state.routes.len(),
        builds_in_flight: state.builder.in_flight(),
        retained_workspaces: state.builder.retained_workspaces(),
    })
}

pub async fn get_handlers(
    State(state): State<AppState>,
) -> Json<Vec<RegistryEntry>> {
    Json(state.routes.snapshot())
}
