use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::Json,
    routing::get,
};
use chrono::Utc;

use crate::config::DashboardConfig;
use crate::dashboard;
use crate::models::Dashboard;

pub fn router(config: Arc<DashboardConfig>) -> Router {
    Router::new()
        .route("/dashboard", get(get_dashboard))
        .route("/health", get(health))
        .with_state(config)
}

/// The single render entry point: one request, one fresh refresh cycle.
async fn get_dashboard(State(config): State<Arc<DashboardConfig>>) -> Json<Dashboard> {
    Json(dashboard::assemble(&config, Utc::now()).await)
}

async fn health() -> StatusCode {
    StatusCode::OK
}
