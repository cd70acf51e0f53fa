use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

use crate::Result;
use crate::api;
use crate::config::DashboardConfig;

pub async fn run(config: DashboardConfig) -> Result<()> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let port = config.server.port;
    let app = Router::new()
        .nest("/api", api::router(Arc::new(config)))
        .fallback_service(ServeDir::new("frontend/dist"))
        .layer(cors);

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Dashboard server running at http://localhost:{port}");
    axum::serve(listener, app).await?;
    Ok(())
}
