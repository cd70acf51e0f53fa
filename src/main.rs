use anyhow::Result;
use inkboard::{DashboardConfig, web};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = DashboardConfig::load()?;
    tracing::info!(version = inkboard::VERSION, "Starting dashboard server");

    web::run(config).await?;
    Ok(())
}
