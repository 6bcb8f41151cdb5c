use std::net::SocketAddr;

use anyhow::Context;
use authnz_service::config::{load_scope_file, load_settings};
use authnz_service::metrics::AuthnMetrics;
use authnz_service::{build_router, AppState};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let settings = load_settings();
    let scopes = load_scope_file(&settings.config_path)?;
    let metrics = AuthnMetrics::new().context("Failed to register metrics")?;
    let app = build_router(AppState::new(scopes, metrics));

    let ip: std::net::IpAddr = settings.host.parse()?;
    let addr = SocketAddr::from((ip, settings.port));

    info!(%addr, config = %settings.config_path.display(), "starting authnz-service");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
