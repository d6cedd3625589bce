use hrsync::config::AppConfig;
use hrsync::context::AppContext;
use hrsync::dispatch::http::router;
use hrsync::state::StateStore;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .init();

    let config = AppConfig::from_env()?;
    let store = StateStore::new(config.state_bucket.clone())?;
    let ctx = Arc::new(AppContext::new(config, store));

    let port: u16 = std::env::var("PORT").ok().and_then(|p| p.parse().ok()).unwrap_or(8080);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(%addr, "hrsync listening");
    axum::serve(listener, router(ctx)).await?;
    Ok(())
}
