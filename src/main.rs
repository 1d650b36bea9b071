// src/main.rs
// Process entrypoint: load .env, initialize tracing and the Prometheus
// recorder, build the dependency graph, and serve the HTTP API. Grounded on
// the teacher's `proxy::server::ProxyServer::run` (bind + `axum::serve`) and
// `mira-chat`'s tracing_subscriber setup.

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use atelier_chat::api::api_router;
use atelier_chat::metrics::init_metrics;
use atelier_chat::state::AppState;
use atelier_chat::CONFIG;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    init_metrics();

    let state = AppState::new()?;
    let app = api_router(state);

    let addr = format!("{}:{}", CONFIG.server.host, CONFIG.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("atelier-chat listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
