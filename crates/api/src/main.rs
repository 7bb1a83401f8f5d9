use std::sync::Arc;

use anyhow::Context;

use procureflow_api::app::{build_app, services::AppServices};
use procureflow_api::config::ApiConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    procureflow_observability::init();

    let config = ApiConfig::from_env()?;
    let matrix = config.load_matrix()?;
    let services = Arc::new(AppServices::in_memory(matrix).context("failed to start bus worker")?);

    let app = build_app(services.clone());

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown requested");
        })
        .await?;

    services.shutdown();
    Ok(())
}
