use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use watcher::{Watcher, default_update_callback};

mod routes;
mod settings;

use routes::AppState;
use settings::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting token sync node");

    let settings = Settings::load()?;

    let adapter = redis_adapter::connect(&settings.redis, Some(settings.serializer.build())).await?;
    if adapter.ping().await? {
        info!("Store connection successful");
    } else {
        anyhow::bail!("Store did not answer PING");
    }

    // Replay peer mutations on the local store
    let watcher = Watcher::new(
        settings.watcher.clone(),
        Some(default_update_callback(adapter.clone())),
    )
    .await?;
    let watcher = Arc::new(watcher);

    let app = routes::create_router(AppState {
        adapter,
        watcher: Some(watcher.clone()),
    });

    let listener = TcpListener::bind(&settings.http.bind).await?;
    info!("Token sync node listening on {}", settings.http.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down token sync node");
    watcher.close().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
}
