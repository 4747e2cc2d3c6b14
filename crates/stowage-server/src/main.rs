mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use stowage_api::auth::AppStateInner;
use stowage_blobstore::BlobStore;
use stowage_db::Database;

use crate::config::Config;

/// Request body ceiling. Plan quotas are enforced per file while streaming;
/// this is only the transport-level backstop.
const MAX_REQUEST_BODY: usize = 4 * 1024 * 1024 * 1024; // 4 GB

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stowage=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    let db = Database::open(&config.db_path)?;
    let blobs = BlobStore::open(config.blob_dir.clone()).await?;

    let state = Arc::new(AppStateInner {
        db,
        blobs,
        secret: config.secret.clone(),
        quotas: config.quotas,
    });

    let app = stowage_api::router(state)
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Stowage listening on {}", addr);
    info!(
        "Free plan upload limit: {} bytes; Premium: {}",
        config.quotas.free,
        match config.quotas.premium {
            Some(limit) => format!("{limit} bytes"),
            None => "unlimited".into(),
        }
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
