use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use facegate_assets::AssetLibrary;
use facegate_embed::EmbedClient;

mod config;
mod engine;
mod routes;

use config::Config;
use engine::FaceEngine;
use routes::{AppState, PhotoFetcher};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("facegated starting");
    let config = Config::from_env();

    let oracle = EmbedClient::new(
        config.embed_url.clone(),
        config.embed_api_key.clone(),
        Duration::from_secs(config.oracle_timeout_secs),
    )?;
    let assets = AssetLibrary::new(
        config.asset_base_url.clone(),
        config.asset_api_key.clone(),
        config.asset_api_secret.clone(),
        config.max_assets,
        Duration::from_secs(config.fetch_timeout_secs),
    )?;

    let engine = Arc::new(FaceEngine::new(
        Arc::new(oracle),
        Arc::new(assets),
        config.identify_tolerance,
        config.verify_tolerance,
        config.asset_folder.clone(),
        Duration::from_secs(config.oracle_timeout_secs),
    ));

    // Initial gallery load. The daemon still serves (with an empty
    // gallery) when the asset library is unreachable at startup.
    match engine.refresh_gallery().await {
        Ok(count) => tracing::info!(count, "initial gallery loaded"),
        Err(err) => {
            tracing::warn!(error = %err, "initial gallery load failed; starting with empty gallery")
        }
    }

    let state = AppState {
        engine,
        fetcher: PhotoFetcher::new(Duration::from_secs(config.fetch_timeout_secs))?,
    };
    let app = routes::router(
        state,
        routes::cors_layer(&config.allowed_origins),
        config.max_body_bytes,
    );

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "facegated ready");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("facegated shutting down");

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
