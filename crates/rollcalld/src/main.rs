use anyhow::{Context, Result};
use rollcall_core::{load_gallery, EmbeddingProvider, OnnxEmbeddingProvider};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod config;
mod engine;
mod notifier;
mod routes;
#[cfg(test)]
mod testing;

use config::Config;
use notifier::{Notifier, RetryPolicy};
use routes::{AppState, Settings};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!("rollcalld starting");

    let config = Config::from_env();

    // Fail fast: without models no request can be served.
    let mut provider =
        OnnxEmbeddingProvider::load(&config.scrfd_model_path(), &config.arcface_model_path())
            .with_context(|| format!("loading face models from {}", config.model_dir.display()))?;

    let gallery = load_gallery(&config.gallery_dir, &mut provider);
    if gallery.is_empty() {
        tracing::warn!(dir = %config.gallery_dir.display(), "gallery is empty; every query will be not_found");
    }

    let metric = provider.metric();
    let engine = engine::spawn_engine(provider)?;

    let notifier = Notifier::new(
        config.notify_url.clone(),
        RetryPolicy {
            max_attempts: config.notify_max_attempts,
            timeout: config.notify_timeout,
            retry_delay: config.notify_retry_delay,
        },
    )
    .context("building attendance client")?;

    let state = Arc::new(AppState {
        gallery: Arc::new(gallery),
        engine,
        notifier,
        settings: Settings {
            tolerance: config.tolerance,
            min_confidence: config.min_confidence,
            match_policy: config.match_policy,
            metric,
            max_upload_bytes: config.max_upload_bytes,
        },
    });

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    tracing::info!(
        addr = %addr,
        faces = state.gallery.len(),
        tolerance = config.tolerance,
        min_confidence = config.min_confidence,
        policy = %config.match_policy,
        metric = %metric,
        notify_url = %config.notify_url,
        "rollcalld ready"
    );

    axum::serve(listener, routes::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("rollcalld shutting down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
