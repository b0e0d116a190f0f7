use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{extract::State, http::StatusCode, routing::get, Router};
use bot_core::{serve, ActionRouter};
use catalog::MealDbCatalog;
use storage::FavoritesStore;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod telegram;

use config::{load_settings, normalize_database_url};
use telegram::TelegramTransport;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = load_settings()?;
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let token = settings.require_bot_token()?;

    let database_url = normalize_database_url(&settings.database_url);
    let store = FavoritesStore::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open favorites database; verify parent directory exists and permissions are correct"
        );
        error
    })?;

    let catalog = MealDbCatalog::new(&settings.catalog_url, settings.catalog_timeout())?;
    let router = ActionRouter::new(store.clone(), Arc::new(catalog))
        .with_greetings(settings.greetings.clone());
    let transport = TelegramTransport::new(
        &settings.telegram_api_url,
        token,
        settings.poll_timeout(),
    )?;

    let addr: SocketAddr = settings
        .health_bind
        .parse()
        .with_context(|| format!("invalid health_bind '{}'", settings.health_bind))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind health endpoint on {addr}"))?;
    info!(%addr, "health endpoint listening");
    let health = build_router(store);
    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, health).await {
            error!(%error, "health endpoint stopped");
        }
    });

    info!(catalog_url = %settings.catalog_url, "recipe bot polling for updates");
    serve(Arc::new(transport), Arc::new(router), shutdown_signal()).await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(%error, "failed to listen for ctrl-c; running until killed");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

fn build_router(store: FavoritesStore) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .with_state(store)
}

async fn healthz(State(store): State<FavoritesStore>) -> (StatusCode, &'static str) {
    match store.health_check().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(error) => {
            error!(%error, "health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
        }
    }
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
