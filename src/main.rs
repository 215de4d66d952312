mod clicks;
mod config;
mod model;
mod routes;
mod service;
mod store;
mod utils;

use axum::routing::{get, post};
use axum::{serve, Router};
use config::Config;
use dotenvy::dotenv;
use routes::{
    get_stats, get_url_info, health, method_not_allowed, not_found, redirect, shorten_url, AppState,
};
use service::Shortener;
use std::sync::Arc;
use store::Storage;
use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const DEFAULT_TRACING_LEVEL: &str = "url_shortener=debug,tower_http=info";

#[tokio::main]
async fn main() {
    _ = dotenv();
    configure_tracing();
    let config = Config::load().expect("Loading configuration failed");
    let storage = Arc::new(open_storage(&config));
    let (recorder, click_worker) = clicks::spawn(storage.clone());
    let shortener = Arc::new(Shortener::new(
        storage.clone(),
        recorder,
        config.base_url.clone(),
        config.short_length,
    ));
    let listener = create_listener(&config.server_address).await;
    tracing::info!("Base URL: {}", config.base_url);
    serve(listener, create_router(shortener))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server failed to start");

    // The router held the last recorder, so the worker drains and stops.
    if let Err(err) = click_worker.await {
        tracing::error!("Click worker failed: {}", err);
    }
    if let Err(err) = storage.flush() {
        tracing::error!("Flushing database failed: {}", err);
    }
    tracing::info!("Shut down");
}

fn configure_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or(DEFAULT_TRACING_LEVEL.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn open_storage(config: &Config) -> Storage {
    let storage = Storage::open(&config.db_path).expect("Opening database failed");
    tracing::info!("Database opened at {}", config.db_path.display());
    storage
}

async fn create_listener(server_address: &str) -> TcpListener {
    let listener = TcpListener::bind(&server_address)
        .await
        .expect("Creating tcp listener failed");
    tracing::info!("Listening on address: {}", server_address);
    listener
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Listening for shutdown signal failed: {}", err);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

fn create_router(shortener: AppState) -> Router {
    Router::new()
        .route("/api/shorten", post(shorten_url).fallback(method_not_allowed))
        .route("/api/info/:short", get(get_url_info).fallback(method_not_allowed))
        .route("/admin/stats", get(get_stats).fallback(method_not_allowed))
        .route("/health", get(health).fallback(method_not_allowed))
        .route("/:short", get(redirect).fallback(method_not_allowed))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .with_state(shortener)
}
