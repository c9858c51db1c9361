//! Heart Risk Server
//!
//! Serves a pre-trained heart disease classifier over HTTP together with a
//! per-prediction explanation plot.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    HEART RISK SERVER                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐  ┌───────────────────────────────────────┐   │
//! │  │  API      │  │  Predictor (blocking pool)            │   │
//! │  │  (Axum)   │─▶│  features → classifier → TreeSHAP     │   │
//! │  │           │  │           → summary plot → base64     │   │
//! │  └─────┬─────┘  └───────────────────┬───────────────────┘   │
//! │        │                            ▼                       │
//! │  ┌─────▼─────┐              ┌───────────────┐               │
//! │  │  /assets  │              │ model artifact│ (read once)   │
//! │  └───────────┘              └───────────────┘               │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod constants;
mod error;
mod handlers;
mod logic;
mod models;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    routing::{get, post},
};
use tokio::sync::Semaphore;
use tower_http::{
    cors::{CorsLayer, Any},
    trace::TraceLayer,
    compression::CompressionLayer,
    services::ServeDir,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use crate::constants::{APP_NAME, APP_VERSION, DEFAULT_LOG_FILTER};
use crate::logic::Predictor;

pub use error::{AppError, AppResult};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before anything reads the environment
    dotenvy::dotenv().ok();

    let config = config::Config::from_env();

    // Initialize logging; JSON lines in production
    let fmt_layer = if config.is_production() {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()))
        .with(fmt_layer)
        .init();

    tracing::info!("{} v{} starting...", APP_NAME, APP_VERSION);
    tracing::info!("Environment: {}", config.environment);
    tracing::info!(
        "Missing features: {:?}, max concurrent predictions: {}",
        config.missing_features,
        config.max_concurrent_predictions
    );

    // The classifier and its explainer are built once and never reloaded
    let predictor = Predictor::load(&config.model_path, config.predictor_options())
        .with_context(|| format!("Failed to load model artifact {}", config.model_path.display()))?;

    if !config.assets_dir.is_dir() {
        tracing::warn!("Assets directory {} does not exist", config.assets_dir.display());
    }

    let state = AppState::new(config.clone(), predictor);
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("🚀 Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: config::Config,
    pub predictor: Arc<Predictor>,
    pub limiter: Arc<Semaphore>,
}

impl AppState {
    pub fn new(config: config::Config, predictor: Predictor) -> Self {
        Self {
            limiter: Arc::new(Semaphore::new(config.max_concurrent_predictions)),
            predictor: Arc::new(predictor),
            config,
        }
    }
}

/// Create the main router with all routes
fn create_router(state: AppState) -> Router {
    let assets = ServeDir::new(&state.config.assets_dir);

    Router::new()
        .route("/health", get(handlers::health::check))
        .route("/api/predict", post(handlers::predict::predict))
        .route("/api/model", get(handlers::model::status))
        .nest_service("/assets", assets)
        .fallback(handlers::not_found)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}
