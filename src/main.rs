//! Face Attribute Inference Service
//!
//! Loads two in-process convolutional models (age regression, gender
//! classification) and serves predictions over a REST API.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tokio::net::TcpListener;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use facesight::api::{create_rest_router, AppState};
use facesight::config::Config;
use facesight::engine::{
    ConvNetFactory, InferenceEngine, ModelLoader, ModelRegistry, TensorArena,
};
use facesight::service::AttributeService;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    info!(
        "Starting Face Attribute Inference Service v{}",
        env!("CARGO_PKG_VERSION")
    );

    // Load configuration
    let config = Config::load(Config::default_path()).unwrap_or_else(|e| {
        info!("Using default config ({})", e);
        Config::default()
    });

    info!("Configuration loaded:");
    info!("  REST port: {}", config.server.rest_port);
    info!("  Upload limit: {} bytes", config.limits.max_upload_bytes);
    info!(
        "  Age calibration: raw * {} + {}",
        config.calibration.age_scale, config.calibration.age_offset
    );

    // Wire up the pipeline: arena -> registry -> loader -> engine.
    let arena = TensorArena::new();
    let registry = Arc::new(ModelRegistry::new());
    let loader = ModelLoader::new(
        Arc::clone(&registry),
        Arc::clone(&arena),
        Arc::new(ConvNetFactory),
    );
    let engine = Arc::new(InferenceEngine::new(
        registry,
        arena,
        config.calibration.clone(),
    ));

    // Start loading and log checkpoints as they are published. The server
    // accepts requests immediately; predictions return 503 until Ready.
    loader.start();
    let mut progress = loader.subscribe();
    tokio::spawn(async move {
        loop {
            let state = progress.borrow().clone();
            if let Some(err) = &state.error {
                warn!("Model loading failed: {}", err);
                break;
            }
            if state.is_loaded {
                info!("Models ready (progress {}%)", state.progress);
                break;
            }
            info!("Model loading progress: {}%", state.progress);
            if progress.changed().await.is_err() {
                break;
            }
        }
    });

    let service = Arc::new(AttributeService::new(
        engine,
        loader,
        config.limits.clone(),
    ));
    let state = Arc::new(AppState {
        service,
        start_time: Instant::now(),
    });

    let app = create_rest_router(state);
    let addr = format!("0.0.0.0:{}", config.server.rest_port);
    info!("REST API listening on {}", addr);

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
