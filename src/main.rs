//! Math Solver - photo of a math problem in, worked solution out.

mod config;
mod controller;
mod error;
mod ocr;
mod openai;
mod server;
mod solver;

use config::AppConfig;
use controller::Pipeline;
use openai::OpenAiClient;
use solver::MathAgent;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "math_solver=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    info!("Configuration loaded: {:?}", config);

    // Adapters are built once, before the first request can arrive
    let http = reqwest::Client::new();
    let ocr = ocr::provider_from_config(&config.ocr, http.clone())?;
    info!("OCR provider initialized: {}", ocr.name());

    let solver = MathAgent::new(OpenAiClient::new(&config.openai, http));
    info!("Math solver initialized: model={}", config.openai.model);

    let app = server::router(Pipeline::new(ocr, Arc::new(solver)));

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Math Solver API running on http://{}", addr);
    info!("Health check: GET http://localhost:{}/health", config.port);
    info!("Math solver: POST http://localhost:{}/solve-math", config.port);
    axum::serve(listener, app).await?;

    Ok(())
}
