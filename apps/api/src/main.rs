mod analysis;
mod config;
mod errors;
mod extract;
mod llm_client;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::llm_client::{ChatModel, LlmClient};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on malformed env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.log_level))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Resume Analyzer API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize LLM client once; handlers see `None` when no credential is set
    let model: Option<Arc<dyn ChatModel>> = match &config.groq_api_key {
        Some(api_key) => {
            let client = LlmClient::new(api_key.clone(), &config.llm_base_url, config.llm_timeout)?;
            info!(
                "LLM client initialized (base: {}, analysis model: {}, rewrite model: {})",
                config.llm_base_url, config.analysis.model, config.rewrite.model
            );
            Some(Arc::new(client) as Arc<dyn ChatModel>)
        }
        None => {
            warn!("GROQ_API_KEY is not set; LLM endpoints will return 503");
            None
        }
    };

    info!(
        "Resume budget: {} chars, upload limit: {} bytes",
        config.max_resume_chars, config.max_upload_bytes
    );

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;

    // Build router
    let app = build_router(AppState::new(config, model))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
