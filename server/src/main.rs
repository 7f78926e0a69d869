use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::{info, warn};

use server::config::ServerConfig;
use server::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Starting voice chat relay...");

    let config = ServerConfig::from_env();
    if config.llm.api_key.is_empty() {
        warn!("OPENAI_API_KEY is not set. Add it to .env before using the app.");
    }
    info!(
        "Server configuration loaded: port={}, model={}, llm_timeout={}s, tts_model={}",
        config.port, config.llm.model, config.llm.timeout_secs, config.speech.model
    );

    let state = AppState::new(config.clone())?;
    let app = build_router(state);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        anyhow::anyhow!("Failed to bind {addr}: {e}. Try a different PORT.")
    })?;

    info!("Server listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}
