use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use extranet_recorder::api::{routes::create_router, state::AppState};
use extranet_recorder::browser::ChromeLauncher;
use extranet_recorder::config::Config;
use extranet_recorder::RecordingEngine;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env();
    tracing::info!("Recordings stored in {}", config.recordings_dir.display());

    let engine = RecordingEngine::new(config.clone(), Arc::new(ChromeLauncher::default()));
    let state = Arc::new(AppState::new(Arc::new(engine)));
    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Extranet recorder starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
