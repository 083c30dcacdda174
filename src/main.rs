use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use newswire::config::Config;
use newswire::routes::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "newswire=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path =
        std::env::var("NEWSWIRE_CONFIG").unwrap_or_else(|_| "sources.toml".to_string());
    let mut config = Config::load(&config_path)?;
    info!(
        "Loaded {} sources from {} ({} enabled)",
        config.sources.len(),
        config_path,
        config.active_sources().len()
    );

    // Environment switch between direct and proxied fetching
    if let Ok(base) = std::env::var("NEWSWIRE_PROXY_BASE") {
        info!("Routing feed fetches through proxy at {}", base);
        config.proxy_base = Some(base);
    }

    // Build app state and router
    let state = Arc::new(AppState::new(&config));
    let app = routes::router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
    info!("Server starting on http://localhost:3000");

    axum::serve(listener, app).await?;

    Ok(())
}
