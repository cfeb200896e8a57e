//! Verification API Service
//!
//! REST service that verifies identity proofs and applies disclosure preferences.

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use verification_api::{config::Config, create_router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "verification_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Verification API Service");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    info!("Scope: {}", config.scope);
    info!("Verifier URL: {}", config.verifier_url);
    info!("Preference store: {:?}", config.store);
    if config.mock_passport {
        info!("Mock passports are accepted");
    }

    let address = config.api_address();

    // Create application state
    let state = AppState::from_config(config)
        .await
        .context("Failed to initialize application state")?;

    // Create router
    let app = create_router(state);

    // Start server
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind to {}", address))?;

    info!("Verification API listening on http://{}", address);

    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}
