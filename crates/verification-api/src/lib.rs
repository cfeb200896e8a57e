//! Verification API
//!
//! HTTP front for zero-knowledge identity verification. Proofs submitted by
//! the companion app are forwarded to an external verifier; the verdict is
//! then filtered through the user's disclosure preferences before being
//! returned.
//!
//! ## Endpoints
//!
//! - `POST /api/verify` - Verify a proof and return the disclosed attributes
//! - `GET /api/app` - Descriptor for building the verification QR code
//! - `GET /api/preferences/{user_id}` - Read stored disclosure preferences
//! - `PUT /api/preferences/{user_id}` - Save disclosure preferences
//! - `GET /health` - Health check

pub mod config;
pub mod handlers;
pub mod store;
pub mod verifier;

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use config::{Config, StoreBackend};
use store::{MemoryPreferenceStore, PreferenceStore, RedisPreferenceStore, StaticPreferenceStore};
use verifier::{RemoteVerifier, Verifier};

/// Application state shared across handlers
pub struct AppState {
    pub config: Config,

    /// Proof verifier, constructed once per process
    pub verifier: Arc<dyn Verifier>,

    /// Disclosure preference lookup
    pub store: Arc<dyn PreferenceStore>,
}

impl AppState {
    /// Create new application state
    pub fn new(
        config: Config,
        verifier: Arc<dyn Verifier>,
        store: Arc<dyn PreferenceStore>,
    ) -> Self {
        Self {
            config,
            verifier,
            store,
        }
    }

    /// Build the verifier and preference store described by the configuration
    pub async fn from_config(config: Config) -> Result<Self> {
        let verifier = Arc::new(RemoteVerifier::new(
            config.verifier_url.clone(),
            config.scope.clone(),
            config.mock_passport,
        ));

        let store: Arc<dyn PreferenceStore> = match &config.store {
            StoreBackend::Static => {
                Arc::new(StaticPreferenceStore::new(config.default_preferences.clone()))
            }
            StoreBackend::Memory => Arc::new(MemoryPreferenceStore::new()),
            StoreBackend::Redis(url) => Arc::new(RedisPreferenceStore::new(url).await?),
        };

        Ok(Self::new(config, verifier, store))
    }
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    let state = Arc::new(state);

    Router::new()
        // Health check
        .route("/health", get(handlers::health_handler))
        // Verification
        .route("/api/verify", post(handlers::verify_handler))
        .route("/api/app", get(handlers::app_handler))
        // Preference management
        .route(
            "/api/preferences/{user_id}",
            get(handlers::get_preferences_handler).put(handlers::put_preferences_handler),
        )
        // Middleware
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
