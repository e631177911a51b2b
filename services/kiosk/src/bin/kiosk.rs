//! services/kiosk/src/bin/kiosk.rs

use axum::{
    http::{header::CONTENT_TYPE, Method},
    routing::get,
    Router,
};
use kiosk_lib::{
    adapters::{BackendClient, EncryptedFileStore, SqliteCredentialStore},
    config::{Config, CredentialBackend},
    error::KioskError,
    web::{
        clear_passport_handler, get_passport_handler, health_handler, rest::ApiDoc,
        state::AppState, ws_handler,
    },
};
use sitepass_core::{CheckinPorts, CredentialStore};
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), KioskError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting kiosk...");

    // --- 2. Open the Credential Store ---
    let store = open_credential_store(&config.credential_backend).await?;

    // --- 3. Initialize the Backend Adapter ---
    let backend = Arc::new(BackendClient::new(
        config.api_base_url.clone(),
        config.request_timeout,
    )?);
    info!(
        "Backend at {} (timeout {}s).",
        config.api_base_url,
        config.request_timeout.as_secs()
    );

    // --- 4. Build the Shared AppState ---
    let ports = CheckinPorts {
        sites: backend.clone(),
        checkins: backend.clone(),
        ocr: backend.clone(),
        passports: backend,
        store,
    };
    let app_state = Arc::new(AppState::new(config.clone(), ports));

    // --- 5. Create the Web Router ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE]);

    let api_router = Router::new()
        .route("/ws", get(ws_handler))
        .route(
            "/passport",
            get(get_passport_handler).delete(clear_passport_handler),
        )
        .route("/health", get(health_handler))
        .layer(cors)
        .with_state(app_state);

    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Shutdown requested."),
                Err(e) => error!("Failed to listen for the shutdown signal: {}", e),
            }
            shutdown.cancel();
        }
    });

    info!("Starting kiosk surface on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("Kiosk stopped.");
    Ok(())
}

/// Picks the credential store for this device from configuration.
async fn open_credential_store(
    backend: &CredentialBackend,
) -> Result<Arc<dyn CredentialStore>, KioskError> {
    match backend {
        CredentialBackend::Standard { database_url } => {
            info!("Using the standard credential store.");
            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .connect(database_url)
                .await?;
            let store = SqliteCredentialStore::new(pool);
            info!("Running credential database migrations...");
            store.run_migrations().await?;
            Ok(Arc::new(store))
        }
        CredentialBackend::Secure { path, key } => {
            info!("Using the secure credential store at {}.", path.display());
            Ok(Arc::new(EncryptedFileStore::new(path.clone(), key)))
        }
    }
}
