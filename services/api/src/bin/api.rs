//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        BroadcastNotifier, DbAdapter, FileKeyValueStore, LopdfExtractionAdapter,
        OpenAiOutlineAdapter, SimulatedExportAdapter,
    },
    config::{Config, ConfigError, StorageBackend},
    error::ApiError,
    web::{self, rest::ApiDoc, state::AppState},
};
use async_openai::{config::OpenAIConfig, Client};
use axum::http::{
    header::{ACCEPT, CONTENT_TYPE},
    HeaderValue, Method,
};
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use textbook_core::{KeyValueStore, ProjectRepository, ProjectStore, StoreDeps};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Open Project Storage ---
    let kv: Arc<dyn KeyValueStore> = match &config.storage {
        StorageBackend::Postgres { database_url } => {
            info!("Connecting to database...");
            let db_pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(database_url)
                .await?;
            let db_adapter = DbAdapter::new(db_pool);
            info!("Running database migrations...");
            db_adapter.run_migrations().await?;
            info!("Database migrations complete.");
            Arc::new(db_adapter)
        }
        StorageBackend::File { path } => {
            info!("Using file storage at {}", path.display());
            Arc::new(FileKeyValueStore::open(path).await?)
        }
    };

    // --- 3. Initialize Service Adapters ---
    let openai_api_key = config
        .openai_api_key
        .as_ref()
        .ok_or_else(|| ConfigError::MissingVar("OPENAI_API_KEY".to_string()))?;
    let openai_client = Client::with_config(OpenAIConfig::new().with_api_key(openai_api_key));
    let outline_adapter = Arc::new(OpenAiOutlineAdapter::new(
        openai_client,
        config.outline_model.clone(),
    ));
    let notifier = BroadcastNotifier::new();

    // --- 4. Open the Project Store & Build the Shared AppState ---
    let store = ProjectStore::open(StoreDeps {
        repository: ProjectRepository::new(kv, config.storage_key.clone()),
        extractor: Arc::new(LopdfExtractionAdapter::default()),
        generator: outline_adapter,
        exporter: Arc::new(SimulatedExportAdapter::new(config.export_delay)),
        notifier: Arc::new(notifier.clone()),
        upload_limits: config.upload_limits(),
    })
    .await?;

    let app_state = Arc::new(AppState {
        store: Arc::new(store),
        notifier,
        config: config.clone(),
    });

    // --- 5. Create the Web Router ---
    let cors_origin = config.cors_origin.parse::<HeaderValue>().map_err(|e| {
        ConfigError::InvalidValue("CORS_ORIGIN".to_string(), e.to_string())
    })?;
    let cors = CorsLayer::new()
        .allow_origin(cors_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT]);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(web::router(app_state).layer(cors))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        info!("Shutdown signal received");
        signal.cancel();
    });

    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    info!("Server stopped");
    Ok(())
}
