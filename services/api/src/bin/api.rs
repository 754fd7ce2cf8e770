//! services/api/src/bin/api.rs

use api_lib::{
    adapters::PgSampleStore,
    config::Config,
    error::ApiError,
    web::{
        get_view_handler, ingest_reading_handler, list_sessions_handler, set_target_handler,
        state::AppState, ws_handler,
    },
};
use axum::{
    http::{header::{ACCEPT, CONTENT_TYPE}, HeaderValue, Method},
    routing::{get, post, put},
    Router,
};
use bbq_core::{InMemoryStore, SampleStore};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");
    info!("Smoothing time constants: {:?}", config.smoothing);

    // --- 2. Connect the Sample Store ---
    let store: Arc<dyn SampleStore> = match &config.database_url {
        Some(database_url) => {
            info!("Connecting to database...");
            let db_pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(database_url)
                .await?;
            let pg_store = PgSampleStore::new(db_pool);
            info!("Running database migrations...");
            pg_store.run_migrations().await?;
            info!("Database migrations complete.");
            let _listener = pg_store.listen().await?;
            Arc::new(pg_store)
        }
        None => {
            warn!("DATABASE_URL is not set; sessions will be kept in memory only.");
            Arc::new(InMemoryStore::new())
        }
    };

    // --- 3. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        store,
        config: config.clone(),
    });

    let origin = config.cors_origin.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!("Invalid CORS origin '{}': {}", config.cors_origin, e))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT]);

    // --- 4. Create the Web Router ---
    let app = Router::new()
        .route("/api/readings", post(ingest_reading_handler))
        .route("/sessions", get(list_sessions_handler))
        .route("/sessions/{id}", get(get_view_handler))
        .route("/sessions/{id}/target", put(set_target_handler))
        .route("/ws", get(ws_handler))
        .layer(cors)
        .with_state(app_state);

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
