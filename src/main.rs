use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use framequiz::{
    build_router, catalog::CatalogConfig, config::ServerConfig, state::GameEngine,
    storage::FileStore,
};

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "framequiz=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting framequiz...");

    let server_config = ServerConfig::from_env();
    let catalog_config = CatalogConfig::from_env();

    let catalog = match catalog_config.build_provider() {
        Ok(catalog) => catalog,
        Err(e) => {
            tracing::error!("Failed to initialize catalog: {}", e);
            std::process::exit(1);
        }
    };
    let prober = match catalog_config.build_prober() {
        Ok(prober) => prober,
        Err(e) => {
            tracing::error!("Failed to initialize image prober: {}", e);
            std::process::exit(1);
        }
    };
    let store = match FileStore::new(&server_config.data_dir) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::error!(
                "Failed to open data directory {}: {}",
                server_config.data_dir.display(),
                e
            );
            std::process::exit(1);
        }
    };

    let engine = Arc::new(GameEngine::new(
        catalog,
        prober,
        store,
        server_config.engine_config(),
    ));
    if let Err(e) = engine.activate().await {
        tracing::warn!("Engine did not start a round: {}", e);
    }

    let app = build_router(engine).fallback_service(ServeDir::new(&server_config.static_dir));

    let addr = SocketAddr::from(([0, 0, 0, 0], server_config.port));
    tracing::info!("Listening on http://{}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
    }
}
