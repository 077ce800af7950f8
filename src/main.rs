use axum::{routing::get, Router};
use secrecy::ExposeSecret;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use easyvol::api::middleware::session::{create_session_layer, AppState};
use easyvol::config::Config;
use easyvol::db;
use easyvol::sanctions::PgSanctionStore;
use easyvol::services::access::PgAccessControl;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "easyvol=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting EasyVol server...");

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!(base_url = %config.base_url, "Configuration loaded successfully");

    // Create database pool
    let pool = db::create_pool(
        config.database_url.expose_secret(),
        config.database_max_connections,
    )
    .await?;
    tracing::info!("Database pool created");

    // Run migrations
    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    // Create session layer
    let session_layer =
        create_session_layer(pool.clone(), config.secure_cookies, config.session_ttl_hours)
            .await?;
    tracing::info!("Session layer initialized");

    // Build application state
    let state = AppState {
        pool: pool.clone(),
        sanctions: Arc::new(PgSanctionStore::new(pool.clone())),
        access: Arc::new(PgAccessControl::new(pool.clone())),
    };

    // Build router
    let app = Router::new()
        .route("/health", get(easyvol::api::health::health_check))
        .merge(easyvol::api::auth::router())
        .merge(easyvol::api::sanctions::router())
        .layer(session_layer)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let host: IpAddr = config.host.parse()?;
    let addr = SocketAddr::from((host, config.port));
    tracing::info!("Listening on {}", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install CTRL+C signal handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, cleaning up...");
}
