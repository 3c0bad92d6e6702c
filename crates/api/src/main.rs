use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use pinmark_core::feedback::{FeedbackStore, InMemoryFeedbackStore};
use pinmark_db::{DbPool, PgFeedbackStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pinmark_api::config::ServerConfig;
use pinmark_api::router::build_app_router;
use pinmark_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pinmark_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        upstream_timeout_secs = config.upstream_timeout_secs,
        "Loaded server configuration"
    );

    // --- Annotation store ---
    let (store, pool) = connect_store(&config).await;

    // --- App state ---
    let state = AppState::new(config.clone(), store).expect("Failed to build upstream HTTP client");

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    if let Some(pool) = pool {
        let closed = tokio::time::timeout(
            Duration::from_secs(config.shutdown_timeout_secs),
            pool.close(),
        )
        .await;
        if closed.is_err() {
            tracing::warn!("Timed out closing database pool");
        } else {
            tracing::info!("Database pool closed");
        }
    }

    tracing::info!("Graceful shutdown complete");
}

/// Pick the annotation store: PostgreSQL when `DATABASE_URL` is set,
/// process memory otherwise.
async fn connect_store(config: &ServerConfig) -> (Arc<dyn FeedbackStore>, Option<DbPool>) {
    let Some(database_url) = config.database_url.as_deref() else {
        tracing::warn!("DATABASE_URL not set, annotations are kept in memory and lost on restart");
        return (Arc::new(InMemoryFeedbackStore::new()), None);
    };

    let pool = pinmark_db::create_pool(database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    pinmark_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    pinmark_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    (Arc::new(PgFeedbackStore::new(pool.clone())), Some(pool))
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
