//! Logsearch API server entry point.
//!
//! Startup order matters: parent tables and startup migrations complete
//! before the listener opens, index builds and the retention tasks run
//! in the background, and a shutdown signal stops the background tasks
//! while in-flight requests drain.

use std::error::Error;
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use logsearch_api::config::{self, Config};
use logsearch_api::routes;
use logsearch_api::state::AppState;
use logsearch_core::clock::{Clock, SystemClock};
use logsearch_store::retention::RetentionController;
use logsearch_store::schema::SchemaManager;
use logsearch_store::store::LogStore;

/// How long in-flight requests may keep draining after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting logsearch API server");

    let config = Config::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.pg_conn_str)
        .await?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let schema = SchemaManager::new(pool.clone());
    let store = LogStore::new(pool);
    let shutdown = CancellationToken::new();

    // The service must not accept traffic against a half-built schema.
    schema.init_tables(clock.now()).await?;
    schema.run_migrations(&shutdown).await?;

    // Index builds can be slow on a populated database; they finish in
    // the background and the next startup retries any that failed.
    let index_schema = schema.clone();
    tokio::spawn(async move {
        if let Err(err) = index_schema.create_indices().await {
            tracing::warn!(error = %err, "index creation failed");
        }
    });

    let retention = Arc::new(RetentionController::new(
        schema,
        store.clone(),
        clock.clone(),
        config.disk_capacity_bytes,
    ));
    let creator = retention.clone();
    let creator_shutdown = shutdown.clone();
    tokio::spawn(async move { creator.run_partition_creator(creator_shutdown).await });
    let vacuum_shutdown = shutdown.clone();
    tokio::spawn(async move { retention.run_vacuum(vacuum_shutdown).await });

    let state = AppState::new(
        store,
        clock,
        config.audit_auth_token,
        config.query_auth_token,
    );
    let app = routes::router(state).layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", config::LISTEN_PORT);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {addr}");

    let server = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .into_future();
    let grace_elapsed = async {
        shutdown.cancelled().await;
        tokio::time::sleep(SHUTDOWN_GRACE).await;
    };
    tokio::select! {
        result = server => result?,
        () = grace_elapsed => {
            tracing::warn!("shutdown grace period elapsed; dropping open connections");
        }
    }

    shutdown.cancel();
    tracing::info!("Server stopped");
    Ok(())
}

/// Resolves when SIGINT or SIGTERM arrives, cancelling `shutdown` so
/// the retention tasks and the backfill stop alongside the listener.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    tracing::info!("Shutdown signal received");
    shutdown.cancel();
}
