//! API server entry point.

use std::net::SocketAddr;
use std::time::Duration;

use api::config::{Config, LogFormat};
use api::error::StartupError;
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::postgres::PgPoolOptions;
use store::{InMemoryStore, PostgresStore, Store};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn serve<S: Store>(
    store: S,
    config: &Config,
    metrics_handle: PrometheusHandle,
) -> Result<(), StartupError> {
    let state = api::create_state(store, config);

    if let Some((email, password)) = config.admin_credentials() {
        let admin = state.services.users.ensure_admin(email, password).await?;
        tracing::info!(user_id = %admin.id, "admin account ready");
    }

    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("server shut down gracefully");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    let config = Config::from_env();
    init_tracing(&config);

    if config.uses_dev_secret() {
        tracing::warn!("JWT_SECRET is not set; signing tokens with the development secret");
    }

    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;

    match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .acquire_timeout(Duration::from_secs(5))
                .connect(url)
                .await?;
            let store = PostgresStore::new(pool);
            store.run_migrations().await?;
            tracing::info!("connected to PostgreSQL, migrations applied");
            serve(store, &config, metrics_handle).await
        }
        None => {
            tracing::info!("DATABASE_URL not set, using the in-memory store");
            serve(InMemoryStore::new(), &config, metrics_handle).await
        }
    }
}
