//! # Campaign API Server
//!
//! Serves the crowdfunding REST API.
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgres://localhost/campaigns \
//! JWT_SECRET=... XENDIT_SECRET_KEY=... \
//! cargo run -p campaign-api
//! ```
//!
//! Set `LOG_FORMAT=json` for structured logs and `RUST_LOG` to override the
//! default filter.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use campaign_api::{
    app::{build_router, AppState},
    config::Config,
};
use campaign_shared::{
    db::{
        migrations::{ensure_database_exists, run_migrations},
        pool::{close_pool, create_pool, DatabaseConfig},
    },
    payment::{XenditConfig, XenditGateway},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Rate limit buckets untouched for this long are dropped
const RATE_LIMIT_IDLE: Duration = Duration::from_secs(10 * 60);

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "campaign_api=debug,campaign_shared=debug,tower_http=debug".into());

    let json = std::env::var("LOG_FORMAT").map_or(false, |f| f.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    tracing::info!(
        "Campaign API Server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::from_env().context("Failed to load configuration")?;

    let mut db_config = DatabaseConfig::new(config.database.url.clone());
    db_config.max_connections = config.database.max_connections;

    ensure_database_exists(&db_config.url)
        .await
        .context("Failed to create database")?;
    let pool = create_pool(db_config).await.context("Failed to connect to database")?;
    run_migrations(&pool).await.context("Failed to run migrations")?;

    let gateway = XenditGateway::new(XenditConfig {
        secret_key: config.payment.xendit_secret_key.clone(),
        base_url: config.payment.xendit_api_url.clone(),
        timeout: config.payment.timeout,
        success_redirect_url: Some(config.api.url.clone()),
        failure_redirect_url: Some(config.api.url.clone()),
    })
    .context("Failed to build payment gateway client")?;

    tokio::fs::create_dir_all(&config.storage.upload_dir)
        .await
        .with_context(|| format!("Failed to create upload directory {}", config.storage.upload_dir))?;

    let addr = config.bind_address();
    let state = AppState::new(pool.clone(), config, Arc::new(gateway));

    let limiter = state.rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            limiter.retain_recent(RATE_LIMIT_IDLE);
        }
    });

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    close_pool(pool).await;
    tracing::info!("Server stopped");

    Ok(())
}
