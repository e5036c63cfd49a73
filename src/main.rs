use std::net::SocketAddr;

use anyhow::Context;
use tokio::{net::TcpListener, signal};
use tower::make::Shared;

use wcm::{config::AppConfig, db, init_tracing, routes, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "server",
        database_url = %config.redacted_database_url(),
        pool_size = config.database_max_pool_size,
        server_host = %config.server_host,
        server_port = config.server_port,
        cors_restricted = config.cors_allowed_origin.is_some(),
        "loaded server configuration"
    );
    let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;

    let migration_pool = pool.clone();
    let applied = tokio::task::spawn_blocking(move || {
        let mut conn = migration_pool
            .get()
            .context("failed to check out a connection for migrations")?;
        db::run_migrations(&mut conn)
    })
    .await
    .context("migration task panicked")??;
    tracing::info!(applied, "database schema is up to date");

    let listen_addr: SocketAddr = format!("{}:{}", config.server_host, config.server_port)
        .parse()
        .context("SERVER_HOST and SERVER_PORT must form a socket address")?;
    let state = AppState::new(pool, config);
    let router = routes::create_router(state);

    let listener = TcpListener::bind(listen_addr).await?;
    tracing::info!(%listen_addr, "listening for dashboard API requests");

    axum::serve(listener, Shared::new(router))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if signal::ctrl_c().await.is_ok() {
        tracing::info!("server received shutdown signal");
    }
}
