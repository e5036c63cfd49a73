use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::{net::TcpListener, signal};
use tower::make::Shared;

use wcm::config::VolunteerConfig;
use wcm::init_tracing;
use wcm::routes::volunteers::{create_volunteer_router, VolunteerState};
use wcm::volunteers::JsonFileStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = VolunteerConfig::from_env()?;
    tracing::info!(
        component = "volunteers",
        data_file = %config.data_file.display(),
        host = %config.host,
        port = config.port,
        "loaded volunteer store configuration"
    );

    let listen_addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("VOLUNTEERS_HOST and VOLUNTEERS_PORT must form a socket address")?;
    let store = Arc::new(JsonFileStore::new(config.data_file.clone()));
    let router = create_volunteer_router(
        VolunteerState::new(store),
        config.cors_allowed_origin.as_deref(),
    );

    let listener = TcpListener::bind(listen_addr).await?;
    tracing::info!(%listen_addr, "listening for volunteer requests");

    axum::serve(listener, Shared::new(router))
        .with_graceful_shutdown(async {
            if signal::ctrl_c().await.is_ok() {
                tracing::info!("volunteer server received shutdown signal");
            }
        })
        .await?;
    Ok(())
}
