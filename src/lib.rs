pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod payload;
pub mod routes;
pub mod schema;
pub mod state;
pub mod utils;
pub mod volunteers;

use tracing_subscriber::EnvFilter;

/// Installs the compact `fmt` subscriber shared by the binaries.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
