pub mod adapters;
pub mod app;
mod assets;
pub mod audit;
pub mod auth;
pub mod config;
pub mod documents;
pub mod folders;
pub mod library;
pub mod logging;
pub mod notifications;
pub mod ports;
pub mod seed;
pub mod state;
pub mod store;
pub mod templates;
pub mod trash;
pub mod types;
pub mod uploads;
pub mod users;

pub use app::{StartupError, app};

use tracing::info;

/// Binds `config.addr` and serves the portal until the listener fails.
pub async fn serve(config: config::AppConfig) -> Result<(), StartupError> {
    let addr = config.addr;
    let router = app(config)?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(StartupError::Bind)?;
    info!(%addr, "listening");
    axum::serve(listener, router)
        .await
        .map_err(StartupError::Serve)
}
