//! `ticketboard serve`: a REST ticket store over SQLite.
//!
//! Speaks the same `/api/v1` protocol `store::http::HttpTicketStore`
//! consumes, so the CLI can run against a local board without any other
//! backend.

pub mod api;
pub mod db;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::info;

use self::api::AppState;
use self::db::{DbHandle, TicketDb};

pub const DEFAULT_PORT: u16 = 8080;

/// Configuration for the ticket server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub db_path: PathBuf,
    pub dev_mode: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            db_path: PathBuf::from(".ticketboard/tickets.db"),
            dev_mode: false,
        }
    }
}

/// Build the application router around an opened database.
pub fn build_router(db: TicketDb, dev_mode: bool) -> Router {
    let state = Arc::new(AppState {
        db: DbHandle::new(db),
    });
    let app = api::api_router().with_state(state);
    if dev_mode {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}

/// Bind the listener for `config`. Port 0 picks a free port.
pub async fn bind(config: &ServerConfig) -> Result<TcpListener> {
    let host = if config.dev_mode { "0.0.0.0" } else { "127.0.0.1" };
    let addr = format!("{}:{}", host, config.port);
    TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))
}

/// Open the database and serve until Ctrl+C.
pub async fn start_server(config: ServerConfig) -> Result<()> {
    if let Some(parent) = config.db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }
    let db = TicketDb::new(&config.db_path).context("Failed to initialize ticket database")?;
    let app = build_router(db, config.dev_mode);

    let listener = bind(&config).await?;
    let local_addr: SocketAddr = listener.local_addr()?;
    info!(addr = %local_addr, db = %config.db_path.display(), "ticket server listening");
    println!("Ticket API running at http://{}{}", local_addr, api::API_PREFIX);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("ticket server shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for Ctrl+C; shutting down");
    }
    info!("shutdown requested");
}
