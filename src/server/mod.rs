//! HTTP API over the mirrored issuer list.
//!
//! Provides:
//! - Paginated listing, lookup by RNC and name search
//! - Refresh status and a manual refresh trigger
//! - Per-client rate limiting and security headers
//! - The cron scheduler that keeps the mirror current

mod handlers;
mod routes;
pub mod scheduler;

pub use handlers::ApiError;
pub use routes::{create_router, RouterOptions};

use std::future::Future;
use std::net::SocketAddr;
use std::time::Instant;

use crate::repository::EmisorRepository;
use crate::services::RefreshCoordinator;

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub repo: EmisorRepository,
    pub refresh: RefreshCoordinator,
    /// Effective refresh schedule, reported by the status endpoint.
    pub schedule: Option<String>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(refresh: RefreshCoordinator, schedule: Option<String>) -> Self {
        Self {
            repo: refresh.store().clone(),
            refresh,
            schedule,
            started_at: Instant::now(),
        }
    }
}

/// Start the web server and run until `shutdown` resolves.
pub async fn serve<F>(
    state: AppState,
    options: &RouterOptions,
    addr: SocketAddr,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(state, options);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Starting server at http://{}", listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;

    Ok(())
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to listen for SIGTERM: {}", e);
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
    tracing::info!("Shutdown signal received");
}
