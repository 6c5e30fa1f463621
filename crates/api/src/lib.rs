pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;
use tracing::info;

use common::{DeliveryMode, HealthStatus, Result};

/// Shared application state injected into every route handler.
#[derive(Clone)]
pub struct AppState {
    pub health: Arc<RwLock<HealthStatus>>,
    pub delivery_mode: DeliveryMode,
    pub started_at: DateTime<Utc>,
    /// Report unhealthy when no cycle has finished for this long.
    pub stale_after: Duration,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(routes::health_router())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Bind and serve the health endpoint until the task is dropped.
pub async fn serve(state: AppState, port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Health endpoint listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
