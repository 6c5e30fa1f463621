use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde_json::{json, Value};

use crate::AppState;

pub fn health_router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/healthz", get(healthz))
}

/// Plain liveness text for uptime pingers.
async fn root() -> &'static str {
    "wickwatch is running"
}

/// Health check endpoint — no auth required.
///
/// 200 while polling cycles keep completing, 503 once the last completed
/// cycle (or process start, before the first one) is older than `stale_after`.
async fn healthz(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let health = state.health.read().await.clone();
    let now = Utc::now();
    let reference = health.last_cycle_at.unwrap_or(state.started_at);
    let stale = (now - reference)
        .to_std()
        .map(|age| age > state.stale_after)
        .unwrap_or(false);

    let status = if stale {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    let body = json!({
        "status": if stale { "stale" } else { "ok" },
        "delivery": state.delivery_mode.to_string(),
        "uptime_secs": (now - state.started_at).num_seconds(),
        "cycles_completed": health.cycles_completed,
        "last_cycle_at": health.last_cycle_at,
        "pairs_failed_last_cycle": health.pairs_failed_last_cycle,
        "alerts_emitted_total": health.alerts_emitted_total,
        "tracked_keys": health.tracked_keys,
    });
    (status, Json(body))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use chrono::Utc;
    use common::{DeliveryMode, HealthStatus};
    use serde_json::Value;
    use tokio::sync::RwLock;
    use tower::ServiceExt;

    use crate::{router, AppState};

    fn state(health: HealthStatus, started_ago: chrono::Duration) -> AppState {
        AppState {
            health: Arc::new(RwLock::new(health)),
            delivery_mode: DeliveryMode::Log,
            started_at: Utc::now() - started_ago,
            stale_after: Duration::from_secs(180),
        }
    }

    async fn get(state: AppState, uri: &str) -> (StatusCode, Vec<u8>) {
        let resp = router(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), 64 * 1024).await.unwrap();
        (status, bytes.to_vec())
    }

    #[tokio::test]
    async fn healthz_reports_ok_after_recent_cycle() {
        let health = HealthStatus {
            cycles_completed: 3,
            last_cycle_at: Some(Utc::now()),
            pairs_failed_last_cycle: 1,
            alerts_emitted_total: 2,
            tracked_keys: 2,
        };
        let (status, body) = get(state(health, chrono::Duration::minutes(10)), "/healthz").await;
        assert_eq!(status, StatusCode::OK);

        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["cycles_completed"], 3);
        assert_eq!(json["alerts_emitted_total"], 2);
        assert_eq!(json["delivery"], "log");
    }

    #[tokio::test]
    async fn healthz_is_ok_during_startup_grace() {
        let fresh = state(HealthStatus::default(), chrono::Duration::seconds(5));
        let (status, _) = get(fresh, "/healthz").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn healthz_reports_stale_when_cycles_stop() {
        let health = HealthStatus {
            cycles_completed: 1,
            last_cycle_at: Some(Utc::now() - chrono::Duration::minutes(10)),
            ..HealthStatus::default()
        };
        let (status, body) = get(state(health, chrono::Duration::hours(1)), "/healthz").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "stale");
    }

    #[tokio::test]
    async fn root_answers_uptime_pingers() {
        let just_started = state(HealthStatus::default(), chrono::Duration::zero());
        let (status, body) = get(just_started, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"wickwatch is running");
    }
}
