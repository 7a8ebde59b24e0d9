//! Readiness endpoint

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use axum_helpers::{HealthCheckFuture, run_health_checks};
use serde_json::Value;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ready", get(readiness_check))
        .with_state(state)
}

/// 200 when MongoDB answers a ping, 503 otherwise
async fn readiness_check(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    let client = state.mongo_client.clone();
    let mongo_check: HealthCheckFuture = Box::pin(async move {
        let status = database::mongodb::check_health_detailed(&client).await;
        if status.healthy {
            Ok(())
        } else {
            Err(status
                .message
                .unwrap_or_else(|| "MongoDB ping failed".to_string()))
        }
    });

    run_health_checks(vec![("database", mongo_check)]).await
}
