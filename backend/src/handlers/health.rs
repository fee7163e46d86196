use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::{db, error::AppError, state::AppState};

pub async fn alive() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Pings every backing service and reports the first one that fails.
pub async fn ready(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    if let Err(err) = db::connection::ping(&state.db).await {
        tracing::warn!(error = %err, "postgres readiness check failed");
        return Err(AppError::ServiceUnavailable(
            "postgres is not available".to_string(),
        ));
    }
    if let Some(pool) = state.redis.as_ref() {
        if let Err(err) = db::redis::ping(pool).await {
            tracing::warn!(error = %err, "redis readiness check failed");
            return Err(AppError::ServiceUnavailable(
                "redis is not available".to_string(),
            ));
        }
    }
    Ok(Json(json!({ "status": "ok" })))
}
