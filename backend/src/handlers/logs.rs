use axum::{
    extract::{Query, State},
    Json,
};

use crate::{
    error::AppError,
    models::request_log::{LogList, LogQuery},
    state::AppState,
};

pub async fn list_logs(
    State(state): State<AppState>,
    Query(query): Query<LogQuery>,
) -> Result<Json<LogList>, AppError> {
    let logs = state.request_logs.list(query).await?;
    Ok(Json(LogList { logs }))
}
