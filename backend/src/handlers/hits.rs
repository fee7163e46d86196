use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::{
    error::AppError,
    models::Count,
    repositories::request_log::RequestLogRepository,
    services::hits::{hits_key, HitsCache},
    state::AppState,
};

#[derive(Debug, Default, Deserialize)]
pub struct HitsQuery {
    #[serde(default)]
    pub u: String,
}

pub async fn hits(
    State(state): State<AppState>,
    Query(query): Query<HitsQuery>,
) -> Result<Json<Count>, AppError> {
    let count = count_hits(
        state.hits.as_deref(),
        state.request_logs.as_ref(),
        &query.u,
    )
    .await?;
    Ok(Json(Count { count }))
}

/// Serves the count from the cache when it is warm, otherwise counts the
/// request log and seeds the cache.
pub async fn count_hits(
    cache: Option<&dyn HitsCache>,
    logs: &dyn RequestLogRepository,
    uri: &str,
) -> Result<i64, AppError> {
    let uri = if uri.is_empty() { "/" } else { uri };
    let key = hits_key(uri);

    let Some(cache) = cache else {
        return Ok(logs.count_by_uri(uri).await?);
    };

    match cache.next(&key).await {
        Ok(count) => Ok(count),
        Err(err) => {
            tracing::debug!(key = %key, error = %err, "hits cache miss");
            let count = logs.count_by_uri(uri).await?;
            if let Err(err) = cache.put(&key, count).await {
                tracing::warn!(key = %key, error = %err, "failed to cache hits");
            }
            Ok(count)
        }
    }
}
