use axum::{
    extract::{Request, State},
    http::{
        header::{HeaderName, REFERER, USER_AGENT},
        HeaderMap, HeaderValue,
    },
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use uuid::Uuid;

use crate::{models::request_log::NewRequestLog, state::AppState, utils::jwt::Claims};

const REQUEST_ID_HEADER: &str = "x-request-id";
const CORRELATION_ID_HEADER: &str = "x-correlation-id";

#[derive(Clone, Debug)]
pub struct RequestId(pub String);

/// Tags the request with an id, logs one line per request, and records the
/// request in the request log without holding up the response.
pub async fn request_log(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let headers = request.headers().clone();
    let request_id = extract_request_id(&headers);
    request.extensions_mut().insert(RequestId(request_id.clone()));

    let method = request.method().to_string();
    let uri = request.uri().path().to_string();

    let mut response = next.run(request).await;

    let latency = start.elapsed().as_millis() as i64;
    let status = response.status();
    let user_id = response.extensions().get::<Claims>().map(|c| c.uuid);
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }

    tracing::info!(
        request_id = %request_id,
        method = %method,
        uri = %uri,
        status = status.as_u16(),
        latency_ms = latency,
        "request"
    );

    let entry = NewRequestLog {
        method,
        status: i32::from(status.as_u16()),
        ip: extract_ip(&headers).unwrap_or_default(),
        uri,
        referer: header_string(&headers, REFERER),
        user_agent: header_string(&headers, USER_AGENT),
        latency,
        error: if status.is_client_error() || status.is_server_error() {
            status.canonical_reason().unwrap_or_default().to_string()
        } else {
            String::new()
        },
        user_id,
    };
    let logs = state.request_logs.clone();
    tokio::spawn(async move {
        if let Err(err) = logs.write(entry).await {
            tracing::warn!(error = %err, "failed to write request log");
        }
    });

    response
}

fn extract_request_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .or_else(|| headers.get(CORRELATION_ID_HEADER))
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

fn extract_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .or_else(|| headers.get("x-real-ip"))
        .and_then(|value| value.to_str().ok())
        .map(|value| value.split(',').next().unwrap_or(value).trim().to_string())
}

fn header_string(headers: &HeaderMap, name: HeaderName) -> String {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}
