use axum::{
    extract::{FromRequest, Query, Request, State},
    http::{
        header::{CONTENT_TYPE, COOKIE, SET_COOKIE},
        HeaderMap, HeaderValue,
    },
    response::{IntoResponse, Response},
    Extension, Form, Json,
};
use chrono::{TimeZone, Utc};
use serde::Deserialize;
use serde_json::json;

use crate::{
    error::AppError,
    handlers::parse_bool_flag,
    models::user::Login,
    repositories::user::UserError,
    state::AppState,
    utils::{
        cookies::{build_clear_cookie, build_token_cookie, extract_cookie_value, TOKEN_COOKIE_NAME},
        jwt::{Claims, TokenResponse},
    },
};

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    pub cookie: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: String,
}

/// Login credentials from either a JSON body or a urlencoded form.
pub struct LoginBody(pub Login);

impl<S> FromRequest<S> for LoginBody
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_form = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.starts_with("application/x-www-form-urlencoded"))
            .unwrap_or(false);

        let login = if is_form {
            Form::<Login>::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?
                .0
        } else {
            Json::<Login>::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?
                .0
        };
        Ok(LoginBody(login))
    }
}

pub async fn token(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
    LoginBody(login): LoginBody,
) -> Result<Response, AppError> {
    let set_cookie = parse_bool_flag("cookie", query.cookie.as_deref())?;

    let user = state.users.login(&login).await.map_err(|err| {
        match &err {
            UserError::Database(_) | UserError::Hash(_) => {
                tracing::error!(error = %err, "login failed")
            }
            _ => tracing::debug!(error = %err, "login rejected"),
        }
        AppError::NotFound("user not found".to_string())
    })?;

    let claims = Claims::new(user.id, user.uuid, user.roles.clone());
    let response = state.tokens.new_token_response(&claims)?;
    state
        .token_store
        .set(user.id, &response.refresh_token)
        .await?;
    tracing::info!(user_id = user.id, username = %user.username, "issued token");

    let mut http_response = Json(&response).into_response();
    if set_cookie {
        attach_token_cookie(&mut http_response, &state, &response)?;
    }
    Ok(http_response)
}

fn attach_token_cookie(
    http_response: &mut Response,
    state: &AppState,
    response: &TokenResponse,
) -> Result<(), AppError> {
    let expires = Utc
        .timestamp_opt(response.expires, 0)
        .single()
        .unwrap_or_else(Utc::now);
    let cookie = build_token_cookie(&response.token, &state.config.cookie_domain, expires);
    set_cookie_header(http_response, &cookie)
}

fn set_cookie_header(http_response: &mut Response, cookie: &str) -> Result<(), AppError> {
    let value =
        HeaderValue::from_str(cookie).map_err(|e| AppError::InternalServerError(e.into()))?;
    http_response.headers_mut().append(SET_COOKIE, value);
    Ok(())
}

pub async fn refresh(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
    Json(body): Json<RefreshRequest>,
) -> Result<Response, AppError> {
    let set_cookie = parse_bool_flag("cookie", query.cookie.as_deref())?;
    let claims = state
        .tokens
        .validate_refresh_token(&body.refresh_token)
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let stored = state
        .token_store
        .get(claims.id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("refresh token not found".to_string()))?;
    if stored != body.refresh_token {
        tracing::warn!(user_id = claims.id, "refresh token does not match stored token");
        return Err(AppError::Unauthorized("invalid refresh token".to_string()));
    }

    let mut response = state.tokens.new_access_token(&claims)?;
    response.refresh_token = body.refresh_token;

    let mut http_response = Json(&response).into_response();
    if set_cookie {
        attach_token_cookie(&mut http_response, &state, &response)?;
    }
    Ok(http_response)
}

/// Drops the caller's refresh token. A `_token` cookie sent with the request
/// is cleared as well.
pub async fn revoke(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    headers: HeaderMap,
    Json(body): Json<RefreshRequest>,
) -> Result<Response, AppError> {
    let refresh = state
        .tokens
        .validate_refresh_token(&body.refresh_token)
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let stored = state.token_store.get(refresh.id).await?;
    if refresh.id != claims.id || stored.as_deref() != Some(body.refresh_token.as_str()) {
        return Err(AppError::BadRequest("incorrect refresh token".to_string()));
    }

    state.token_store.del(refresh.id).await?;
    tracing::info!(user_id = claims.id, "revoked refresh token");

    let mut http_response = Json(json!({ "status": "revoked" })).into_response();
    let has_cookie = headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .any(|raw| extract_cookie_value(raw, TOKEN_COOKIE_NAME).is_some());
    if has_cookie {
        let cookie = build_clear_cookie(&state.config.cookie_domain);
        set_cookie_header(&mut http_response, &cookie)?;
    }
    Ok(http_response)
}
