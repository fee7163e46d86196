use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::{
    error::AppError,
    models::user::Role,
    state::AppState,
    utils::{cookies::extract_token, jwt::Claims},
};

/// Rejects requests without a valid access token and stores the claims in
/// the request extensions. The claims are copied onto the response so the
/// request logger can attribute the request.
pub async fn guard(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_token(request.headers())
        .ok_or_else(|| AppError::Unauthorized("missing access token".to_string()))?;
    let claims = state.tokens.validate_access_token(&token)?;

    request.extensions_mut().insert(claims.clone());
    let mut response = next.run(request).await;
    response.extensions_mut().insert(claims);
    Ok(response)
}

/// Like [`guard`] but never rejects: anonymous or invalid tokens simply
/// leave the claims unset.
pub async fn implicit_user(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let claims = extract_token(request.headers())
        .and_then(|token| match state.tokens.validate_access_token(&token) {
            Ok(claims) => Some(claims),
            Err(err) => {
                tracing::debug!(error = %err, "ignoring invalid token on public route");
                None
            }
        });

    match claims {
        Some(claims) => {
            request.extensions_mut().insert(claims.clone());
            let mut response = next.run(request).await;
            response.extensions_mut().insert(claims);
            response
        }
        None => next.run(request).await,
    }
}

/// Must run after [`guard`].
pub async fn admin_only(request: Request, next: Next) -> Result<Response, AppError> {
    require_role(&request, Role::Admin)?;
    Ok(next.run(request).await)
}

pub fn require_role(request: &Request, role: Role) -> Result<(), AppError> {
    let claims = request
        .extensions()
        .get::<Claims>()
        .ok_or_else(|| AppError::Unauthorized("no claims found".to_string()))?;
    if claims.has_role(role) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!("{} role required", role)))
    }
}
