use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde_json::json;

use crate::{
    error::AppError,
    handlers::auth::LoginBody,
    models::{
        invite::{CreateInviteRequest, Invitation, InviteList, InviteView},
        user::{NewUser, User},
    },
    repositories::user::UserError,
    services::mailer::parse_recipient,
    state::AppState,
    utils::jwt::Claims,
};

pub async fn create_invite(
    State(state): State<AppState>,
    claims: Option<Extension<Claims>>,
    Json(req): Json<CreateInviteRequest>,
) -> Result<Json<Invitation>, AppError> {
    let Extension(claims) =
        claims.ok_or_else(|| AppError::Unauthorized("no claims found".to_string()))?;
    if !claims.is_admin() && req.sets_privileged_fields() {
        return Err(AppError::Unauthorized(
            "only admins may set ttl, timeout or roles".to_string(),
        ));
    }

    let session = state.invites.create(claims.uuid, &req).await?;
    let invitation = Invitation::from_session(&session, req.receiver_name.clone());

    if let (Some(mailer), Some(to)) = (
        state.mailer.as_ref(),
        parse_recipient(&req.email, &req.receiver_name),
    ) {
        if let Err(err) = mailer
            .send_invite(&invitation, &to, &state.config.public_url)
            .await
        {
            tracing::warn!(error = %err, invite = %session.id, "failed to send invite email");
        }
    }
    Ok(Json(invitation))
}

pub async fn list_invites(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<InviteList>, AppError> {
    let admin = claims.is_admin();
    let invites = state
        .invites
        .list()
        .await?
        .iter()
        .filter(|session| admin || session.created_by == claims.uuid)
        .map(|session| Invitation::from_session(session, ""))
        .collect();
    Ok(Json(InviteList { invites }))
}

pub async fn delete_invite(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.invites.owner_del(&id, claims.uuid).await?;
    tracing::info!(invite = %id, user = %claims.uuid, "invite deleted");
    Ok(Json(json!({ "status": "deleted" })))
}

/// Shows an invite without spending one of its uses.
pub async fn accept_invite(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<InviteView>, AppError> {
    let session = state.invites.view(&id).await?;
    Ok(Json(InviteView {
        path: session.path(),
        email: session.email.clone(),
        expires_at: session
            .expires_at_utc()
            .unwrap_or_else(chrono::Utc::now),
        tries_left: session.ttl,
    }))
}

pub async fn signup(
    State(state): State<AppState>,
    Path(id): Path<String>,
    LoginBody(login): LoginBody,
) -> Result<Json<User>, AppError> {
    let session = state.invites.get(&id).await?;

    if login.email.is_empty() || login.password.is_empty() {
        return Err(UserError::EmptyLogin.into());
    }
    if !session.email.is_empty() && session.email != login.email {
        return Err(AppError::Forbidden(
            "invite was issued to a different email".to_string(),
        ));
    }

    let user = state
        .users
        .create(
            &login.password,
            NewUser {
                username: login.username.clone(),
                email: login.email.clone(),
                roles: session.roles.clone(),
            },
        )
        .await?;

    if let Err(err) = state.invites.del(&id).await {
        tracing::warn!(invite = %id, error = %err, "failed to delete used invite");
    }
    tracing::info!(user_id = user.id, invite = %id, "user signed up from invite");
    Ok(Json(user))
}
