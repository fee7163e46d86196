use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Deserialize;
use validator::Validate;

use crate::{
    error::AppError,
    handlers::parse_bool_flag,
    models::chat::{CreateRoomQuery, MessageList, MessagesQuery, Room},
    services::chat::{relay, WsSocket},
    state::AppState,
    utils::jwt::Claims,
};

pub const ANONYMOUS_USER: i32 = 0;

#[derive(Debug, Default, Deserialize)]
pub struct ConnectQuery {
    pub user: Option<i32>,
}

pub async fn create_room(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<CreateRoomQuery>,
) -> Result<Json<Room>, AppError> {
    query.validate()?;
    let public = parse_bool_flag("public", query.public.as_deref())?;
    let room = state.chat.create_room(claims.id, &query.name, public).await?;
    tracing::info!(room = room.id, owner = claims.id, "chat room created");
    Ok(Json(room))
}

pub async fn get_room(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Room>, AppError> {
    Ok(Json(state.chat.get_room(id).await?))
}

pub async fn room_messages(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Query(query): Query<MessagesQuery>,
) -> Result<Json<MessageList>, AppError> {
    let messages = state.chat.messages(id, query).await?;
    Ok(Json(MessageList { messages }))
}

/// Upgrades to a WebSocket bound to one room. Authenticated users are
/// identified by their token, anonymous ones by the `user` query value,
/// falling back to user 0.
pub async fn connect(
    State(state): State<AppState>,
    Path(room): Path<i32>,
    Query(query): Query<ConnectQuery>,
    claims: Option<Extension<Claims>>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, AppError> {
    let user = match claims {
        Some(Extension(claims)) => claims.id,
        None => query.user.unwrap_or(ANONYMOUS_USER),
    };
    state.chat.get_room(room).await?;
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return Ok(rejection.into_response()),
    };

    Ok(ws.on_upgrade(move |socket| serve_socket(state, socket, room, user)))
}

async fn serve_socket(state: AppState, socket: WebSocket, room: i32, user: i32) {
    let pubsub = state.broker.open(room, user);
    let subscription = match pubsub.subscribe().await {
        Ok(subscription) => subscription,
        Err(err) => {
            tracing::error!(room, user, error = %err, "failed to subscribe to chat room");
            return;
        }
    };

    tracing::debug!(room, user, "chat socket connected");
    let mut socket = WsSocket::new(socket);
    match relay(&mut socket, pubsub.as_ref(), subscription, state.chat.as_ref()).await {
        Ok(()) => tracing::debug!(room, user, "chat socket closed"),
        Err(err) => tracing::warn!(room, user, error = %err, "chat socket ended with error"),
    }
}
