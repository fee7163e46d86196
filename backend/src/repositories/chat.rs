use async_trait::async_trait;
use sqlx::PgPool;

use crate::{
    models::chat::{Message, MessagesQuery, Room},
    services::chat::ChatError,
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatRepository: Send + Sync {
    async fn create_room(&self, owner_id: i32, name: &str, public: bool) -> Result<Room, ChatError>;
    async fn get_room(&self, id: i32) -> Result<Room, ChatError>;
    /// Returns the id of the stored message.
    async fn save_message(&self, msg: &Message) -> Result<i64, ChatError>;
    /// Newest first.
    async fn messages(&self, room: i32, query: MessagesQuery) -> Result<Vec<Message>, ChatError>;
}

pub struct PgChatRepository {
    pool: PgPool,
}

impl PgChatRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn room_error(err: sqlx::Error) -> ChatError {
    match err {
        sqlx::Error::RowNotFound => ChatError::RoomNotFound,
        other => ChatError::Database(other),
    }
}

#[async_trait]
impl ChatRepository for PgChatRepository {
    async fn create_room(&self, owner_id: i32, name: &str, public: bool) -> Result<Room, ChatError> {
        let room = sqlx::query_as::<_, Room>(
            "INSERT INTO chatroom (owner_id, name, public) VALUES ($1, $2, $3) \
             RETURNING id, owner_id, name, public, created_at",
        )
        .bind(owner_id)
        .bind(name)
        .bind(public)
        .fetch_one(&self.pool)
        .await?;
        tracing::info!(room = room.id, owner_id, name, public, "chat room created");
        Ok(room)
    }

    async fn get_room(&self, id: i32) -> Result<Room, ChatError> {
        sqlx::query_as::<_, Room>(
            "SELECT id, owner_id, name, public, created_at FROM chatroom WHERE id = $1",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(room_error)
    }

    async fn save_message(&self, msg: &Message) -> Result<i64, ChatError> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO chatroom_messages (room, user_id, message, created_at) \
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(msg.room)
        .bind(msg.user_id)
        .bind(&msg.body)
        .bind(msg.created_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn messages(&self, room: i32, query: MessagesQuery) -> Result<Vec<Message>, ChatError> {
        let messages = sqlx::query_as::<_, Message>(
            "SELECT id, room, user_id, message AS body, created_at \
             FROM chatroom_messages \
             WHERE room = $1 AND ($2 <= 0 OR id < $2) \
             ORDER BY id DESC \
             LIMIT $3 OFFSET $4",
        )
        .bind(room)
        .bind(query.prev)
        .bind(query.limit())
        .bind(query.offset())
        .fetch_all(&self.pool)
        .await?;
        Ok(messages)
    }
}
