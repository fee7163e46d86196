//! Chat relay: messages arrive on a websocket, fan out through a pub/sub
//! channel per room, and are written back to every other member's socket.
//! Delivery is at-most-once; history lives only in the relational log.

use async_trait::async_trait;
use axum::extract::ws::{Message as WsMessage, WebSocket};
use bb8_redis::redis::{self, AsyncCommands};
use chrono::Utc;
use futures::{stream::BoxStream, StreamExt};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};
use tokio::sync::broadcast;

use crate::{db::redis::RedisPool, models::chat::Message, repositories::chat::ChatRepository};

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("empty message body")]
    EmptyBody,
    #[error("chat room not found")]
    RoomNotFound,
    #[error("invalid chat message: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("websocket error: {0}")]
    Socket(#[from] axum::Error),
    #[error("pubsub error: {0}")]
    PubSub(#[from] redis::RedisError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub fn decode_message(raw: &[u8]) -> Result<Message, ChatError> {
    let mut msg: Message = serde_json::from_slice(raw)?;
    if msg.body.is_empty() {
        return Err(ChatError::EmptyBody);
    }
    msg.created_at = Utc::now();
    Ok(msg)
}

pub fn encode_message(msg: &Message) -> Result<String, ChatError> {
    Ok(serde_json::to_string(msg)?)
}

/// One client connection. `recv` yields `None` once the peer is gone.
#[async_trait]
pub trait Socket: Send {
    async fn recv(&mut self) -> Result<Option<Message>, ChatError>;
    async fn send(&mut self, msg: &Message) -> Result<(), ChatError>;
}

pub struct WsSocket {
    inner: WebSocket,
}

impl WsSocket {
    pub fn new(inner: WebSocket) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl Socket for WsSocket {
    async fn recv(&mut self) -> Result<Option<Message>, ChatError> {
        loop {
            let Some(frame) = self.inner.recv().await else {
                return Ok(None);
            };
            match frame? {
                WsMessage::Text(text) => return decode_message(text.as_str().as_bytes()).map(Some),
                WsMessage::Binary(bytes) => return decode_message(&bytes).map(Some),
                WsMessage::Close(_) => return Ok(None),
                WsMessage::Ping(_) | WsMessage::Pong(_) => continue,
            }
        }
    }

    async fn send(&mut self, msg: &Message) -> Result<(), ChatError> {
        let raw = encode_message(msg)?;
        self.inner.send(WsMessage::Text(raw.into())).await?;
        Ok(())
    }
}

/// Pub/sub handle bound to one room and one user.
#[async_trait]
pub trait PubSub: Send + Sync {
    /// Stamps the room and sender onto `msg` and publishes it.
    async fn publish(&self, msg: &mut Message) -> Result<(), ChatError>;
    /// Messages from everyone else in the room.
    async fn subscribe(&self) -> Result<BoxStream<'static, Message>, ChatError>;
}

pub trait Broker: Send + Sync {
    fn open(&self, room: i32, user: i32) -> Box<dyn PubSub>;
}

pub fn channel_name(room: i32, user: i32) -> String {
    format!("room:{}:user:{}", room, user)
}

pub fn room_pattern(room: i32) -> String {
    format!("room:{}:user:*", room)
}

pub struct RedisBroker {
    pool: RedisPool,
    client: redis::Client,
}

impl RedisBroker {
    pub fn new(pool: RedisPool, client: redis::Client) -> Self {
        Self { pool, client }
    }
}

impl Broker for RedisBroker {
    fn open(&self, room: i32, user: i32) -> Box<dyn PubSub> {
        Box::new(RedisPubSub {
            pool: self.pool.clone(),
            client: self.client.clone(),
            room,
            user,
        })
    }
}

struct RedisPubSub {
    pool: RedisPool,
    client: redis::Client,
    room: i32,
    user: i32,
}

#[async_trait]
impl PubSub for RedisPubSub {
    async fn publish(&self, msg: &mut Message) -> Result<(), ChatError> {
        msg.room = self.room;
        msg.user_id = self.user;
        let raw = encode_message(msg)?;
        let mut conn = self.pool.get().await.map_err(anyhow::Error::from)?;
        conn.publish::<_, _, ()>(channel_name(self.room, self.user), raw)
            .await?;
        Ok(())
    }

    async fn subscribe(&self) -> Result<BoxStream<'static, Message>, ChatError> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.psubscribe(room_pattern(self.room)).await?;
        let user = self.user;
        let stream = pubsub.into_on_message().filter_map(move |frame| async move {
            let payload: String = match frame.get_payload() {
                Ok(payload) => payload,
                Err(err) => {
                    tracing::warn!(error = %err, "unreadable chat payload");
                    return None;
                }
            };
            match serde_json::from_str::<Message>(&payload) {
                Ok(msg) if msg.user_id == user => None,
                Ok(msg) => Some(msg),
                Err(err) => {
                    tracing::error!(error = %err, "failed to decode chat message from pubsub");
                    None
                }
            }
        });
        Ok(stream.boxed())
    }
}

/// In-process broker for single-node deployments without Redis. Each room
/// gets its own broadcast channel so a busy room cannot lag the others.
#[derive(Clone)]
pub struct LocalBroker {
    capacity: usize,
    rooms: Arc<Mutex<HashMap<i32, broadcast::Sender<Message>>>>,
}

impl LocalBroker {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            rooms: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn room_sender(&self, room: i32) -> broadcast::Sender<Message> {
        let mut rooms = self.rooms.lock().unwrap_or_else(PoisonError::into_inner);
        // Rooms nobody listens to any more are dropped as new ones open.
        rooms.retain(|id, tx| *id == room || tx.receiver_count() > 0);
        rooms
            .entry(room)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    #[cfg(test)]
    fn room_count(&self) -> usize {
        self.rooms.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Default for LocalBroker {
    fn default() -> Self {
        Self::new(256)
    }
}

impl Broker for LocalBroker {
    fn open(&self, room: i32, user: i32) -> Box<dyn PubSub> {
        Box::new(LocalPubSub {
            tx: self.room_sender(room),
            room,
            user,
        })
    }
}

struct LocalPubSub {
    tx: broadcast::Sender<Message>,
    room: i32,
    user: i32,
}

#[async_trait]
impl PubSub for LocalPubSub {
    async fn publish(&self, msg: &mut Message) -> Result<(), ChatError> {
        msg.room = self.room;
        msg.user_id = self.user;
        // No subscribers is not an error for fire-and-forget delivery.
        let _ = self.tx.send(msg.clone());
        Ok(())
    }

    async fn subscribe(&self) -> Result<BoxStream<'static, Message>, ChatError> {
        let user = self.user;
        let stream = futures::stream::unfold(self.tx.subscribe(), |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(msg) => return Some((msg, rx)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "chat subscriber lagging, dropped messages");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
        .filter(move |msg| futures::future::ready(msg.user_id != user));
        Ok(stream.boxed())
    }
}

/// Pumps messages between a socket and its room until either side closes.
/// Incoming messages are published, then logged to the store.
pub async fn relay<S>(
    socket: &mut S,
    pubsub: &dyn PubSub,
    mut subscription: BoxStream<'static, Message>,
    store: &dyn ChatRepository,
) -> Result<(), ChatError>
where
    S: Socket + ?Sized,
{
    loop {
        tokio::select! {
            received = socket.recv() => match received {
                Ok(Some(mut msg)) => {
                    pubsub.publish(&mut msg).await?;
                    if let Err(err) = store.save_message(&msg).await {
                        tracing::warn!(room = msg.room, user_id = msg.user_id, error = %err, "failed to save chat message");
                    }
                }
                Ok(None) => return Ok(()),
                Err(ChatError::EmptyBody) => {
                    tracing::warn!("dropping chat message with empty body");
                }
                Err(err) => return Err(err),
            },
            published = subscription.next() => match published {
                Some(msg) => socket.send(&msg).await?,
                None => return Ok(()),
            },
        }
    }
}
