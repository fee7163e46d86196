//! Invite sessions and the payloads exchanged by the invite endpoints.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::user::Role;

/// Stored invite session. Field names are kept short because every blob
/// lives in the key-value store.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Session {
    #[serde(rename = "cb")]
    pub created_by: Uuid,
    /// Remaining uses. Negative means unlimited, zero means spent.
    #[serde(rename = "tl", default)]
    pub ttl: i32,
    /// Unix milliseconds.
    #[serde(rename = "ex", default, skip_serializing_if = "is_zero")]
    pub expires_at: i64,
    #[serde(rename = "e", default, skip_serializing_if = "String::is_empty")]
    pub email: String,
    #[serde(rename = "r", default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<Role>,
    /// Derived from the storage key, never persisted.
    #[serde(skip)]
    pub id: String,
}

fn is_zero(value: &i64) -> bool {
    *value == 0
}

impl Session {
    pub fn expires_at_utc(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.expires_at).single()
    }

    pub fn path(&self) -> String {
        format!("/invite/{}", self.id)
    }
}

/// Body of `POST /api/invite/create`. Only admins may set `timeout`, `ttl`
/// and `roles`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateInviteRequest {
    /// Seconds until the invite expires.
    #[serde(default)]
    pub timeout: i64,
    #[serde(default)]
    pub ttl: i32,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub receiver_name: String,
    #[serde(default)]
    pub roles: Vec<Role>,
}

impl CreateInviteRequest {
    pub fn sets_privileged_fields(&self) -> bool {
        self.timeout != 0 || self.ttl != 0 || !self.roles.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Invitation {
    pub path: String,
    pub created_by: Uuid,
    pub expires_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub receiver_name: String,
    #[serde(default)]
    pub roles: Vec<Role>,
    pub ttl: i32,
}

impl Invitation {
    pub fn from_session(session: &Session, receiver_name: impl Into<String>) -> Self {
        Invitation {
            path: session.path(),
            created_by: session.created_by,
            expires_at: session.expires_at_utc().unwrap_or_else(Utc::now),
            email: session.email.clone(),
            receiver_name: receiver_name.into(),
            roles: session.roles.clone(),
            ttl: session.ttl,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InviteList {
    pub invites: Vec<Invitation>,
}

/// What an invite link shows before sign-up.
#[derive(Debug, Serialize, Deserialize)]
pub struct InviteView {
    pub path: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email: String,
    pub expires_at: DateTime<Utc>,
    pub tries_left: i32,
}
