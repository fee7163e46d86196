//! Models that represent users, login payloads, and role metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

/// Roles carried in access tokens and stored on user rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Role {
    Admin,
    #[default]
    Default,
    Family,
    Tanya,
    /// Anything that did not parse. Never granted by the server.
    Invalid,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Default => "default",
            Role::Family => "family",
            Role::Tanya => "tanya",
            Role::Invalid => "invalid",
        }
    }

    pub fn parse(value: &str) -> Role {
        match value {
            "admin" => Role::Admin,
            "default" => Role::Default,
            "family" => Role::Family,
            "tanya" => Role::Tanya,
            _ => Role::Invalid,
        }
    }

    /// Parses a comma separated role list, failing on the first unknown name.
    pub fn parse_list(value: &str) -> Result<Vec<Role>, String> {
        value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| match Role::parse(s) {
                Role::Invalid => Err(format!("invalid role {:?}", s)),
                role => Ok(role),
            })
            .collect()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Role {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Role::parse(&s))
    }
}

/// Database representation of a user account.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i32,
    pub uuid: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub pw_hash: String,
    #[serde(skip_serializing)]
    pub totp_secret: String,
    pub roles: Vec<Role>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

/// Row shape of the `"user"` table. Roles are stored as `TEXT[]`.
#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: i32,
    pub uuid: Uuid,
    pub username: String,
    pub email: String,
    pub pw_hash: String,
    pub totp_secret: String,
    pub roles: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            uuid: row.uuid,
            username: row.username,
            email: row.email,
            pw_hash: row.pw_hash,
            totp_secret: row.totp_secret,
            roles: row.roles.iter().map(|r| Role::parse(r)).collect(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Fields required to insert a user. The password travels separately.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub roles: Vec<Role>,
}

/// Credentials accepted by `/api/token` and the invite sign-up form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Login {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}
