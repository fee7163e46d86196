//! User accounts in the `"user"` table.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    models::user::{Login, NewUser, Role, User, UserRow},
    utils::password::{hash_password, verify_password},
};

const USER_COLUMNS: &str =
    "id, uuid, username, email, pw_hash, totp_secret, roles, created_at, updated_at";

#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("user not found")]
    NotFound,
    #[error("wrong password")]
    WrongPassword,
    #[error("empty login")]
    EmptyLogin,
    #[error("empty password")]
    EmptyPassword,
    #[error("user already exists")]
    AlreadyExists,
    #[error("database error: {0}")]
    Database(sqlx::Error),
    #[error("password hashing failed: {0}")]
    Hash(anyhow::Error),
}

impl From<sqlx::Error> for UserError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => UserError::NotFound,
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                UserError::AlreadyExists
            }
            _ => UserError::Database(err),
        }
    }
}

/// Repository trait for user accounts, mockable with mockall.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, password: &str, user: NewUser) -> Result<User, UserError>;
    async fn get(&self, uuid: Uuid) -> Result<User, UserError>;
    async fn get_by_id(&self, id: i32) -> Result<User, UserError>;
    /// Looks the user up by username, falling back to email, and checks the
    /// password.
    async fn login(&self, login: &Login) -> Result<User, UserError>;
    async fn update(&self, user: &User) -> Result<User, UserError>;
}

pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn role_names(roles: &[Role]) -> Vec<String> {
    let roles = if roles.is_empty() {
        &[Role::Default][..]
    } else {
        roles
    };
    roles.iter().map(|r| r.as_str().to_string()).collect()
}

/// Shared between the repository and test doubles.
pub fn check_login(login: &Login, user: &User) -> Result<(), UserError> {
    match verify_password(&login.password, &user.pw_hash) {
        Ok(true) => Ok(()),
        Ok(false) => Err(UserError::WrongPassword),
        Err(err) => Err(UserError::Hash(err)),
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, password: &str, user: NewUser) -> Result<User, UserError> {
        if password.is_empty() {
            return Err(UserError::EmptyPassword);
        }
        let pw_hash = hash_password(password).map_err(UserError::Hash)?;
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"INSERT INTO "user" (uuid, username, email, pw_hash, roles)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING {}"#,
            USER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&user.username)
        .bind(&user.email)
        .bind(&pw_hash)
        .bind(role_names(&user.roles))
        .fetch_one(&self.pool)
        .await?;
        tracing::info!(user_id = row.id, username = %row.username, "user created");
        Ok(row.into())
    }

    async fn get(&self, uuid: Uuid) -> Result<User, UserError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"SELECT {} FROM "user" WHERE uuid = $1"#,
            USER_COLUMNS
        ))
        .bind(uuid)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn get_by_id(&self, id: i32) -> Result<User, UserError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"SELECT {} FROM "user" WHERE id = $1"#,
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn login(&self, login: &Login) -> Result<User, UserError> {
        if login.password.is_empty() {
            return Err(UserError::EmptyPassword);
        }
        let (column, value) = if !login.username.is_empty() {
            ("username", &login.username)
        } else if !login.email.is_empty() {
            ("email", &login.email)
        } else {
            return Err(UserError::NotFound);
        };
        let user: User = sqlx::query_as::<_, UserRow>(&format!(
            r#"SELECT {} FROM "user" WHERE {} = $1"#,
            USER_COLUMNS, column
        ))
        .bind(value)
        .fetch_one(&self.pool)
        .await?
        .into();
        check_login(login, &user)?;
        Ok(user)
    }

    async fn update(&self, user: &User) -> Result<User, UserError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"UPDATE "user"
               SET username = $2, email = $3, roles = $4, totp_secret = $5, updated_at = now()
               WHERE id = $1
               RETURNING {}"#,
            USER_COLUMNS
        ))
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(role_names(&user.roles))
        .bind(&user.totp_secret)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }
}
