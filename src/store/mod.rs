/// Credential persistence
///
/// The session service only talks to storage through `CredentialStore`.
/// Implementations own the consistency guarantees: unique emails, and an
/// atomic revoke so a concurrent refresh sees a token either fully active or
/// fully revoked.

mod memory;
mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::auth::RefreshTokenRecord;
use crate::error::DatabaseError;

pub use memory::InMemoryCredentialStore;
pub use postgres::PgCredentialStore;

/// Registered account
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    /// `None` means the account cannot log in with a password
    pub hashed_password: Option<String>,
    pub is_entitled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError>;

    /// Fails with `UniqueConstraintViolation` if the email is taken
    async fn create_user(&self, email: &str, hashed_password: &str) -> Result<User, DatabaseError>;

    /// Fails with `NotFound` for an unknown id
    async fn update_user(
        &self,
        id: Uuid,
        email: &str,
        hashed_password: &str,
    ) -> Result<User, DatabaseError>;

    /// Persist a new, unrevoked refresh token. Only a digest of `token` is stored.
    async fn create_refresh_token(
        &self,
        token: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<RefreshTokenRecord, DatabaseError>;

    async fn find_refresh_token(
        &self,
        token: &str,
    ) -> Result<Option<RefreshTokenRecord>, DatabaseError>;

    /// Stamp `revoked_at` and `updated_at` unless the token is already revoked.
    /// Unknown tokens are a no-op.
    async fn revoke_refresh_token(&self, token: &str) -> Result<(), DatabaseError>;

    /// Fails with `NotFound` for an unknown id
    async fn mark_user_entitled(&self, user_id: Uuid) -> Result<(), DatabaseError>;
}
