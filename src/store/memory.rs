use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{CredentialStore, User};
use crate::auth::{hash_refresh_token, RefreshTokenRecord};
use crate::error::DatabaseError;

#[derive(Default)]
struct State {
    users: HashMap<Uuid, User>,
    refresh_tokens: HashMap<String, RefreshTokenRecord>,
}

/// Process-local credential store.
///
/// One mutex guards both tables, so every operation is atomic with respect
/// to every other. Nothing survives a restart.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    state: Mutex<State>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an account as-is, e.g. one provisioned without a password
    pub fn insert_user(&self, user: User) -> Result<(), DatabaseError> {
        let mut state = self.lock()?;
        if state.users.values().any(|u| u.email == user.email) {
            return Err(DatabaseError::UniqueConstraintViolation(
                "Email already registered".to_string(),
            ));
        }
        state.users.insert(user.id, user);
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, DatabaseError> {
        self.state
            .lock()
            .map_err(|_| DatabaseError::UnexpectedError("credential store lock poisoned".to_string()))
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        let state = self.lock()?;
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    async fn create_user(&self, email: &str, hashed_password: &str) -> Result<User, DatabaseError> {
        let mut state = self.lock()?;
        if state.users.values().any(|u| u.email == email) {
            return Err(DatabaseError::UniqueConstraintViolation(
                "Email already registered".to_string(),
            ));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            hashed_password: Some(hashed_password.to_string()),
            is_entitled: false,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_user(
        &self,
        id: Uuid,
        email: &str,
        hashed_password: &str,
    ) -> Result<User, DatabaseError> {
        let mut state = self.lock()?;
        if state.users.values().any(|u| u.email == email && u.id != id) {
            return Err(DatabaseError::UniqueConstraintViolation(
                "Email already registered".to_string(),
            ));
        }

        let user = state
            .users
            .get_mut(&id)
            .ok_or_else(|| DatabaseError::NotFound("User not found".to_string()))?;
        user.email = email.to_string();
        user.hashed_password = Some(hashed_password.to_string());
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn create_refresh_token(
        &self,
        token: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<RefreshTokenRecord, DatabaseError> {
        let mut state = self.lock()?;
        if !state.users.contains_key(&user_id) {
            return Err(DatabaseError::NotFound("User not found".to_string()));
        }

        let token_hash = hash_refresh_token(token);
        if state.refresh_tokens.contains_key(&token_hash) {
            return Err(DatabaseError::UniqueConstraintViolation(
                "Refresh token already exists".to_string(),
            ));
        }

        let now = Utc::now();
        let record = RefreshTokenRecord {
            token_hash: token_hash.clone(),
            user_id,
            created_at: now,
            updated_at: now,
            expires_at,
            revoked_at: None,
        };
        state.refresh_tokens.insert(token_hash, record.clone());
        Ok(record)
    }

    async fn find_refresh_token(
        &self,
        token: &str,
    ) -> Result<Option<RefreshTokenRecord>, DatabaseError> {
        let state = self.lock()?;
        Ok(state.refresh_tokens.get(&hash_refresh_token(token)).cloned())
    }

    async fn revoke_refresh_token(&self, token: &str) -> Result<(), DatabaseError> {
        let mut state = self.lock()?;
        if let Some(record) = state.refresh_tokens.get_mut(&hash_refresh_token(token)) {
            if record.revoked_at.is_none() {
                let now = Utc::now();
                record.revoked_at = Some(now);
                record.updated_at = now;
            }
        }
        Ok(())
    }

    async fn mark_user_entitled(&self, user_id: Uuid) -> Result<(), DatabaseError> {
        let mut state = self.lock()?;
        let user = state
            .users
            .get_mut(&user_id)
            .ok_or_else(|| DatabaseError::NotFound("User not found".to_string()))?;
        user.is_entitled = true;
        user.updated_at = Utc::now();
        Ok(())
    }
}
