/// Refresh Token Management
///
/// Refresh tokens are:
/// - 32 bytes from the OS random source, hex-encoded (64 characters)
/// - Opaque to the client and only meaningful to the credential store
/// - Stored server side as a SHA-256 digest, never in plaintext
/// - Revocable; revocation and expiry are both terminal

use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::CryptoError;

const REFRESH_TOKEN_BYTES: usize = 32;

/// Generate a new cryptographically secure refresh token
///
/// # Errors
/// Returns `CryptoError::Entropy` if the OS random source fails. Callers must
/// not retry with a weaker source.
pub fn generate_refresh_token() -> Result<String, CryptoError> {
    let mut buffer = [0u8; REFRESH_TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut buffer)
        .map_err(|e| CryptoError::Entropy(e.to_string()))?;
    Ok(hex::encode(buffer))
}

/// Digest under which a refresh token is stored and looked up
pub fn hash_refresh_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Persisted refresh token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTokenRecord {
    pub token_hash: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

/// Lifecycle of a refresh token. Only `Active` may mint access tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTokenState {
    Active,
    Expired,
    Revoked,
}

impl RefreshTokenRecord {
    pub fn state_at(&self, now: DateTime<Utc>) -> RefreshTokenState {
        if self.expires_at <= now {
            RefreshTokenState::Expired
        } else if self.revoked_at.is_some() {
            RefreshTokenState::Revoked
        } else {
            RefreshTokenState::Active
        }
    }

    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        self.state_at(now) == RefreshTokenState::Active
    }
}
