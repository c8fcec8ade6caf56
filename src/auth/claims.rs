/// JWT Claims structure
///
/// Registered claims (RFC 7519) carried by an access token.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TokenError;

/// JWT Claims for access tokens
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (user ID as UUID string)
    pub sub: String,
    /// Issuer
    pub iss: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    /// Create claims for `user_id` valid for `ttl_seconds` from `now`
    pub fn new(user_id: Uuid, issuer: &str, now: DateTime<Utc>, ttl_seconds: i64) -> Self {
        let iat = now.timestamp();
        Self {
            sub: user_id.to_string(),
            iss: issuer.to_string(),
            iat,
            exp: iat + ttl_seconds,
        }
    }

    /// Extract user ID from claims
    pub fn user_id(&self) -> Result<Uuid, TokenError> {
        Uuid::parse_str(&self.sub).map_err(|_| TokenError::MalformedSubject)
    }

    /// A token is usable strictly before its expiry second
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() >= self.exp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claims_creation() {
        let user_id = Uuid::new_v4();
        let now = Utc::now();
        let claims = Claims::new(user_id, "quill", now, 3600);

        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.iss, "quill");
        assert_eq!(claims.exp - claims.iat, 3600);
        assert!(!claims.is_expired_at(now));
    }

    #[test]
    fn test_expiry_boundary() {
        let now = Utc::now();
        let claims = Claims::new(Uuid::new_v4(), "quill", now, 10);

        assert!(!claims.is_expired_at(now + chrono::Duration::seconds(9)));
        assert!(claims.is_expired_at(now + chrono::Duration::seconds(10)));
    }

    #[test]
    fn test_invalid_user_id() {
        let mut claims = Claims::new(Uuid::new_v4(), "quill", Utc::now(), 3600);
        claims.sub = "invalid-uuid".to_string();

        assert_eq!(claims.user_id(), Err(TokenError::MalformedSubject));
    }
}
