/// Access Token Codec
///
/// Mints and verifies short-lived HS256 JWTs. Tokens are stateless: nothing
/// is persisted and a token stays valid until its `exp`, so lifetimes are
/// capped at one hour regardless of what the caller or configuration asks for.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::auth::claims::Claims;
use crate::configuration::JwtSettings;
use crate::error::{CryptoError, TokenError};

/// `iss` claim of every access token
pub const ACCESS_TOKEN_ISSUER: &str = "quill";

/// Ceiling (and default) lifetime of an access token, in seconds
pub const MAX_ACCESS_TOKEN_TTL: i64 = 3600;

const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;

/// A freshly signed access token
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// Seconds between issuance and expiry
    pub fn expires_in(&self) -> i64 {
        (self.expires_at - self.issued_at).num_seconds()
    }
}

/// Signs and verifies access tokens with a symmetric secret
#[derive(Clone)]
pub struct AccessTokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    default_ttl: i64,
}

impl AccessTokenCodec {
    pub fn new(config: &JwtSettings) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            default_ttl: clamp_ttl(config.access_token_expiry).unwrap_or(MAX_ACCESS_TOKEN_TTL),
        }
    }

    /// Lifetime actually granted for a requested TTL.
    ///
    /// Absent or non-positive requests get the default; anything else is
    /// clamped to `MAX_ACCESS_TOKEN_TTL`, never extended.
    pub fn effective_ttl(&self, requested: Option<i64>) -> i64 {
        requested.and_then(clamp_ttl).unwrap_or(self.default_ttl)
    }

    /// Issue a token for `user_id`, valid from now
    ///
    /// # Errors
    /// Returns `CryptoError::Signing` if the signing primitive fails
    pub fn issue(&self, user_id: Uuid, ttl: Option<i64>) -> Result<AccessToken, CryptoError> {
        self.issue_at(user_id, ttl, Utc::now())
    }

    /// Issue a token as if the current time were `now`
    pub fn issue_at(
        &self,
        user_id: Uuid,
        ttl: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<AccessToken, CryptoError> {
        let ttl = self.effective_ttl(ttl);
        let claims = Claims::new(user_id, ACCESS_TOKEN_ISSUER, now, ttl);

        let issued_at = DateTime::<Utc>::from_timestamp(claims.iat, 0)
            .ok_or_else(|| CryptoError::Signing("issue time out of range".to_string()))?;

        let token = encode(&Header::new(SIGNING_ALGORITHM), &claims, &self.encoding_key)
            .map_err(|e| CryptoError::Signing(e.to_string()))?;

        Ok(AccessToken {
            token,
            issued_at,
            expires_at: issued_at + Duration::seconds(ttl),
        })
    }

    /// Verify a token and return the user it was issued to
    pub fn verify(&self, token: &str) -> Result<Uuid, TokenError> {
        self.verify_claims_at(token, Utc::now())?.user_id()
    }

    /// Verify signature, algorithm, issuer and expiry against `now`
    pub fn verify_claims_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        // Checked before touching the key so a substituted `alg` never reaches verification.
        let header = decode_header(token).map_err(|_| TokenError::MalformedToken)?;
        if header.alg != SIGNING_ALGORITHM {
            return Err(TokenError::UnexpectedAlgorithm);
        }

        let mut validation = Validation::new(SIGNING_ALGORITHM);
        validation.set_issuer(&[ACCESS_TOKEN_ISSUER]);
        validation.set_required_spec_claims(&["exp", "iat", "iss", "sub"]);
        // Expiry is checked below against `now`, with no leeway.
        validation.validate_exp = false;
        validation.leeway = 0;

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| classify(e.kind()))?;

        if claims.is_expired_at(now) {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }
}

fn clamp_ttl(ttl: i64) -> Option<i64> {
    (ttl > 0).then(|| ttl.min(MAX_ACCESS_TOKEN_TTL))
}

fn classify(kind: &ErrorKind) -> TokenError {
    match kind {
        ErrorKind::InvalidSignature => TokenError::InvalidSignature,
        ErrorKind::InvalidAlgorithm => TokenError::UnexpectedAlgorithm,
        ErrorKind::InvalidIssuer => TokenError::UnexpectedIssuer,
        ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::MalformedToken,
    }
}
