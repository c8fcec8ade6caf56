/// Session orchestration
///
/// Login, refresh and revoke on top of the auth primitives and a
/// `CredentialStore`. The service keeps no mutable state of its own, so one
/// instance is shared by every worker.

use std::sync::Arc;

use actix_web::http::header::HeaderMap;
use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::auth::{
    extract_bearer_token, generate_refresh_token, hash_password, validate_password,
    verify_dummy_password, verify_password, AccessToken, AccessTokenCodec, PasswordVerification,
    RefreshTokenState,
};
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError, CryptoError, UnauthorizedReason};
use crate::store::{CredentialStore, User};
use crate::validators::is_valid_email;

/// Everything a successful login hands back to the client
#[derive(Debug, Clone)]
pub struct LoginSession {
    pub user: User,
    pub access_token: AccessToken,
    pub refresh_token: String,
}

#[derive(Clone)]
pub struct AuthSessionService {
    store: Arc<dyn CredentialStore>,
    codec: AccessTokenCodec,
    refresh_token_ttl: Duration,
}

impl AuthSessionService {
    pub fn new(store: Arc<dyn CredentialStore>, config: &JwtSettings) -> Self {
        Self {
            store,
            codec: AccessTokenCodec::new(config),
            refresh_token_ttl: Duration::seconds(config.refresh_token_expiry),
        }
    }

    /// Create an account with a local password
    ///
    /// # Errors
    /// - `Validation` for a malformed email or unusable password
    /// - `Database(UniqueConstraintViolation)` if the email is taken
    pub async fn register(&self, email: &str, password: &str) -> Result<User, AppError> {
        let email = is_valid_email(email)?;
        validate_password(password)?;

        let hashed = hash_blocking(password.to_string()).await?;
        let user = self.store.create_user(&email, &hashed).await?;

        tracing::info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    /// Replace the email and password of an authenticated user
    pub async fn update_credentials(
        &self,
        user_id: Uuid,
        email: &str,
        password: &str,
    ) -> Result<User, AppError> {
        let email = is_valid_email(email)?;
        validate_password(password)?;

        let hashed = hash_blocking(password.to_string()).await?;
        let user = self.store.update_user(user_id, &email, &hashed).await?;

        tracing::info!(user_id = %user.id, "User credentials updated");
        Ok(user)
    }

    /// Authenticate with email and password and open a new session
    ///
    /// Every credential problem surfaces as `InvalidCredentials`; the actual
    /// cause is only logged. Unknown accounts still pay for one bcrypt
    /// verification. Each success persists one more refresh token.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        requested_ttl: Option<i64>,
    ) -> Result<LoginSession, AppError> {
        let user = match self.store.find_user_by_email(email.trim()).await? {
            Some(user) => user,
            None => {
                dummy_verify_blocking(password.to_string()).await?;
                tracing::info!("Login rejected: unknown email");
                return Err(AuthError::InvalidCredentials.into());
            }
        };

        let hashed = match &user.hashed_password {
            Some(hashed) => hashed.clone(),
            None => {
                dummy_verify_blocking(password.to_string()).await?;
                tracing::info!(user_id = %user.id, "Login rejected: account has no password");
                return Err(AuthError::InvalidCredentials.into());
            }
        };

        if verify_blocking(password.to_string(), hashed).await? == PasswordVerification::Mismatch {
            tracing::info!(user_id = %user.id, "Login rejected: wrong password");
            return Err(AuthError::InvalidCredentials.into());
        }

        let access_token = self.codec.issue(user.id, requested_ttl)?;
        let refresh_token = generate_refresh_token()?;
        self.store
            .create_refresh_token(&refresh_token, user.id, Utc::now() + self.refresh_token_ttl)
            .await?;

        tracing::info!(user_id = %user.id, "User logged in");
        Ok(LoginSession {
            user,
            access_token,
            refresh_token,
        })
    }

    /// Mint a new access token from an active refresh token.
    ///
    /// The refresh token is not rotated.
    pub async fn refresh(&self, refresh_token: &str) -> Result<AccessToken, AppError> {
        let record = self
            .store
            .find_refresh_token(refresh_token)
            .await?
            .ok_or(AppError::unauthorized(UnauthorizedReason::UnknownRefreshToken))?;

        match record.state_at(Utc::now()) {
            RefreshTokenState::Expired => {
                Err(AppError::unauthorized(UnauthorizedReason::RefreshTokenExpired))
            }
            RefreshTokenState::Revoked => {
                Err(AppError::unauthorized(UnauthorizedReason::RefreshTokenRevoked))
            }
            RefreshTokenState::Active => {
                let access_token = self.codec.issue(record.user_id, None)?;
                tracing::info!(user_id = %record.user_id, "Access token refreshed");
                Ok(access_token)
            }
        }
    }

    /// Revoke a refresh token. Idempotent for known tokens.
    ///
    /// Expired tokens are stamped too; an already revoked token keeps its
    /// first `revoked_at`.
    pub async fn revoke(&self, refresh_token: &str) -> Result<(), AppError> {
        let record = self
            .store
            .find_refresh_token(refresh_token)
            .await?
            .ok_or(AppError::unauthorized(UnauthorizedReason::UnknownRefreshToken))?;

        let state = record.state_at(Utc::now());
        self.store.revoke_refresh_token(refresh_token).await?;

        tracing::info!(user_id = %record.user_id, previous_state = ?state, "Refresh token revoked");
        Ok(())
    }

    /// Resolve a bearer access token to the user it was issued to
    pub fn authenticate(&self, bearer_token: &str) -> Result<Uuid, AppError> {
        self.codec.verify(bearer_token).map_err(AppError::from)
    }

    /// `authenticate` applied to an `Authorization: Bearer` header
    pub fn authenticate_headers(&self, headers: &HeaderMap) -> Result<Uuid, AppError> {
        let token = extract_bearer_token(headers)?;
        self.authenticate(token)
    }

    /// Grant the paid entitlement to a user
    pub async fn upgrade_entitlement(&self, user_id: Uuid) -> Result<(), AppError> {
        self.store.mark_user_entitled(user_id).await?;
        Ok(())
    }
}

async fn hash_blocking(password: String) -> Result<String, CryptoError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| CryptoError::Hashing(e.to_string()))?
}

async fn verify_blocking(
    password: String,
    hashed: String,
) -> Result<PasswordVerification, CryptoError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hashed))
        .await
        .map_err(|e| CryptoError::Hashing(e.to_string()))?
}

async fn dummy_verify_blocking(password: String) -> Result<(), CryptoError> {
    tokio::task::spawn_blocking(move || verify_dummy_password(&password))
        .await
        .map_err(|e| CryptoError::Hashing(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TokenError;
    use crate::store::InMemoryCredentialStore;

    fn service() -> (AuthSessionService, Arc<InMemoryCredentialStore>) {
        let store = Arc::new(InMemoryCredentialStore::new());
        let service = AuthSessionService::new(store.clone(), &JwtSettings::new("session-test-secret"));
        (service, store)
    }

    fn assert_unauthorized(result: Result<impl std::fmt::Debug, AppError>, expected: UnauthorizedReason) {
        match result {
            Err(AppError::Auth(AuthError::Unauthorized(reason))) => assert_eq!(reason, expected),
            other => panic!("Expected Unauthorized({:?}), got {:?}", expected, other),
        }
    }

    #[tokio::test]
    async fn test_login_issues_both_tokens() {
        let (service, store) = service();
        let user = service.register("a@x.com", "secret1").await.expect("Failed to register");

        let session = service.login("a@x.com", "secret1", None).await.expect("Failed to login");

        assert_eq!(session.user.id, user.id);
        assert_eq!(service.authenticate(&session.access_token.token).unwrap(), user.id);
        assert_eq!(session.refresh_token.len(), 64);

        let record = store
            .find_refresh_token(&session.refresh_token)
            .await
            .unwrap()
            .expect("Refresh token was not persisted");
        assert_eq!(record.user_id, user.id);
        assert!(record.revoked_at.is_none());
        let lifetime = record.expires_at - record.created_at;
        assert!((lifetime - Duration::days(60)).num_seconds().abs() <= 1);
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let (service, store) = service();
        service.register("a@x.com", "secret1").await.expect("Failed to register");

        let now = Utc::now();
        store
            .insert_user(User {
                id: Uuid::new_v4(),
                email: "sso@x.com".to_string(),
                hashed_password: None,
                is_entitled: false,
                created_at: now,
                updated_at: now,
            })
            .expect("Failed to seed user");

        for (email, password) in [
            ("a@x.com", "wrong"),
            ("nobody@x.com", "secret1"),
            ("sso@x.com", "secret1"),
        ] {
            let result = service.login(email, password, None).await;
            assert!(
                matches!(result, Err(AppError::Auth(AuthError::InvalidCredentials))),
                "Expected InvalidCredentials for {}",
                email
            );
        }
    }

    #[tokio::test]
    async fn test_login_with_suffix_past_72_bytes_is_rejected() {
        let (service, _) = service();
        let stored = "p".repeat(72);
        service.register("a@x.com", &stored).await.expect("Failed to register");

        let result = service
            .login("a@x.com", &format!("{}suffix", stored), None)
            .await;
        assert!(matches!(result, Err(AppError::Auth(AuthError::InvalidCredentials))));

        assert!(service.login("a@x.com", &stored, None).await.is_ok());
    }

    #[tokio::test]
    async fn test_sessions_accumulate() {
        let (service, _) = service();
        service.register("a@x.com", "secret1").await.expect("Failed to register");

        let first = service.login("a@x.com", "secret1", None).await.unwrap();
        let second = service.login("a@x.com", "secret1", None).await.unwrap();

        assert_ne!(first.refresh_token, second.refresh_token);
        assert!(service.refresh(&first.refresh_token).await.is_ok());
        assert!(service.refresh(&second.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_login_clamps_requested_ttl() {
        let (service, _) = service();
        service.register("a@x.com", "secret1").await.expect("Failed to register");

        let session = service
            .login("a@x.com", "secret1", Some(999_999))
            .await
            .expect("Failed to login");

        assert_eq!(session.access_token.expires_in(), 3600);
    }

    #[tokio::test]
    async fn test_refresh_does_not_rotate() {
        let (service, _) = service();
        let user = service.register("a@x.com", "secret1").await.unwrap();
        let session = service.login("a@x.com", "secret1", None).await.unwrap();

        let first = service.refresh(&session.refresh_token).await.expect("First refresh failed");
        let second = service.refresh(&session.refresh_token).await.expect("Second refresh failed");

        assert_eq!(service.authenticate(&first.token).unwrap(), user.id);
        assert_eq!(service.authenticate(&second.token).unwrap(), user.id);
    }

    #[tokio::test]
    async fn test_refresh_unknown_token() {
        let (service, _) = service();
        assert_unauthorized(
            service.refresh("deadbeef").await,
            UnauthorizedReason::UnknownRefreshToken,
        );
    }

    #[tokio::test]
    async fn test_refresh_expired_token() {
        let (service, store) = service();
        let user = service.register("a@x.com", "secret1").await.unwrap();
        store
            .create_refresh_token("stale", user.id, Utc::now() - Duration::seconds(1))
            .await
            .unwrap();

        assert_unauthorized(
            service.refresh("stale").await,
            UnauthorizedReason::RefreshTokenExpired,
        );
    }

    #[tokio::test]
    async fn test_revoked_token_never_refreshes_again() {
        let (service, store) = service();
        service.register("a@x.com", "secret1").await.unwrap();
        let session = service.login("a@x.com", "secret1", None).await.unwrap();

        service.revoke(&session.refresh_token).await.expect("First revoke failed");
        let after_first = store.find_refresh_token(&session.refresh_token).await.unwrap();
        service.revoke(&session.refresh_token).await.expect("Second revoke failed");
        let after_second = store.find_refresh_token(&session.refresh_token).await.unwrap();

        assert_eq!(after_first, after_second);
        assert_unauthorized(
            service.refresh(&session.refresh_token).await,
            UnauthorizedReason::RefreshTokenRevoked,
        );
    }

    #[tokio::test]
    async fn test_revoke_stamps_expired_token() {
        let (service, store) = service();
        let user = service.register("a@x.com", "secret1").await.unwrap();
        store
            .create_refresh_token("stale", user.id, Utc::now() - Duration::days(1))
            .await
            .unwrap();

        service.revoke("stale").await.expect("Revoke of expired token failed");

        let record = store.find_refresh_token("stale").await.unwrap().unwrap();
        assert!(record.revoked_at.is_some());
    }

    #[tokio::test]
    async fn test_revoke_unknown_token() {
        let (service, _) = service();
        assert_unauthorized(
            service.revoke("deadbeef").await,
            UnauthorizedReason::UnknownRefreshToken,
        );
    }

    #[tokio::test]
    async fn test_authenticate_headers() {
        let (service, _) = service();
        let user = service.register("a@x.com", "secret1").await.unwrap();
        let session = service.login("a@x.com", "secret1", None).await.unwrap();

        let mut headers = HeaderMap::new();
        assert_unauthorized(
            service.authenticate_headers(&headers),
            UnauthorizedReason::MissingCredentials,
        );

        headers.insert(
            actix_web::http::header::AUTHORIZATION,
            format!("Bearer {}", session.access_token.token).parse().unwrap(),
        );
        assert_eq!(service.authenticate_headers(&headers).unwrap(), user.id);
    }

    #[tokio::test]
    async fn test_access_token_from_other_secret_is_rejected() {
        let (service, _) = service();
        let other = AccessTokenCodec::new(&JwtSettings::new("another-secret"));
        let token = other.issue(Uuid::new_v4(), None).unwrap();

        assert_unauthorized(
            service.authenticate(&token.token),
            UnauthorizedReason::Token(TokenError::InvalidSignature),
        );
    }

    #[tokio::test]
    async fn test_update_credentials_changes_login() {
        let (service, _) = service();
        let user = service.register("a@x.com", "secret1").await.unwrap();

        let updated = service
            .update_credentials(user.id, "b@x.com", "secret2")
            .await
            .expect("Failed to update credentials");
        assert_eq!(updated.email, "b@x.com");

        assert!(service.login("a@x.com", "secret1", None).await.is_err());
        assert!(service.login("b@x.com", "secret2", None).await.is_ok());
    }

    #[tokio::test]
    async fn test_upgrade_entitlement() {
        let (service, store) = service();
        let user = service.register("a@x.com", "secret1").await.unwrap();

        service.upgrade_entitlement(user.id).await.expect("Failed to upgrade");

        let stored = store.find_user_by_email("a@x.com").await.unwrap().unwrap();
        assert!(stored.is_entitled);
    }
}
