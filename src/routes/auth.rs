/// Session Routes
///
/// Login, access token refresh, and refresh token revocation. Refresh and
/// revoke take the refresh token as `Authorization: Bearer <refresh token>`.

use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth::extract_bearer_token;
use crate::error::AppError;
use crate::routes::users::UserResponse;
use crate::session::AuthSessionService;

/// User login request
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    /// Requested access token lifetime; defaulted and capped at 3600
    pub expires_in_seconds: Option<i64>,
}

/// Login response: the user plus both tokens
#[derive(Serialize)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

/// Refresh response: a new access token only
#[derive(Serialize)]
pub struct RefreshResponse {
    pub token: String,
    pub expires_in: i64,
}

/// POST /api/login
///
/// # Errors
/// - 401 `INVALID_CREDENTIALS`: unknown email or wrong password (same response for both)
/// - 500: hashing, signing or entropy failure
pub async fn login(
    form: web::Json<LoginRequest>,
    sessions: web::Data<AuthSessionService>,
) -> Result<HttpResponse, AppError> {
    let session = sessions
        .login(&form.email, &form.password, form.expires_in_seconds)
        .await?;

    Ok(HttpResponse::Ok().json(LoginResponse {
        expires_in: session.access_token.expires_in(),
        user: session.user.into(),
        token: session.access_token.token,
        refresh_token: session.refresh_token,
    }))
}

/// POST /api/refresh
///
/// # Errors
/// - 401: missing, unknown, expired or revoked refresh token
pub async fn refresh(
    req: HttpRequest,
    sessions: web::Data<AuthSessionService>,
) -> Result<HttpResponse, AppError> {
    let refresh_token = extract_bearer_token(req.headers())?;
    let access_token = sessions.refresh(refresh_token).await?;

    Ok(HttpResponse::Ok().json(RefreshResponse {
        expires_in: access_token.expires_in(),
        token: access_token.token,
    }))
}

/// POST /api/revoke
///
/// 204 on success, including repeated revokes of the same token.
///
/// # Errors
/// - 401: missing or unknown refresh token
pub async fn revoke(
    req: HttpRequest,
    sessions: web::Data<AuthSessionService>,
) -> Result<HttpResponse, AppError> {
    let refresh_token = extract_bearer_token(req.headers())?;
    sessions.revoke(refresh_token).await?;

    Ok(HttpResponse::NoContent().finish())
}
