/// User account routes
///
/// Registration and credential updates. The password hash never leaves the
/// server.

use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::AuthenticatedUser;
use crate::session::AuthSessionService;
use crate::store::User;

/// Email and password, used by both registration and update
#[derive(Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

/// Public view of a user
#[derive(Serialize, Deserialize, Debug)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_entitled: bool,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            created_at: user.created_at,
            updated_at: user.updated_at,
            is_entitled: user.is_entitled,
        }
    }
}

/// POST /api/users
///
/// # Errors
/// - 400: invalid email or password
/// - 409: email already registered
pub async fn create_user(
    form: web::Json<CredentialsRequest>,
    sessions: web::Data<AuthSessionService>,
) -> Result<HttpResponse, AppError> {
    let user = sessions.register(&form.email, &form.password).await?;
    Ok(HttpResponse::Created().json(UserResponse::from(user)))
}

/// PUT /api/users
///
/// **Requires a valid access token**; updates the caller's own account only.
pub async fn update_user(
    caller: web::ReqData<AuthenticatedUser>,
    form: web::Json<CredentialsRequest>,
    sessions: web::Data<AuthSessionService>,
) -> Result<HttpResponse, AppError> {
    let user = sessions
        .update_credentials(caller.user_id, &form.email, &form.password)
        .await?;
    Ok(HttpResponse::Ok().json(UserResponse::from(user)))
}
