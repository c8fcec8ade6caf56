/// Payment provider webhook
///
/// Authenticated with `Authorization: ApiKey <key>`. Only `user.upgraded`
/// events do anything; everything else is acknowledged and dropped.

use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::auth::extract_api_key;
use crate::configuration::WebhookSettings;
use crate::error::{AppError, UnauthorizedReason};
use crate::session::AuthSessionService;

const UPGRADE_EVENT: &str = "user.upgraded";

#[derive(Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    pub data: WebhookEventData,
}

#[derive(Deserialize)]
pub struct WebhookEventData {
    pub user_id: Uuid,
}

/// POST /api/webhooks/entitlement
///
/// # Errors
/// - 401: missing or wrong api key
/// - 404: `user.upgraded` for an unknown user
pub async fn entitlement_webhook(
    req: HttpRequest,
    body: web::Json<WebhookEvent>,
    settings: web::Data<WebhookSettings>,
    sessions: web::Data<AuthSessionService>,
) -> Result<HttpResponse, AppError> {
    let presented = extract_api_key(req.headers())?;
    if !keys_match(presented, &settings.api_key) {
        return Err(AppError::unauthorized(UnauthorizedReason::InvalidApiKey));
    }

    if body.event != UPGRADE_EVENT {
        tracing::debug!(event = %body.event, "Ignoring webhook event");
        return Ok(HttpResponse::NoContent().finish());
    }

    sessions.upgrade_entitlement(body.data.user_id).await?;
    Ok(HttpResponse::NoContent().finish())
}

// Comparing fixed-length digests keeps the comparison time independent of the key.
fn keys_match(presented: &str, expected: &str) -> bool {
    Sha256::digest(presented.as_bytes()) == Sha256::digest(expected.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_match() {
        assert!(keys_match("f271c81ff7084ee5", "f271c81ff7084ee5"));
        assert!(!keys_match("f271c81ff7084ee5", "f271c81ff7084ee6"));
        assert!(!keys_match("", "f271c81ff7084ee5"));
    }
}
