/// Authorization header parsing
///
/// Missing headers or wrong schemes are ordinary 401s, never panics.

use actix_web::http::header::{HeaderMap, AUTHORIZATION};

use crate::error::{AuthError, UnauthorizedReason};

/// Extract `<token>` from `Authorization: Bearer <token>`
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    extract_credential(headers, "Bearer ")
}

/// Extract `<key>` from `Authorization: ApiKey <key>`
pub fn extract_api_key(headers: &HeaderMap) -> Result<&str, AuthError> {
    extract_credential(headers, "ApiKey ")
}

fn extract_credential<'a>(headers: &'a HeaderMap, scheme: &str) -> Result<&'a str, AuthError> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix(scheme))
        .map(str::trim)
        .filter(|credential| !credential.is_empty())
        .ok_or(AuthError::Unauthorized(UnauthorizedReason::MissingCredentials))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::header::HeaderValue;

    fn headers_with(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_bearer_token_is_extracted() {
        let headers = headers_with("Bearer abc.def.ghi");
        assert_eq!(extract_bearer_token(&headers), Ok("abc.def.ghi"));
    }

    #[test]
    fn test_missing_header() {
        let headers = HeaderMap::new();
        let result = extract_bearer_token(&headers);
        assert_eq!(
            result,
            Err(AuthError::Unauthorized(UnauthorizedReason::MissingCredentials))
        );
    }

    #[test]
    fn test_malformed_headers_are_rejected() {
        for value in ["Bearer", "Bearer ", "Basic dXNlcjpwYXNz", "BearerToken", "bearer abc"] {
            assert!(
                extract_bearer_token(&headers_with(value)).is_err(),
                "Should reject malformed header: {}",
                value
            );
        }
    }

    #[test]
    fn test_api_key_is_extracted() {
        let headers = headers_with("ApiKey f271c81ff7084ee5b99a5091b42d486e");
        assert_eq!(
            extract_api_key(&headers),
            Ok("f271c81ff7084ee5b99a5091b42d486e")
        );
        assert!(extract_bearer_token(&headers).is_err());
    }
}
