/// Authentication primitives
///
/// Password hashing, access token signing/verification, refresh token
/// generation, and Authorization header parsing.

mod bearer;
mod claims;
mod jwt;
mod password;
mod refresh_token;

pub use bearer::{extract_api_key, extract_bearer_token};
pub use claims::Claims;
pub use jwt::{AccessToken, AccessTokenCodec, ACCESS_TOKEN_ISSUER, MAX_ACCESS_TOKEN_TTL};
pub use password::{
    hash_password, validate_password, verify_dummy_password, verify_password, PasswordVerification,
};
pub use refresh_token::{
    generate_refresh_token, hash_refresh_token, RefreshTokenRecord, RefreshTokenState,
};
