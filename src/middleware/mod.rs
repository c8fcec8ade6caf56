/// Middleware module
///
/// Request guards for access-token protected routes.

mod access_token;

pub use access_token::{AccessTokenGuard, AuthenticatedUser};
