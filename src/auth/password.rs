/// Password Hashing and Verification
///
/// Salted bcrypt digests at a fixed cost. Both operations are CPU-bound
/// (hundreds of milliseconds) and are run on a blocking worker by the
/// session service.

use bcrypt::{hash, verify, DEFAULT_COST};
use lazy_static::lazy_static;

use crate::error::{CryptoError, ValidationError};

/// bcrypt silently ignores input past 72 bytes
const MAX_PASSWORD_BYTES: usize = 72;

lazy_static! {
    /// Digest checked when there is no account to check against
    static ref DUMMY_HASH: Option<String> = hash("quill-dummy-password", DEFAULT_COST).ok();
}

/// Result of checking a plaintext against a stored digest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordVerification {
    Match,
    Mismatch,
}

/// Hash a password using bcrypt with a random salt
///
/// # Errors
/// Returns `CryptoError::Hashing` if bcrypt fails or the password is longer
/// than bcrypt can represent
pub fn hash_password(password: &str) -> Result<String, CryptoError> {
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(CryptoError::Hashing(format!(
            "password exceeds {} bytes",
            MAX_PASSWORD_BYTES
        )));
    }
    hash(password, DEFAULT_COST).map_err(|e| CryptoError::Hashing(e.to_string()))
}

/// Verify a password against its hash
///
/// A wrong password is `Ok(PasswordVerification::Mismatch)`, not an error.
/// Passwords over 72 bytes never match, since bcrypt would only compare
/// their prefix.
///
/// # Errors
/// Returns `CryptoError::Hashing` only when `hash` is not a well-formed bcrypt digest
pub fn verify_password(password: &str, hash: &str) -> Result<PasswordVerification, CryptoError> {
    if password.len() > MAX_PASSWORD_BYTES {
        return Ok(PasswordVerification::Mismatch);
    }
    match verify(password, hash) {
        Ok(true) => Ok(PasswordVerification::Match),
        Ok(false) => Ok(PasswordVerification::Mismatch),
        Err(e) => Err(CryptoError::Hashing(e.to_string())),
    }
}

/// Spend the cost of one verification without an account to verify against
///
/// Keeps a login for an unknown email as slow as one with a wrong password.
pub fn verify_dummy_password(password: &str) {
    if let Some(dummy) = DUMMY_HASH.as_ref() {
        let _ = verify(password, dummy);
    }
}

/// Reject passwords bcrypt cannot represent faithfully
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::EmptyField("password"));
    }
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(ValidationError::TooLong("password", MAX_PASSWORD_BYTES));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_password() {
        let password = "secret1";
        let hash = hash_password(password).expect("Failed to hash password");

        assert_ne!(password, hash);
        assert!(hash.starts_with("$2"));
    }

    #[test]
    fn test_same_password_gets_different_salts() {
        let first = hash_password("secret1").expect("Failed to hash password");
        let second = hash_password("secret1").expect("Failed to hash password");

        assert_ne!(first, second);
    }

    #[test]
    fn test_verify_password() {
        let hash = hash_password("secret1").expect("Failed to hash password");

        let outcome = verify_password("secret1", &hash).expect("Failed to verify password");
        assert_eq!(outcome, PasswordVerification::Match);
    }

    #[test]
    fn test_verify_wrong_password() {
        let hash = hash_password("secret1").expect("Failed to hash password");

        let outcome = verify_password("secret2", &hash).expect("Failed to verify password");
        assert_eq!(outcome, PasswordVerification::Mismatch);
    }

    #[test]
    fn test_password_sharing_a_72_byte_prefix_does_not_match() {
        let stored = "a".repeat(72);
        let hash = hash_password(&stored).expect("Failed to hash password");

        let longer = format!("{}EXTRA", stored);
        let outcome = verify_password(&longer, &hash).expect("Failed to verify password");
        assert_eq!(outcome, PasswordVerification::Mismatch);

        let outcome = verify_password(&stored, &hash).expect("Failed to verify password");
        assert_eq!(outcome, PasswordVerification::Match);
    }

    #[test]
    fn test_hash_rejects_overlong_password() {
        let result = hash_password(&"a".repeat(73));
        assert!(matches!(result, Err(CryptoError::Hashing(_))));
    }

    #[test]
    fn test_dummy_verification_does_not_panic() {
        verify_dummy_password("secret1");
        verify_dummy_password(&"a".repeat(100));
    }

    #[test]
    fn test_corrupt_hash_is_an_error() {
        let result = verify_password("secret1", "not-a-bcrypt-hash");
        assert!(matches!(result, Err(CryptoError::Hashing(_))));
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("secret1").is_ok());
        assert_eq!(
            validate_password(""),
            Err(ValidationError::EmptyField("password"))
        );
        assert_eq!(
            validate_password(&"a".repeat(73)),
            Err(ValidationError::TooLong("password", 72))
        );
    }
}
