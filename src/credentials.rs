//! Password hashing for the session facade.
//!
//! New credentials are Argon2id PHC strings. Accounts written by older
//! installs still hold plaintext, which is compared in constant time. The
//! store treats both as opaque text.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::rngs::OsRng;
use secrecy::{ExposeSecret, SecretString};
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::error::AuthError;

/// Hash a password into a PHC string with a fresh random salt.
pub fn hash_password(password: &SecretString) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.expose_secret().as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

/// Check a password against a stored credential.
///
/// Values that do not parse as a PHC hash are legacy plaintext and are
/// compared byte for byte in constant time.
pub fn verify_password(password: &SecretString, stored: &str) -> bool {
    let parsed = match PasswordHash::new(stored) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(error = %e, "Stored credential is not a password hash, comparing as plaintext");
            return constant_time_eq(password.expose_secret().as_bytes(), stored.as_bytes());
        }
    };
    Argon2::default()
        .verify_password(password.expose_secret().as_bytes(), &parsed)
        .is_ok()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
