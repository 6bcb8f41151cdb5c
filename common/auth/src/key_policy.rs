//! Secret length policy applied before every signing or verification call.

use tracing::error;

use crate::config::{Secret, SignatureAlgorithm};
use crate::error::{AuthError, AuthResult};

/// Exact secret length in bytes required for `algorithm`.
pub const fn required_key_len(algorithm: SignatureAlgorithm) -> usize {
    match algorithm {
        SignatureAlgorithm::Hs256 => 32,
        SignatureAlgorithm::Hs384 => 48,
        SignatureAlgorithm::Hs512 => 64,
    }
}

pub fn check(secret: &Secret, algorithm: SignatureAlgorithm) -> AuthResult<()> {
    let expected = required_key_len(algorithm);
    let actual = secret.len();
    if actual != expected {
        error!(
            %algorithm,
            expected,
            actual,
            "The secret length must be {expected} with {algorithm} (current length is {actual})"
        );
        return Err(AuthError::KeyLength {
            algorithm,
            expected,
            actual,
        });
    }
    Ok(())
}
