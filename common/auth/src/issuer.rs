use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use tracing::{debug, error};

use crate::claims::TokenClaims;
use crate::error::{AuthError, AuthResult};
use crate::key_policy;
use crate::resolver::EffectiveConfig;

/// Mints signed bearer tokens for authenticated users.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenIssuer;

impl TokenIssuer {
    pub fn new() -> Self {
        Self
    }

    pub fn issue(&self, user: &str, config: &EffectiveConfig) -> AuthResult<String> {
        self.issue_at(user, config, Utc::now().timestamp())
    }

    /// Issues a token as if the current time were `now` (Unix seconds).
    pub fn issue_at(&self, user: &str, config: &EffectiveConfig, now: i64) -> AuthResult<String> {
        let secret = config.signature_secret.as_ref().ok_or_else(|| {
            error!("You must specify the SignatureSecret directive in configuration");
            AuthError::MissingSecret
        })?;
        let algorithm = config.signature_algorithm.ok_or_else(|| {
            error!("You must specify the SignatureAlgorithm directive in configuration");
            AuthError::MissingAlgorithm
        })?;
        key_policy::check(secret, algorithm)?;

        let claims = build_claims(user, config, now);
        let header = Header::new(algorithm.jwt_algorithm());
        let token = encode(
            &header,
            &claims.to_wire(),
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .map_err(|err| AuthError::Signing(err.to_string()))?;

        debug!(user, %algorithm, exp = ?claims.expires_at, "issued token");
        Ok(token)
    }
}

/// Claims for `user` at `now`. A negative delay omits the matching claim.
pub fn build_claims(user: &str, config: &EffectiveConfig, now: i64) -> TokenClaims {
    let mut claims = TokenClaims::new(user, now);
    claims.expires_at = config
        .exp_delay
        .filter(|delay| *delay >= 0)
        .map(|delay| now.saturating_add(delay));
    claims.not_before = config
        .nbf_delay
        .filter(|delay| *delay >= 0)
        .map(|delay| now.saturating_add(delay));
    claims.issuer = config.issuer.clone();
    claims.subject = config.subject.clone();
    claims.audience = config.audience.clone();
    claims
}
