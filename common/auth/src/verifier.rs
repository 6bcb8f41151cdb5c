use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::claims::PresentedClaims;
use crate::config::{Secret, SignatureAlgorithm};
use crate::error::{AuthError, AuthResult, TokenRejection};
use crate::extractors::AuthenticatedUser;
use crate::key_policy;
use crate::resolver::EffectiveConfig;

/// Validates presented bearer tokens against the effective configuration.
///
/// Stateless: the same token verified twice yields the same outcome as long
/// as the clock and configuration do not move.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenVerifier;

impl TokenVerifier {
    pub fn new() -> Self {
        Self
    }

    pub fn verify(&self, token: &str, config: &EffectiveConfig) -> AuthResult<AuthenticatedUser> {
        self.verify_at(token, config, Utc::now().timestamp())
    }

    /// Runs the verification pipeline as if the current time were `now`.
    pub fn verify_at(
        &self,
        token: &str,
        config: &EffectiveConfig,
        now: i64,
    ) -> AuthResult<AuthenticatedUser> {
        let secret = config.signature_secret.as_ref().ok_or_else(|| {
            warn!("You must specify the SignatureSecret directive in configuration");
            AuthError::MissingSecret
        })?;
        let algorithm = config.signature_algorithm.ok_or_else(|| {
            warn!("You must specify the SignatureAlgorithm directive in configuration");
            AuthError::MissingAlgorithm
        })?;
        key_policy::check(secret, algorithm)?;

        let claims = decode_claims(token, secret, algorithm)?;
        check_claims(&claims, config, now)?;

        let user = claims.user.clone().ok_or_else(|| {
            warn!("Username was not in token");
            TokenRejection::UserMissing
        })?;
        debug!(user, "verified token");
        Ok(AuthenticatedUser { user, claims })
    }
}

fn decode_claims(
    token: &str,
    secret: &Secret,
    algorithm: SignatureAlgorithm,
) -> Result<PresentedClaims, TokenRejection> {
    confine_algorithm(token)?;

    let mut validation = Validation::new(algorithm.jwt_algorithm());
    // Claim checks below are done by hand so each failure has its own kind.
    validation.required_spec_claims.clear();
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;

    let data = decode::<Map<String, Value>>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|err| {
        warn!(error = %err, "Decoding process has failed, token is malformed");
        TokenRejection::Malformed
    })?;

    PresentedClaims::try_from(data.claims).inspect_err(|_| {
        warn!("Token carries a time claim that is not an integer");
    })
}

/// Refuses tokens whose header declares the `none` algorithm, whatever the
/// codec would make of them.
fn confine_algorithm(token: &str) -> Result<(), TokenRejection> {
    let encoded = token
        .split('.')
        .next()
        .filter(|part| !part.is_empty())
        .ok_or(TokenRejection::Malformed)?;
    let header: Map<String, Value> = URL_SAFE_NO_PAD
        .decode(encoded)
        .ok()
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        .ok_or_else(|| {
            warn!("Token header is not valid base64url JSON");
            TokenRejection::Malformed
        })?;

    match header.get("alg").and_then(Value::as_str) {
        Some(alg) if alg.eq_ignore_ascii_case("none") => {
            warn!("Token declares the none algorithm");
            Err(TokenRejection::NoneAlgorithm)
        }
        Some(_) => Ok(()),
        None => Err(TokenRejection::Malformed),
    }
}

fn check_claims(
    claims: &PresentedClaims,
    config: &EffectiveConfig,
    now: i64,
) -> Result<(), TokenRejection> {
    if mismatch(config.issuer.as_deref(), claims.issuer.as_deref()) {
        warn!("Token issuer does not match with configured issuer");
        return Err(TokenRejection::IssuerMismatch);
    }
    if mismatch(config.audience.as_deref(), claims.audience.as_deref()) {
        warn!("Token audience does not match with configured audience");
        return Err(TokenRejection::AudienceMismatch);
    }
    if mismatch(config.subject.as_deref(), claims.subject.as_deref()) {
        warn!("Token subject does not match with configured subject");
        return Err(TokenRejection::SubjectMismatch);
    }

    let leeway = config.leeway.unwrap_or(0);
    let expires_at = claims.expires_at.ok_or_else(|| {
        warn!("Missing exp in token");
        TokenRejection::ExpirationMissing
    })?;
    if expires_at.saturating_add(leeway) < now {
        warn!(exp = expires_at, now, leeway, "Token expired");
        return Err(TokenRejection::Expired);
    }

    if let Some(not_before) = claims.not_before {
        if not_before.saturating_sub(leeway) > now {
            warn!(
                nbf = not_before,
                now, leeway, "Nbf check failed, token can't be processed now"
            );
            return Err(TokenRejection::NotYetValid);
        }
    }

    Ok(())
}

// Only two present, differing values count; absence on either side passes.
fn mismatch(configured: Option<&str>, presented: Option<&str>) -> bool {
    matches!((configured, presented), (Some(expected), Some(actual)) if expected != actual)
}
