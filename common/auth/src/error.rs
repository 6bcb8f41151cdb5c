use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::config::SignatureAlgorithm;

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no signature secret configured (SignatureSecret)")]
    MissingSecret,
    #[error("no signature algorithm configured (SignatureAlgorithm)")]
    MissingAlgorithm,
    #[error("unsupported signature algorithm '{0}'; expected HS256, HS384 or HS512")]
    UnsupportedAlgorithm(String),
    #[error(
        "the secret length must be {expected} with {algorithm} (current length is {actual})"
    )]
    KeyLength {
        algorithm: SignatureAlgorithm,
        expected: usize,
        actual: usize,
    },
    #[error("failed to sign token: {0}")]
    Signing(String),
    #[error("no authn provider configured")]
    NoProvider,
    #[error("password mismatch")]
    Denied,
    #[error("user not found")]
    UserNotFound,
    #[error("authn provider failure: {0}")]
    Provider(String),
    #[error("token rejected: {}", .0.description())]
    Token(TokenRejection),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Denied | AuthError::UserNotFound | AuthError::Token(_) => {
                StatusCode::UNAUTHORIZED
            }
            AuthError::MissingSecret
            | AuthError::MissingAlgorithm
            | AuthError::UnsupportedAlgorithm(_)
            | AuthError::KeyLength { .. }
            | AuthError::Signing(_)
            | AuthError::NoProvider
            | AuthError::Provider(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            AuthError::MissingSecret
                | AuthError::MissingAlgorithm
                | AuthError::UnsupportedAlgorithm(_)
                | AuthError::KeyLength { .. }
                | AuthError::Signing(_)
        )
    }
}

impl From<TokenRejection> for AuthError {
    fn from(value: TokenRejection) -> Self {
        Self::Token(value)
    }
}

/// Reason a presented token was refused. Every kind surfaces to the client as
/// `error="invalid_token"` with [`TokenRejection::description`] as the
/// `error_description`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRejection {
    Malformed,
    NoneAlgorithm,
    IssuerMismatch,
    AudienceMismatch,
    SubjectMismatch,
    Expired,
    ExpirationMissing,
    NotYetValid,
    UserMissing,
}

impl TokenRejection {
    pub fn description(&self) -> &'static str {
        match self {
            TokenRejection::Malformed | TokenRejection::NoneAlgorithm => "Token is malformed",
            TokenRejection::IssuerMismatch => "Issuer is not valid",
            TokenRejection::AudienceMismatch => "Audience is not valid",
            TokenRejection::SubjectMismatch => "Subject is not valid",
            TokenRejection::Expired => "Token expired",
            TokenRejection::ExpirationMissing => "Expiration is missing in token",
            TokenRejection::NotYetValid => "Token can't be processed now due to nbf field",
            TokenRejection::UserMissing => "Username was not in token",
        }
    }

    /// Stable label used for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenRejection::Malformed => "malformed",
            TokenRejection::NoneAlgorithm => "none_algorithm",
            TokenRejection::IssuerMismatch => "issuer_mismatch",
            TokenRejection::AudienceMismatch => "audience_mismatch",
            TokenRejection::SubjectMismatch => "subject_mismatch",
            TokenRejection::Expired => "expired",
            TokenRejection::ExpirationMissing => "expiration_missing",
            TokenRejection::NotYetValid => "not_yet_valid",
            TokenRejection::UserMissing => "user_missing",
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = match &self {
            AuthError::Denied | AuthError::UserNotFound => "AUTH_CREDENTIALS",
            AuthError::Token(_) => "AUTH_TOKEN",
            AuthError::NoProvider | AuthError::Provider(_) => "AUTH_PROVIDER",
            _ => "AUTH_CONFIG",
        };
        // Configuration details stay in the server log.
        let message = if status == StatusCode::UNAUTHORIZED {
            match &self {
                AuthError::Token(rejection) => rejection.description().to_string(),
                _ => "Invalid credentials".to_string(),
            }
        } else {
            "Internal server error".to_string()
        };

        (status, Json(ErrorBody { code, message })).into_response()
    }
}
