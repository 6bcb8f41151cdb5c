use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use axum::http::{request::Parts, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::claims::PresentedClaims;
use crate::error::TokenRejection;

/// Why a request did not carry a usable bearer credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BearerError {
    /// No `Authorization` header at all.
    Missing,
    /// Header present but not `Bearer <token>`.
    InvalidRequest,
}

/// Pulls the bearer token out of the request headers.
pub fn bearer_token(headers: &HeaderMap) -> Result<String, BearerError> {
    let value = headers.get(AUTHORIZATION).ok_or(BearerError::Missing)?;
    parse_bearer(value)
}

fn parse_bearer(value: &HeaderValue) -> Result<String, BearerError> {
    let raw = value.to_str().map_err(|_| BearerError::InvalidRequest)?;

    // The remainder is passed on untouched; stray spaces make it malformed.
    let token = raw
        .strip_prefix("Bearer ")
        .ok_or(BearerError::InvalidRequest)?;

    if token.is_empty() {
        return Err(BearerError::InvalidRequest);
    }

    Ok(token.to_owned())
}

/// Error response for a protected location, rendered with a
/// `WWW-Authenticate: Bearer realm="..."` challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerChallenge {
    realm: String,
    kind: ChallengeKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChallengeKind {
    Unauthenticated,
    InvalidRequest,
    InvalidToken(TokenRejection),
}

impl BearerChallenge {
    pub fn unauthenticated(realm: impl Into<String>) -> Self {
        Self {
            realm: realm.into(),
            kind: ChallengeKind::Unauthenticated,
        }
    }

    pub fn invalid_request(realm: impl Into<String>) -> Self {
        Self {
            realm: realm.into(),
            kind: ChallengeKind::InvalidRequest,
        }
    }

    pub fn invalid_token(realm: impl Into<String>, rejection: TokenRejection) -> Self {
        Self {
            realm: realm.into(),
            kind: ChallengeKind::InvalidToken(rejection),
        }
    }

    pub fn from_bearer_error(realm: impl Into<String>, error: BearerError) -> Self {
        match error {
            BearerError::Missing => Self::unauthenticated(realm),
            BearerError::InvalidRequest => Self::invalid_request(realm),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.kind {
            ChallengeKind::InvalidRequest => StatusCode::BAD_REQUEST,
            ChallengeKind::Unauthenticated | ChallengeKind::InvalidToken(_) => {
                StatusCode::UNAUTHORIZED
            }
        }
    }

    /// Value of the `WWW-Authenticate` header.
    pub fn header_value(&self) -> String {
        let realm = self.realm.replace('"', "\\\"");
        match self.kind {
            ChallengeKind::Unauthenticated => format!("Bearer realm=\"{realm}\""),
            ChallengeKind::InvalidRequest => format!(
                "Bearer realm=\"{realm}\", error=\"invalid_request\", error_description=\"Authentication type must be Bearer\""
            ),
            ChallengeKind::InvalidToken(rejection) => format!(
                "Bearer realm=\"{realm}\", error=\"invalid_token\", error_description=\"{}\"",
                rejection.description()
            ),
        }
    }
}

impl IntoResponse for BearerChallenge {
    fn into_response(self) -> Response {
        let status = self.status();
        match HeaderValue::from_str(&self.header_value()) {
            Ok(challenge) => (status, [(WWW_AUTHENTICATE, challenge)]).into_response(),
            Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        }
    }
}

/// Identity established by a verified bearer token, stored in request
/// extensions by the protecting middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user: String,
    pub claims: PresentedClaims,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Only reachable behind the bearer middleware.
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}
