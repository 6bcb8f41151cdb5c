use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::TokenRejection;

pub const CLAIM_ISSUED_AT: &str = "iat";
pub const CLAIM_EXPIRES_AT: &str = "exp";
pub const CLAIM_NOT_BEFORE: &str = "nbf";
pub const CLAIM_ISSUER: &str = "iss";
pub const CLAIM_SUBJECT: &str = "sub";
pub const CLAIM_AUDIENCE: &str = "aud";
pub const CLAIM_USER: &str = "user";

/// Claims stamped into a freshly issued token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    pub issued_at: i64,
    pub expires_at: Option<i64>,
    pub not_before: Option<i64>,
    pub issuer: Option<String>,
    pub subject: Option<String>,
    pub audience: Option<String>,
    pub user: String,
}

impl TokenClaims {
    pub fn new(user: impl Into<String>, issued_at: i64) -> Self {
        Self {
            issued_at,
            expires_at: None,
            not_before: None,
            issuer: None,
            subject: None,
            audience: None,
            user: user.into(),
        }
    }

    /// Wire representation: time claims are decimal strings.
    pub fn to_wire(&self) -> WireClaims<'_> {
        WireClaims {
            iat: self.issued_at.to_string(),
            exp: self.expires_at.map(|value| value.to_string()),
            nbf: self.not_before.map(|value| value.to_string()),
            iss: self.issuer.as_deref(),
            sub: self.subject.as_deref(),
            aud: self.audience.as_deref(),
            user: &self.user,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WireClaims<'a> {
    iat: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    exp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    nbf: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    iss: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sub: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    aud: Option<&'a str>,
    user: &'a str,
}

/// Claims read back from a presented token. Every field is optional here;
/// the verifier decides which absences are fatal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresentedClaims {
    pub issued_at: Option<i64>,
    pub expires_at: Option<i64>,
    pub not_before: Option<i64>,
    pub issuer: Option<String>,
    pub subject: Option<String>,
    pub audience: Option<String>,
    pub user: Option<String>,
}

impl TryFrom<Map<String, Value>> for PresentedClaims {
    type Error = TokenRejection;

    fn try_from(mut value: Map<String, Value>) -> Result<Self, Self::Error> {
        Ok(Self {
            // Informational only; an unreadable iat reads as absent.
            issued_at: time_claim(value.get(CLAIM_ISSUED_AT)).ok().flatten(),
            expires_at: time_claim(value.get(CLAIM_EXPIRES_AT))?,
            not_before: time_claim(value.get(CLAIM_NOT_BEFORE))?,
            issuer: text_claim(value.remove(CLAIM_ISSUER)),
            subject: text_claim(value.remove(CLAIM_SUBJECT)),
            audience: text_claim(value.remove(CLAIM_AUDIENCE)),
            user: text_claim(value.remove(CLAIM_USER)),
        })
    }
}

// Non-string values read as absent.
fn text_claim(value: Option<Value>) -> Option<String> {
    match value {
        Some(Value::String(text)) => Some(text),
        _ => None,
    }
}

// Accepts decimal strings (as issued here) and JSON integers.
fn time_claim(value: Option<&Value>) -> Result<Option<i64>, TokenRejection> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => text
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| TokenRejection::Malformed),
        Some(Value::Number(number)) => number
            .as_i64()
            .map(Some)
            .ok_or(TokenRejection::Malformed),
        Some(_) => Err(TokenRejection::Malformed),
    }
}
