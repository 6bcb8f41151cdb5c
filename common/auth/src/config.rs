use std::fmt;
use std::str::FromStr;

use jsonwebtoken::Algorithm;

use crate::error::AuthError;

/// HMAC variants accepted for signing and verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureAlgorithm {
    Hs256,
    Hs384,
    Hs512,
}

impl SignatureAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignatureAlgorithm::Hs256 => "HS256",
            SignatureAlgorithm::Hs384 => "HS384",
            SignatureAlgorithm::Hs512 => "HS512",
        }
    }

    /// Algorithm tag written to and expected in the token header.
    pub fn jwt_algorithm(&self) -> Algorithm {
        match self {
            SignatureAlgorithm::Hs256 => Algorithm::HS256,
            SignatureAlgorithm::Hs384 => Algorithm::HS384,
            SignatureAlgorithm::Hs512 => Algorithm::HS512,
        }
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignatureAlgorithm {
    type Err = AuthError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "HS256" => Ok(SignatureAlgorithm::Hs256),
            "HS384" => Ok(SignatureAlgorithm::Hs384),
            "HS512" => Ok(SignatureAlgorithm::Hs512),
            other => Err(AuthError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

/// Raw signing secret. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(Vec<u8>);

impl Secret {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret(<{} bytes>)", self.0.len())
    }
}

/// A configuration value together with whether an administrator set it.
///
/// A default value may be present without the explicit flag; resolution
/// only prefers explicitly set values across scopes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Setting<T> {
    value: Option<T>,
    explicit: bool,
}

impl<T> Setting<T> {
    pub fn unset() -> Self {
        Self {
            value: None,
            explicit: false,
        }
    }

    pub fn with_default(value: T) -> Self {
        Self {
            value: Some(value),
            explicit: false,
        }
    }

    pub fn set(&mut self, value: T) {
        self.value = Some(value);
        self.explicit = true;
    }

    pub fn is_set(&self) -> bool {
        self.explicit
    }

    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }
}

impl<T> Default for Setting<T> {
    fn default() -> Self {
        Self::unset()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Server,
    Directory,
}

/// Directives recognised in either configuration scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Directive {
    SignatureAlgorithm,
    SignatureSecret,
    Iss,
    Sub,
    Aud,
    ExpDelay,
    NbfDelay,
    Leeway,
    Provider,
}

impl Directive {
    pub const ALL: [Directive; 9] = [
        Directive::SignatureAlgorithm,
        Directive::SignatureSecret,
        Directive::Iss,
        Directive::Sub,
        Directive::Aud,
        Directive::ExpDelay,
        Directive::NbfDelay,
        Directive::Leeway,
        Directive::Provider,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Directive::SignatureAlgorithm => "SignatureAlgorithm",
            Directive::SignatureSecret => "SignatureSecret",
            Directive::Iss => "Iss",
            Directive::Sub => "Sub",
            Directive::Aud => "Aud",
            Directive::ExpDelay => "ExpDelay",
            Directive::NbfDelay => "NbfDelay",
            Directive::Leeway => "Leeway",
            Directive::Provider => "Provider",
        }
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Directive {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Directive::ALL
            .into_iter()
            .find(|directive| directive.name() == value)
            .ok_or_else(|| format!("unknown directive '{value}'"))
    }
}

pub const DEFAULT_EXP_DELAY: i64 = 3600;
pub const DEFAULT_NBF_DELAY: i64 = 0;
pub const DEFAULT_LEEWAY: i64 = 0;

/// Directives configured at one scope (server-wide or per directory).
///
/// Built once while configuration is loaded and only read afterwards.
#[derive(Debug, Clone)]
pub struct ScopedConfig {
    kind: ScopeKind,
    pub(crate) signature_algorithm: Setting<SignatureAlgorithm>,
    pub(crate) signature_secret: Setting<Secret>,
    pub(crate) exp_delay: Setting<i64>,
    pub(crate) nbf_delay: Setting<i64>,
    pub(crate) leeway: Setting<i64>,
    pub(crate) issuer: Setting<String>,
    pub(crate) subject: Setting<String>,
    pub(crate) audience: Setting<String>,
    providers: Vec<String>,
}

impl ScopedConfig {
    /// Server scope: no built-in defaults.
    pub fn server() -> Self {
        Self {
            kind: ScopeKind::Server,
            signature_algorithm: Setting::unset(),
            signature_secret: Setting::unset(),
            exp_delay: Setting::unset(),
            nbf_delay: Setting::unset(),
            leeway: Setting::unset(),
            issuer: Setting::unset(),
            subject: Setting::unset(),
            audience: Setting::unset(),
            providers: Vec::new(),
        }
    }

    /// Directory scope with its defaults (3600s expiry, no nbf delay, no leeway).
    pub fn directory() -> Self {
        Self {
            kind: ScopeKind::Directory,
            exp_delay: Setting::with_default(DEFAULT_EXP_DELAY),
            nbf_delay: Setting::with_default(DEFAULT_NBF_DELAY),
            leeway: Setting::with_default(DEFAULT_LEEWAY),
            ..Self::server()
        }
    }

    pub fn kind(&self) -> ScopeKind {
        self.kind
    }

    pub fn set_signature_algorithm(&mut self, algorithm: SignatureAlgorithm) -> &mut Self {
        self.signature_algorithm.set(algorithm);
        self
    }

    pub fn set_signature_secret(&mut self, secret: impl Into<Vec<u8>>) -> &mut Self {
        self.signature_secret.set(Secret::new(secret));
        self
    }

    pub fn set_exp_delay(&mut self, seconds: i64) -> &mut Self {
        self.exp_delay.set(seconds);
        self
    }

    pub fn set_nbf_delay(&mut self, seconds: i64) -> &mut Self {
        self.nbf_delay.set(seconds);
        self
    }

    pub fn set_leeway(&mut self, seconds: i64) -> &mut Self {
        self.leeway.set(seconds);
        self
    }

    pub fn set_issuer(&mut self, issuer: impl Into<String>) -> &mut Self {
        self.issuer.set(issuer.into());
        self
    }

    pub fn set_subject(&mut self, subject: impl Into<String>) -> &mut Self {
        self.subject.set(subject.into());
        self
    }

    pub fn set_audience(&mut self, audience: impl Into<String>) -> &mut Self {
        self.audience.set(audience.into());
        self
    }

    /// Appends a provider reference. Only directory scopes carry providers.
    pub fn add_provider(&mut self, name: impl Into<String>) -> Result<&mut Self, String> {
        let name = name.into();
        if self.kind != ScopeKind::Directory {
            return Err(format!(
                "Provider '{name}' is only allowed in a directory or location scope"
            ));
        }
        self.providers.push(name);
        Ok(self)
    }

    pub fn providers(&self) -> &[String] {
        &self.providers
    }

    /// Whether the administrator set `directive` in this scope.
    pub fn is_set(&self, directive: Directive) -> bool {
        match directive {
            Directive::SignatureAlgorithm => self.signature_algorithm.is_set(),
            Directive::SignatureSecret => self.signature_secret.is_set(),
            Directive::Iss => self.issuer.is_set(),
            Directive::Sub => self.subject.is_set(),
            Directive::Aud => self.audience.is_set(),
            Directive::ExpDelay => self.exp_delay.is_set(),
            Directive::NbfDelay => self.nbf_delay.is_set(),
            Directive::Leeway => self.leeway.is_set(),
            Directive::Provider => !self.providers.is_empty(),
        }
    }
}

impl Default for ScopedConfig {
    fn default() -> Self {
        Self::directory()
    }
}
