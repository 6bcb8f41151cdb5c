use crate::config::{Directive, ScopedConfig, Secret, Setting, SignatureAlgorithm};

/// Value of a single directive after scope resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedValue<'a> {
    Algorithm(SignatureAlgorithm),
    Secret(&'a Secret),
    Text(&'a str),
    Seconds(i64),
    Providers(&'a [String]),
}

/// Resolves directives for one request from its server and directory scopes.
///
/// A directory value set by the administrator wins, then a server value set by
/// the administrator, then the directory's built-in default if it has one.
#[derive(Debug, Clone, Copy)]
pub struct ConfigResolver<'a> {
    server: &'a ScopedConfig,
    directory: &'a ScopedConfig,
}

impl<'a> ConfigResolver<'a> {
    pub fn new(server: &'a ScopedConfig, directory: &'a ScopedConfig) -> Self {
        Self { server, directory }
    }

    fn pick<T>(&self, field: impl Fn(&'a ScopedConfig) -> &'a Setting<T>) -> Option<&'a T> {
        let directory = field(self.directory);
        if directory.is_set() {
            return directory.value();
        }
        let server = field(self.server);
        if server.is_set() {
            return server.value();
        }
        directory.value()
    }

    pub fn signature_algorithm(&self) -> Option<SignatureAlgorithm> {
        self.pick(|scope| &scope.signature_algorithm).copied()
    }

    pub fn signature_secret(&self) -> Option<&'a Secret> {
        self.pick(|scope| &scope.signature_secret)
    }

    pub fn issuer(&self) -> Option<&'a str> {
        self.pick(|scope| &scope.issuer).map(String::as_str)
    }

    pub fn subject(&self) -> Option<&'a str> {
        self.pick(|scope| &scope.subject).map(String::as_str)
    }

    pub fn audience(&self) -> Option<&'a str> {
        self.pick(|scope| &scope.audience).map(String::as_str)
    }

    pub fn exp_delay(&self) -> Option<i64> {
        self.pick(|scope| &scope.exp_delay).copied()
    }

    pub fn nbf_delay(&self) -> Option<i64> {
        self.pick(|scope| &scope.nbf_delay).copied()
    }

    pub fn leeway(&self) -> Option<i64> {
        self.pick(|scope| &scope.leeway).copied()
    }

    /// Providers are only ever read from the directory scope.
    pub fn providers(&self) -> &'a [String] {
        self.directory.providers()
    }

    pub fn resolve(&self, directive: Directive) -> Option<ResolvedValue<'a>> {
        match directive {
            Directive::SignatureAlgorithm => {
                self.signature_algorithm().map(ResolvedValue::Algorithm)
            }
            Directive::SignatureSecret => self.signature_secret().map(ResolvedValue::Secret),
            Directive::Iss => self.issuer().map(ResolvedValue::Text),
            Directive::Sub => self.subject().map(ResolvedValue::Text),
            Directive::Aud => self.audience().map(ResolvedValue::Text),
            Directive::ExpDelay => self.exp_delay().map(ResolvedValue::Seconds),
            Directive::NbfDelay => self.nbf_delay().map(ResolvedValue::Seconds),
            Directive::Leeway => self.leeway().map(ResolvedValue::Seconds),
            Directive::Provider => {
                let providers = self.providers();
                (!providers.is_empty()).then_some(ResolvedValue::Providers(providers))
            }
        }
    }
}

/// Per-request view of the directives the issuer and verifier need.
///
/// Not stored; assembled for each request from a [`ConfigResolver`].
#[derive(Debug, Clone, Default)]
pub struct EffectiveConfig {
    pub signature_algorithm: Option<SignatureAlgorithm>,
    pub signature_secret: Option<Secret>,
    pub issuer: Option<String>,
    pub subject: Option<String>,
    pub audience: Option<String>,
    pub exp_delay: Option<i64>,
    pub nbf_delay: Option<i64>,
    pub leeway: Option<i64>,
}

impl EffectiveConfig {
    pub fn resolve(resolver: &ConfigResolver<'_>) -> Self {
        Self {
            signature_algorithm: resolver.signature_algorithm(),
            signature_secret: resolver.signature_secret().cloned(),
            issuer: resolver.issuer().map(str::to_owned),
            subject: resolver.subject().map(str::to_owned),
            audience: resolver.audience().map(str::to_owned),
            exp_delay: resolver.exp_delay(),
            nbf_delay: resolver.nbf_delay(),
            leeway: resolver.leeway(),
        }
    }

    pub fn from_scopes(server: &ScopedConfig, directory: &ScopedConfig) -> Self {
        Self::resolve(&ConfigResolver::new(server, directory))
    }
}
