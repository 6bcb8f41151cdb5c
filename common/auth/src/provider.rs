use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info_span, warn, Instrument};

use crate::error::{AuthError, AuthResult};

/// Outcome of a single password check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Granted,
    Denied,
    UserNotFound,
    GeneralError,
}

/// A source able to check a username/password pair.
///
/// Implementations own any I/O deadline; the chain never cancels a check.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn check_password(&self, user: &str, password: &str) -> Verdict;
}

/// Per-request scratch state shared with downstream logging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthnNotes {
    active_provider: Option<String>,
}

impl AuthnNotes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider currently consulted, if a check is in flight.
    pub fn active_provider(&self) -> Option<&str> {
        self.active_provider.as_deref()
    }

    fn enter(&mut self, name: &str) {
        self.active_provider = Some(name.to_string());
    }

    fn leave(&mut self) {
        self.active_provider = None;
    }
}

/// Named providers available to locations, fixed at configuration load.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn CredentialProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: Arc<dyn CredentialProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn CredentialProvider>> {
        self.providers.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Builds the ordered chain for a directory's `Provider` references.
    pub fn chain<S: AsRef<str>>(&self, names: &[S]) -> Result<ProviderChain, String> {
        let providers = names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                self.get(name)
                    .ok_or_else(|| format!("Unknown Authn provider: {name}"))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ProviderChain::new(providers))
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = self.providers.keys().collect::<Vec<_>>();
        names.sort();
        f.debug_struct("ProviderRegistry")
            .field("providers", &names)
            .finish()
    }
}

/// Ordered credential providers consulted until one gives a decisive answer.
#[derive(Clone, Default)]
pub struct ProviderChain {
    providers: Vec<Arc<dyn CredentialProvider>>,
}

impl ProviderChain {
    pub fn new(providers: Vec<Arc<dyn CredentialProvider>>) -> Self {
        Self { providers }
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.providers.iter().map(|provider| provider.name()).collect()
    }

    /// Walks the chain, stopping at the first verdict other than
    /// `UserNotFound`.
    pub async fn check(&self, user: &str, password: &str, notes: &mut AuthnNotes) -> Verdict {
        if self.providers.is_empty() {
            error!("no authn provider configured");
            return Verdict::GeneralError;
        }
        if user.is_empty() || password.is_empty() {
            return Verdict::UserNotFound;
        }

        let mut verdict = Verdict::UserNotFound;
        for provider in &self.providers {
            notes.enter(provider.name());
            verdict = provider
                .check_password(user, password)
                .instrument(info_span!("authn_provider", provider = provider.name()))
                .await;
            notes.leave();

            if verdict != Verdict::UserNotFound {
                break;
            }
        }
        verdict
    }

    /// Like [`ProviderChain::check`] but folds the verdict into an
    /// [`AuthResult`], logging denied and unknown users differently.
    pub async fn authenticate(
        &self,
        user: &str,
        password: &str,
        notes: &mut AuthnNotes,
    ) -> AuthResult<()> {
        match self.check(user, password, notes).await {
            Verdict::Granted => Ok(()),
            Verdict::Denied => {
                warn!(user, "authentication failure: password mismatch");
                Err(AuthError::Denied)
            }
            Verdict::UserNotFound => {
                warn!(user, "user not found");
                Err(AuthError::UserNotFound)
            }
            Verdict::GeneralError if self.providers.is_empty() => Err(AuthError::NoProvider),
            Verdict::GeneralError => {
                error!(user, "authn provider reported a general error");
                Err(AuthError::Provider("general error".to_string()))
            }
        }
    }
}

impl fmt::Debug for ProviderChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderChain")
            .field("providers", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Scripted {
        name: &'static str,
        verdict: Verdict,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(name: &'static str, verdict: Verdict) -> Arc<Self> {
            Arc::new(Self {
                name,
                verdict,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CredentialProvider for Scripted {
        fn name(&self) -> &str {
            self.name
        }

        async fn check_password(&self, _user: &str, _password: &str) -> Verdict {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.verdict
        }
    }

    fn chain(providers: &[Arc<Scripted>]) -> ProviderChain {
        ProviderChain::new(
            providers
                .iter()
                .map(|provider| provider.clone() as Arc<dyn CredentialProvider>)
                .collect(),
        )
    }

    #[tokio::test]
    async fn empty_chain_is_a_general_error() {
        let mut notes = AuthnNotes::new();
        let chain = ProviderChain::default();
        assert_eq!(
            chain.check("alice", "pw", &mut notes).await,
            Verdict::GeneralError
        );
        let err = chain.authenticate("alice", "pw", &mut notes).await.unwrap_err();
        assert!(matches!(err, AuthError::NoProvider));
    }

    #[tokio::test]
    async fn empty_credentials_never_reach_providers() {
        let first = Scripted::new("first", Verdict::Granted);
        let chain = chain(&[first.clone()]);
        let mut notes = AuthnNotes::new();

        assert_eq!(chain.check("", "pw", &mut notes).await, Verdict::UserNotFound);
        assert_eq!(
            chain.check("alice", "", &mut notes).await,
            Verdict::UserNotFound
        );
        assert_eq!(first.calls(), 0);
    }

    #[tokio::test]
    async fn falls_through_user_not_found() {
        let first = Scripted::new("first", Verdict::UserNotFound);
        let second = Scripted::new("second", Verdict::Granted);
        let chain = chain(&[first.clone(), second.clone()]);
        let mut notes = AuthnNotes::new();

        assert_eq!(chain.check("alice", "pw", &mut notes).await, Verdict::Granted);
        assert_eq!(first.calls(), 1);
        assert_eq!(second.calls(), 1);
        assert!(notes.active_provider().is_none());
    }

    #[tokio::test]
    async fn denied_short_circuits() {
        let first = Scripted::new("first", Verdict::Denied);
        let second = Scripted::new("second", Verdict::Granted);
        let chain = chain(&[first.clone(), second.clone()]);
        let mut notes = AuthnNotes::new();

        let err = chain
            .authenticate("alice", "pw", &mut notes)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Denied));
        assert_eq!(second.calls(), 0);
    }

    #[tokio::test]
    async fn exhausted_chain_reports_user_not_found() {
        let first = Scripted::new("first", Verdict::UserNotFound);
        let second = Scripted::new("second", Verdict::UserNotFound);
        let chain = chain(&[first, second]);
        let mut notes = AuthnNotes::new();

        let err = chain
            .authenticate("alice", "pw", &mut notes)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UserNotFound));
    }

    #[tokio::test]
    async fn general_error_from_provider_is_internal() {
        let first = Scripted::new("first", Verdict::GeneralError);
        let chain = chain(&[first]);
        let mut notes = AuthnNotes::new();

        let err = chain
            .authenticate("alice", "pw", &mut notes)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Provider(_)));
    }

    #[test]
    fn registry_resolves_names_in_order() {
        let mut registry = ProviderRegistry::new();
        registry.register(Scripted::new("file", Verdict::Granted));
        registry.register(Scripted::new("ldap", Verdict::Granted));

        let chain = registry.chain(&["ldap", "file"]).expect("known names");
        assert_eq!(chain.names(), ["ldap", "file"]);

        let err = registry.chain(&["file", "dbm"]).unwrap_err();
        assert_eq!(err, "Unknown Authn provider: dbm");
    }
}
