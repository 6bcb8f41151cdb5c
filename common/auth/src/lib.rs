pub mod claims;
pub mod config;
pub mod directory;
pub mod error;
pub mod extractors;
pub mod issuer;
pub mod key_policy;
pub mod local_store;
pub mod provider;
pub mod resolver;
pub mod verifier;

pub use claims::{PresentedClaims, TokenClaims};
pub use config::{Directive, ScopeKind, ScopedConfig, Secret, Setting, SignatureAlgorithm};
pub use directory::DirectoryProvider;
pub use error::{AuthError, AuthResult, TokenRejection};
pub use extractors::{bearer_token, AuthenticatedUser, BearerChallenge, BearerError};
pub use issuer::TokenIssuer;
pub use local_store::LocalStoreProvider;
pub use provider::{AuthnNotes, CredentialProvider, ProviderChain, ProviderRegistry, Verdict};
pub use resolver::{ConfigResolver, EffectiveConfig, ResolvedValue};
pub use verifier::TokenVerifier;
