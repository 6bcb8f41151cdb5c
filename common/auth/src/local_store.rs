use std::collections::HashMap;

use argon2::password_hash::{PasswordHash, PasswordVerifier};
use argon2::Argon2;
use async_trait::async_trait;
use tracing::error;

use crate::provider::{CredentialProvider, Verdict};

/// Provider backed by an in-memory map of users to Argon2 PHC hashes.
#[derive(Debug, Clone)]
pub struct LocalStoreProvider {
    name: String,
    users: HashMap<String, String>,
}

impl LocalStoreProvider {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            users: HashMap::new(),
        }
    }

    pub fn with_users<I, U, H>(name: impl Into<String>, users: I) -> Self
    where
        I: IntoIterator<Item = (U, H)>,
        U: Into<String>,
        H: Into<String>,
    {
        let mut provider = Self::new(name);
        for (user, hash) in users {
            provider.insert(user, hash);
        }
        provider
    }

    fn insert(&mut self, user: impl Into<String>, password_hash: impl Into<String>) {
        self.users.insert(user.into(), password_hash.into());
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl CredentialProvider for LocalStoreProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check_password(&self, user: &str, password: &str) -> Verdict {
        let Some(stored) = self.users.get(user) else {
            return Verdict::UserNotFound;
        };

        let parsed = match PasswordHash::new(stored) {
            Ok(parsed) => parsed,
            Err(err) => {
                error!(provider = %self.name, user, error = %err, "stored password hash is not a valid PHC string");
                return Verdict::GeneralError;
            }
        };

        if Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
        {
            Verdict::Granted
        } else {
            Verdict::Denied
        }
    }
}
