use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{AuthError, AuthResult};
use crate::provider::{CredentialProvider, Verdict};

pub const DEFAULT_DIRECTORY_TIMEOUT: Duration = Duration::from_secs(5);

/// Provider that delegates the password check to a remote directory service.
///
/// The credentials are POSTed as JSON; the response status decides the
/// verdict: 2xx grants, 401/403 deny, 404 means unknown user, anything else
/// (including transport failures and timeouts) is a general error.
#[derive(Clone)]
pub struct DirectoryProvider {
    name: String,
    client: Client,
    url: String,
}

#[derive(Serialize)]
struct CheckRequest<'a> {
    user: &'a str,
    password: &'a str,
}

impl DirectoryProvider {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        timeout: Duration,
    ) -> AuthResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| AuthError::Provider(err.to_string()))?;
        Ok(Self {
            name: name.into(),
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl CredentialProvider for DirectoryProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check_password(&self, user: &str, password: &str) -> Verdict {
        let response = match self
            .client
            .post(&self.url)
            .json(&CheckRequest { user, password })
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                warn!(provider = %self.name, url = %self.url, error = %err, "directory lookup failed");
                return Verdict::GeneralError;
            }
        };

        let status = response.status();
        debug!(provider = %self.name, user, %status, "directory answered");
        match status {
            status if status.is_success() => Verdict::Granted,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Verdict::Denied,
            StatusCode::NOT_FOUND => Verdict::UserNotFound,
            other => {
                warn!(provider = %self.name, status = %other, "unexpected directory response");
                Verdict::GeneralError
            }
        }
    }
}
