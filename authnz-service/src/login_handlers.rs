use std::sync::Arc;

use axum::extract::{FromRequest, Request};
use axum::http::header::ALLOW;
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use common_auth::{AuthError, AuthnNotes};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::app::{AppState, Location};

/// Largest accepted login form body, in bytes.
pub const FORM_SIZE: usize = 512;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct LoginForm {
    pub user: Option<String>,
    pub password: Option<String>,
}

impl LoginForm {
    /// Builds the form from decoded pairs; a repeated field keeps its first value.
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut form = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "user" => &mut form.user,
                "password" => &mut form.password,
                _ => continue,
            };
            slot.get_or_insert(value);
        }
        form
    }
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Debug, Error)]
pub enum LoginError {
    #[error("the jwt-login-handler only supports the POST method")]
    MethodNotAllowed,
    #[error("user and password fields are required")]
    MissingFields,
    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl LoginError {
    fn outcome(&self) -> &'static str {
        match self {
            LoginError::MethodNotAllowed => "method_not_allowed",
            LoginError::MissingFields => "missing_fields",
            LoginError::Auth(AuthError::Denied) => "denied",
            LoginError::Auth(AuthError::UserNotFound) => "user_not_found",
            LoginError::Auth(_) => "error",
        }
    }
}

impl IntoResponse for LoginError {
    fn into_response(self) -> Response {
        match self {
            LoginError::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                [(ALLOW, HeaderValue::from_static("POST"))],
            )
                .into_response(),
            LoginError::MissingFields => StatusCode::UNAUTHORIZED.into_response(),
            LoginError::Auth(err) => err.into_response(),
        }
    }
}

/// `jwt-login-handler`: checks the form credentials against the location's
/// provider chain and answers with a freshly signed token.
pub async fn login(state: AppState, location: Arc<Location>, request: Request) -> Response {
    if request.method() != Method::POST {
        error!(
            uri = %request.uri().path(),
            "the jwt-login-handler only supports the POST method"
        );
        return reject(&state, LoginError::MethodNotAllowed);
    }

    let form = match Form::<Vec<(String, String)>>::from_request(request, &state).await {
        Ok(Form(pairs)) => LoginForm::from_pairs(pairs),
        Err(rejection) => {
            warn!(error = %rejection, "unreadable login form");
            state.record_login_metric("bad_form");
            return rejection.into_response();
        }
    };

    match issue_for(&state, &location, form).await {
        Ok(token) => {
            state.record_login_metric("granted");
            Json(TokenResponse { token }).into_response()
        }
        Err(err) => reject(&state, err),
    }
}

async fn issue_for(
    state: &AppState,
    location: &Location,
    form: LoginForm,
) -> Result<String, LoginError> {
    let (Some(user), Some(password)) = (form.user, form.password) else {
        return Err(LoginError::MissingFields);
    };

    let mut notes = AuthnNotes::new();
    location
        .chain
        .authenticate(&user, &password, &mut notes)
        .await?;

    let config = state.effective_config(location);
    let token = state.issuer.issue(&user, &config)?;
    info!(user = %user, location = %location.path, "issued token");
    Ok(token)
}

fn reject(state: &AppState, err: LoginError) -> Response {
    state.record_login_metric(err.outcome());
    err.into_response()
}
