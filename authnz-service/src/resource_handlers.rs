use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use common_auth::{bearer_token, AuthError, AuthenticatedUser, BearerChallenge, BearerError};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::app::{AppState, Location, LocationKind};

/// Guards `auth_type: jwt` locations. Other locations pass straight through.
pub async fn require_bearer(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(location) = request.extensions().get::<Arc<Location>>().cloned() else {
        return next.run(request).await;
    };
    if location.kind != LocationKind::Protected {
        return next.run(request).await;
    }

    let uri = request.uri().path().to_owned();
    let Some(realm) = location.auth_name.as_deref() else {
        error!(%uri, "need AuthName");
        state.record_token_metric("error");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };

    let config = state.effective_config(&location);
    if config.signature_secret.is_none() {
        error!(%uri, "You must specify the SignatureSecret directive in configuration");
        state.record_token_metric("error");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    let token = match bearer_token(request.headers()) {
        Ok(token) => token,
        Err(err) => {
            let outcome = match err {
                BearerError::Missing => "missing",
                BearerError::InvalidRequest => "invalid_request",
            };
            state.record_token_metric(outcome);
            return BearerChallenge::from_bearer_error(realm, err).into_response();
        }
    };

    match state.verifier.verify(&token, &config) {
        Ok(identity) => {
            info!(user = %identity.user, %uri, "bearer token accepted");
            state.record_token_metric("accepted");
            request
                .extensions_mut()
                .insert(identity);
            next.run(request).await
        }
        Err(AuthError::Token(rejection)) => {
            warn!(%uri, reason = rejection.as_str(), "bearer token rejected");
            state.record_token_metric(rejection.as_str());
            BearerChallenge::invalid_token(realm, rejection).into_response()
        }
        Err(err) => {
            error!(%uri, error = %err, "token verification could not run");
            state.record_token_metric("error");
            err.into_response()
        }
    }
}

/// Echoes the identity established by [`require_bearer`].
pub async fn whoami(user: AuthenticatedUser) -> Json<Value> {
    Json(json!({ "user": user.user }))
}
