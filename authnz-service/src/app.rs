use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, FromRequestParts, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Router};
use common_auth::{
    AuthenticatedUser, EffectiveConfig, ProviderChain, ScopedConfig, TokenIssuer, TokenVerifier,
};
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

use crate::config::ScopeConfig;
use crate::login_handlers::{self, FORM_SIZE};
use crate::metrics::AuthnMetrics;
use crate::resource_handlers;

/// What a location does with the requests it receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationKind {
    /// `jwt-login-handler`: exchanges credentials for a token.
    Login,
    /// `auth_type: jwt`: requires a valid bearer token.
    Protected,
}

/// A configured path prefix with its directory scope.
#[derive(Debug, Clone)]
pub struct Location {
    pub path: String,
    pub kind: LocationKind,
    pub auth_name: Option<String>,
    pub directory: ScopedConfig,
    pub chain: ProviderChain,
}

impl Location {
    /// Whether `path` falls under this location, on segment boundaries.
    pub fn covers(&self, path: &str) -> bool {
        let prefix = self.path.trim_end_matches('/');
        if prefix.is_empty() {
            return true;
        }
        match path.strip_prefix(prefix) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }

    pub fn effective(&self, server: &ScopedConfig) -> EffectiveConfig {
        EffectiveConfig::from_scopes(server, &self.directory)
    }
}

/// Configured locations, matched by longest covering prefix.
#[derive(Debug, Clone, Default)]
pub struct Locations {
    entries: Vec<Arc<Location>>,
}

impl Locations {
    pub fn new(entries: Vec<Location>) -> Self {
        Self {
            entries: entries.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn find(&self, path: &str) -> Option<Arc<Location>> {
        self.entries
            .iter()
            .filter(|location| location.covers(path))
            .max_by_key(|location| location.path.trim_end_matches('/').len())
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub server: Arc<ScopedConfig>,
    pub locations: Arc<Locations>,
    pub issuer: TokenIssuer,
    pub verifier: TokenVerifier,
    pub metrics: Arc<AuthnMetrics>,
}

impl AppState {
    pub fn new(config: ScopeConfig, metrics: AuthnMetrics) -> Self {
        Self {
            server: Arc::new(config.server),
            locations: Arc::new(Locations::new(config.locations)),
            issuer: TokenIssuer::new(),
            verifier: TokenVerifier::new(),
            metrics: Arc::new(metrics),
        }
    }

    pub fn effective_config(&self, location: &Location) -> EffectiveConfig {
        location.effective(&self.server)
    }

    pub fn record_login_metric(&self, outcome: &str) {
        self.metrics.login_attempt(outcome);
    }

    pub fn record_token_metric(&self, outcome: &str) {
        self.metrics.token_check(outcome);
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn metrics_endpoint(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(response) => response,
        Err(err) => {
            error!(error = %err, "Unable to render metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Attaches the matching [`Location`] to the request; unmatched paths are 404.
async fn select_location(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let path = request.uri().path().to_owned();
    match state.locations.find(&path) {
        Some(location) => {
            debug!(uri = %path, location = %location.path, "matched location");
            request.extensions_mut().insert(location);
            next.run(request).await
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn serve_location(
    State(state): State<AppState>,
    Extension(location): Extension<Arc<Location>>,
    request: Request,
) -> Response {
    match location.kind {
        LocationKind::Login => login_handlers::login(state, location, request).await,
        LocationKind::Protected => {
            let (mut parts, _body) = request.into_parts();
            match AuthenticatedUser::from_request_parts(&mut parts, &state).await {
                Ok(user) => resource_handlers::whoami(user).await.into_response(),
                Err(status) => status.into_response(),
            }
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    // Location middleware wraps the fallback only; service routes are added after.
    Router::new()
        .fallback(serve_location)
        .layer(DefaultBodyLimit::max(FORM_SIZE))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            resource_handlers::require_bearer,
        ))
        .layer(middleware::from_fn_with_state(state.clone(), select_location))
        .route("/healthz", get(health))
        .route("/metrics", get(metrics_endpoint))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(path: &str) -> Location {
        Location {
            path: path.to_string(),
            kind: LocationKind::Protected,
            auth_name: Some("realm".to_string()),
            directory: ScopedConfig::directory(),
            chain: ProviderChain::default(),
        }
    }

    #[test]
    fn covers_respects_segment_boundaries() {
        let api = location("/api");
        assert!(api.covers("/api"));
        assert!(api.covers("/api/"));
        assert!(api.covers("/api/orders/1"));
        assert!(!api.covers("/apix"));
        assert!(!api.covers("/"));

        let trailing = location("/api/");
        assert!(trailing.covers("/api"));
        assert!(trailing.covers("/api/orders"));

        assert!(location("/").covers("/anything/at/all"));
    }

    #[test]
    fn longest_prefix_wins() {
        let locations = Locations::new(vec![
            location("/"),
            location("/api"),
            location("/api/admin"),
        ]);

        let matched = |path: &str| locations.find(path).map(|location| location.path.clone());
        assert_eq!(matched("/api/admin/users").as_deref(), Some("/api/admin"));
        assert_eq!(matched("/api/administrators").as_deref(), Some("/api"));
        assert_eq!(matched("/other").as_deref(), Some("/"));
    }

    #[test]
    fn no_location_no_match() {
        let locations = Locations::new(vec![location("/api")]);
        assert!(locations.find("/login").is_none());
        assert!(Locations::default().is_empty());
    }
}
