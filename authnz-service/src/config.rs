use anyhow::{anyhow, bail, Context, Result};
use common_auth::directory::DEFAULT_DIRECTORY_TIMEOUT;
use common_auth::{
    DirectoryProvider, LocalStoreProvider, ProviderRegistry, ScopedConfig, SignatureAlgorithm,
};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::app::{Location, LocationKind};

pub const LOGIN_HANDLER: &str = "jwt-login-handler";
pub const JWT_AUTH_TYPE: &str = "jwt";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSettings {
    pub host: String,
    pub port: u16,
    pub config_path: PathBuf,
}

pub fn load_settings() -> ServiceSettings {
    let host = env::var("AUTHNZ_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = env::var("AUTHNZ_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8085);
    let config_path = env::var("AUTHNZ_CONFIG")
        .ok()
        .and_then(|value| normalize_optional(&value))
        .unwrap_or_else(|| "authnz.json".to_string());

    ServiceSettings {
        host,
        port,
        config_path: PathBuf::from(config_path),
    }
}

/// Scopes, providers and locations read from the scope file.
#[derive(Debug)]
pub struct ScopeConfig {
    pub server: ScopedConfig,
    pub locations: Vec<Location>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct DirectiveBlock {
    #[serde(rename = "SignatureAlgorithm")]
    signature_algorithm: Option<String>,
    #[serde(rename = "SignatureSecret")]
    signature_secret: Option<String>,
    #[serde(rename = "Iss")]
    issuer: Option<String>,
    #[serde(rename = "Sub")]
    subject: Option<String>,
    #[serde(rename = "Aud")]
    audience: Option<String>,
    #[serde(rename = "ExpDelay")]
    exp_delay: Option<i64>,
    #[serde(rename = "NbfDelay")]
    nbf_delay: Option<i64>,
    #[serde(rename = "Leeway")]
    leeway: Option<i64>,
    #[serde(rename = "Provider", default)]
    providers: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum ProviderDef {
    File {
        #[serde(default)]
        users: BTreeMap<String, String>,
    },
    Directory {
        url: String,
        timeout_ms: Option<u64>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LocationDef {
    path: String,
    handler: Option<String>,
    auth_type: Option<String>,
    auth_name: Option<String>,
    #[serde(default)]
    directives: DirectiveBlock,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScopeFile {
    #[serde(default)]
    server: DirectiveBlock,
    #[serde(default)]
    providers: BTreeMap<String, ProviderDef>,
    #[serde(default)]
    locations: Vec<LocationDef>,
}

pub fn load_scope_file(path: &Path) -> Result<ScopeConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read scope file {}", path.display()))?;
    parse_scope_config(&raw).with_context(|| format!("Invalid scope file {}", path.display()))
}

pub fn parse_scope_config(raw: &str) -> Result<ScopeConfig> {
    let file: ScopeFile = serde_json::from_str(raw).context("Failed to parse scope file")?;

    let mut server = ScopedConfig::server();
    apply_directives(&mut server, file.server).context("In server scope")?;

    let registry = build_registry(file.providers)?;

    let mut seen = HashSet::new();
    let mut locations = Vec::with_capacity(file.locations.len());
    for def in file.locations {
        if !seen.insert(def.path.clone()) {
            bail!("Location {} is declared twice", def.path);
        }
        let path = def.path.clone();
        locations.push(build_location(def, &registry).with_context(|| format!("In location {path}"))?);
    }

    info!(
        providers = registry.len(),
        locations = locations.len(),
        "loaded scope configuration"
    );
    Ok(ScopeConfig { server, locations })
}

fn apply_directives(scope: &mut ScopedConfig, block: DirectiveBlock) -> Result<()> {
    if let Some(name) = block.signature_algorithm {
        let algorithm: SignatureAlgorithm = name.parse()?;
        scope.set_signature_algorithm(algorithm);
    }
    if let Some(secret) = block.signature_secret {
        scope.set_signature_secret(secret);
    }
    if let Some(issuer) = block.issuer {
        scope.set_issuer(issuer);
    }
    if let Some(subject) = block.subject {
        scope.set_subject(subject);
    }
    if let Some(audience) = block.audience {
        scope.set_audience(audience);
    }
    if let Some(seconds) = block.exp_delay {
        scope.set_exp_delay(seconds);
    }
    if let Some(seconds) = block.nbf_delay {
        scope.set_nbf_delay(seconds);
    }
    if let Some(seconds) = block.leeway {
        scope.set_leeway(seconds);
    }
    for name in block.providers {
        scope.add_provider(name).map_err(|err| anyhow!(err))?;
    }
    Ok(())
}

fn build_registry(defs: BTreeMap<String, ProviderDef>) -> Result<ProviderRegistry> {
    let mut registry = ProviderRegistry::new();
    for (name, def) in defs {
        match def {
            ProviderDef::File { users } => {
                registry.register(Arc::new(LocalStoreProvider::with_users(name, users)));
            }
            ProviderDef::Directory { url, timeout_ms } => {
                let timeout = timeout_ms
                    .map(Duration::from_millis)
                    .unwrap_or(DEFAULT_DIRECTORY_TIMEOUT);
                let provider = DirectoryProvider::new(name.clone(), url, timeout)
                    .with_context(|| format!("Failed to build directory provider {name}"))?;
                registry.register(Arc::new(provider));
            }
        }
    }
    Ok(registry)
}

fn build_location(def: LocationDef, registry: &ProviderRegistry) -> Result<Location> {
    if !def.path.starts_with('/') {
        bail!("Location path must start with '/'");
    }

    let kind = match (def.handler.as_deref(), def.auth_type.as_deref()) {
        (Some(LOGIN_HANDLER), None) => LocationKind::Login,
        (None, Some(JWT_AUTH_TYPE)) => LocationKind::Protected,
        (Some(_), Some(_)) => {
            bail!("A location is either a login handler or protected, not both")
        }
        (Some(other), None) => bail!("Unknown handler '{other}'"),
        (None, Some(other)) => bail!("Unsupported auth_type '{other}'"),
        (None, None) => bail!("Location needs a handler or an auth_type"),
    };

    let auth_name = def.auth_name.and_then(|value| normalize_optional(&value));
    if kind == LocationKind::Protected && auth_name.is_none() {
        bail!("need AuthName: {}", def.path);
    }

    let mut directory = ScopedConfig::directory();
    apply_directives(&mut directory, def.directives)?;
    let chain = registry
        .chain(directory.providers())
        .map_err(|err| anyhow!(err))?;

    Ok(Location {
        path: def.path,
        kind,
        auth_name,
        directory,
        chain,
    })
}

fn normalize_optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
