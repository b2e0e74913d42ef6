//! Server configuration, read from environment variables.
//!
//! | Variable | Meaning |
//! |---|---|
//! | `SIS_HOST` | Bind address (default `127.0.0.1`) |
//! | `SIS_PORT` | Bind port (default `8370`) |
//! | `SIS_SECRET_KEY` | HMAC secret the platform signs instances with |
//! | `SIS_SECURED_PATHS` | Comma-separated matchers for paths that require a valid instance |
//! | `SIS_CHECKED_PATHS` | Comma-separated matchers for paths where an instance is verified only if supplied |
//! | `SIS_STRICT_PROPERTIES` | Set to `0` or `false` to tolerate missing payload properties |
//!
//! A path matcher entry is an exact path, or a regex when prefixed with `re:`, e.g.
//! `SIS_SECURED_PATHS='/app,re:^/app/settings/.+$'`.

use std::env;

use log::*;
use signed_instance::{Secret, VerificationOptions};

use crate::{errors::ServerError, gate::InstanceGate, matcher::PathMatcher};

const DEFAULT_SIS_HOST: &str = "127.0.0.1";
const DEFAULT_SIS_PORT: u16 = 8370;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// The secret the platform used to sign instances. `None` means the server is
    /// misconfigured; startup validation refuses to run like that.
    pub secret_key: Option<Secret>,
    pub secured_paths: Vec<PathMatcher>,
    pub checked_paths: Vec<PathMatcher>,
    /// When true, every required instance property must be present for a decode to succeed.
    pub strict_properties: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SIS_HOST.to_string(),
            port: DEFAULT_SIS_PORT,
            secret_key: None,
            secured_paths: Vec::new(),
            checked_paths: Vec::new(),
            strict_properties: true,
        }
    }
}

impl ServerConfig {
    pub fn from_env_or_default() -> Self {
        let host = env::var("SIS_HOST").ok().unwrap_or_else(|| DEFAULT_SIS_HOST.into());
        let port = env::var("SIS_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for SIS_PORT. {e} Using the default, {DEFAULT_SIS_PORT}, instead."
                    );
                    DEFAULT_SIS_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_SIS_PORT);
        let secret_key = env::var("SIS_SECRET_KEY").ok().filter(|s| !s.is_empty()).map(Secret::new);
        if secret_key.is_none() {
            error!("🪛️ SIS_SECRET_KEY is not set. Please set it to the secret your platform signs instances with.");
        }
        let secured_paths = parse_matcher_list("SIS_SECURED_PATHS");
        let checked_paths = parse_matcher_list("SIS_CHECKED_PATHS");
        if secured_paths.is_empty() && checked_paths.is_empty() {
            warn!(
                "🪛️ Neither SIS_SECURED_PATHS nor SIS_CHECKED_PATHS is set. The server will run, but no path will \
                 require a signed instance."
            );
        }
        let strict_properties = env::var("SIS_STRICT_PROPERTIES").map(|s| &s != "0" && &s != "false").unwrap_or(true);
        Self { host, port, secret_key, secured_paths, checked_paths, strict_properties }
    }

    /// A missing secret is a deployment error. Refuse to start rather than rejecting every
    /// request at runtime.
    pub fn validate(&self) -> Result<(), ServerError> {
        match &self.secret_key {
            Some(_) => Ok(()),
            None => Err(ServerError::ConfigurationError("SIS_SECRET_KEY is not set".to_string())),
        }
    }

    pub fn gate(&self) -> InstanceGate {
        InstanceGate::new(
            self.secured_paths.clone(),
            self.checked_paths.clone(),
            self.secret_key.clone(),
            VerificationOptions { strict_properties: self.strict_properties },
        )
    }
}

fn parse_matcher_list(var: &str) -> Vec<PathMatcher> {
    env::var(var)
        .ok()
        .map(|s| {
            s.split(',')
                .map(str::trim)
                .filter(|entry| !entry.is_empty())
                .filter_map(|entry| {
                    entry
                        .parse::<PathMatcher>()
                        .map_err(|e| warn!("🪛️ Ignoring invalid path matcher ({entry}) in {var}: {e}"))
                        .ok()
                })
                .collect()
        })
        .unwrap_or_default()
}
