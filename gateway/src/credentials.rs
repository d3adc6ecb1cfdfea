//! Credential store for polling adapters
//!
//! Secrets live in a local JSON file keyed by endpoint hostname:
//!
//! ```json
//! {
//!   "api.vemcon.net": { "x-api-key": "..." },
//!   "bauen40_tat.mts-server.de": { "username": "...", "password": "..." }
//! }
//! ```
//!
//! Loaded once at startup and only read afterwards.

use crate::error::{GatewayError, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// Secrets for one upstream host
#[derive(Clone, Default, Deserialize)]
pub struct Credential {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default, rename = "x-api-key", alias = "api_key", alias = "apiKey")]
    pub api_key: Option<String>,
}

// Secrets stay out of logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .finish()
    }
}

impl Credential {
    /// Username and password, if both are set
    pub fn login(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(user), Some(pass)) if !user.is_empty() => Some((user, pass)),
            _ => None,
        }
    }

    /// API key, if set
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.is_empty())
    }
}

/// Hostname-keyed credentials
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    by_host: HashMap<String, Credential>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the store from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents).map_err(|e| match e {
            GatewayError::Serialization(msg) => {
                GatewayError::Config(format!("invalid credentials file {}: {msg}", path.display()))
            }
            other => other,
        })
    }

    /// Parse the store from JSON text
    pub fn from_json(json: &str) -> Result<Self> {
        let by_host: HashMap<String, Credential> =
            serde_json::from_str(json).map_err(|e| GatewayError::Serialization(e.to_string()))?;
        Ok(Self { by_host })
    }

    /// Add or replace the credential for a host
    pub fn insert(&mut self, host: impl Into<String>, credential: Credential) {
        self.by_host.insert(host.into(), credential);
    }

    /// Credential for a hostname
    pub fn get(&self, host: &str) -> Option<&Credential> {
        self.by_host.get(host)
    }

    /// Credential for the host part of a URL
    pub fn for_url(&self, url: &str) -> Result<&Credential> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| GatewayError::Config(format!("invalid upstream URL '{url}': {e}")))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| GatewayError::Config(format!("upstream URL '{url}' has no host")))?;
        self.get(host)
            .ok_or_else(|| GatewayError::Config(format!("no credentials for host '{host}'")))
    }

    pub fn len(&self) -> usize {
        self.by_host.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_host.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const CREDS: &str = r#"{
        "api.vemcon.net": {"x-api-key": "k-123"},
        "bauen40_tat.mts-server.de": {"username": "svc", "password": "s3cret"}
    }"#;

    #[test]
    fn test_parse_store() {
        let store = CredentialStore::from_json(CREDS).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("api.vemcon.net").unwrap().api_key(), Some("k-123"));
        assert_eq!(
            store.get("bauen40_tat.mts-server.de").unwrap().login(),
            Some(("svc", "s3cret"))
        );
    }

    #[test]
    fn test_lookup_by_url_host() {
        let store = CredentialStore::from_json(CREDS).unwrap();
        let cred = store.for_url("https://api.vemcon.net/tt/v0").unwrap();
        assert_eq!(cred.api_key(), Some("k-123"));

        assert!(store.for_url("https://unknown.example.com").is_err());
        assert!(store.for_url("not a url").is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let store = CredentialStore::from_json(CREDS).unwrap();
        let rendered = format!("{:?}", store);
        assert!(!rendered.contains("s3cret"));
        assert!(!rendered.contains("k-123"));
        assert!(rendered.contains("svc"));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            CredentialStore::from_json("{not json"),
            Err(GatewayError::Serialization(_))
        ));
    }

    #[test]
    fn test_missing_fields() {
        let cred = Credential {
            username: Some("svc".into()),
            ..Default::default()
        };
        assert!(cred.login().is_none());
        assert!(cred.api_key().is_none());
    }
}
