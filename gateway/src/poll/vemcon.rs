//! Vemcon tooltracker adapter
//!
//! API-key authenticated: one `GET {base}/tt/v0/tooltrackers` per cycle,
//! returning a root array of trackers.

use crate::credentials::{Credential, CredentialStore};
use crate::error::{GatewayError, PollError, Result};
use crate::poll::{PollingAdapter, Session, http_client, send};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use std::time::Duration;

const TRACKERS_PATH: &str = "/tt/v0/tooltrackers";
const API_KEY_HEADER: &str = "x-api-key";

pub struct VemconAdapter {
    client: Client,
    base_url: String,
    api_key: String,
}

impl VemconAdapter {
    pub const VENDOR: &'static str = "vemcon";

    pub fn new(
        base_url: impl Into<String>,
        credential: &Credential,
        timeout: Duration,
    ) -> Result<Self> {
        let api_key = credential
            .api_key()
            .ok_or_else(|| GatewayError::Config("vemcon credentials need an x-api-key".into()))?;
        Ok(Self {
            client: http_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// Create an adapter using the store entry for the URL's host
    pub fn from_store(
        base_url: impl Into<String>,
        store: &CredentialStore,
        timeout: Duration,
    ) -> Result<Self> {
        let base_url = base_url.into();
        let credential = store.for_url(&base_url)?;
        Self::new(base_url, credential, timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl PollingAdapter for VemconAdapter {
    fn vendor(&self) -> &str {
        Self::VENDOR
    }

    async fn fetch(&self, _session: Option<&Session>) -> std::result::Result<Bytes, PollError> {
        let url = format!("{}{}", self.base_url, TRACKERS_PATH);
        let request = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, self.api_key.as_str());
        let response = send(request, |msg| PollError::fetch(Self::VENDOR, msg)).await?;
        response
            .bytes()
            .await
            .map_err(|e| PollError::fetch(Self::VENDOR, format!("failed to read body: {e}")))
    }
}
