//! MTS Smart asset portal adapter
//!
//! Session login, then one asset listing per cycle:
//!
//! 1. `POST {base}/UserPortalService.svc/json/Login` with
//!    `{"Username": .., "Password": ..}`; the session is the first
//!    `Set-Cookie` of the response.
//! 2. `POST {base}/AssetPortalService.svc/json/GetAssets` with body `{}` and
//!    the session cookie. Items are under `Assets`.

use crate::credentials::{Credential, CredentialStore};
use crate::error::{GatewayError, PollError, Result};
use crate::poll::{PollingAdapter, Session, http_client, send};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use reqwest::header::{COOKIE, SET_COOKIE};
use serde::Serialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

const LOGIN_PATH: &str = "/UserPortalService.svc/json/Login";
const ASSETS_PATH: &str = "/AssetPortalService.svc/json/GetAssets";

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

pub struct MtsSmartAdapter {
    client: Client,
    base_url: String,
    username: String,
    password: String,
}

impl MtsSmartAdapter {
    /// Registry tag
    pub const VENDOR: &'static str = "mts_smart";

    /// Create an adapter with explicit credentials
    pub fn new(
        base_url: impl Into<String>,
        credential: &Credential,
        timeout: Duration,
    ) -> Result<Self> {
        let (username, password) = credential.login().ok_or_else(|| {
            GatewayError::Config("mts_smart credentials need username and password".into())
        })?;
        Ok(Self {
            client: http_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            username: username.to_string(),
            password: password.to_string(),
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

/// `name=value` part of a `Set-Cookie` header value
fn session_cookie(set_cookie: &str) -> Option<&str> {
    let pair = set_cookie.split(';').next()?.trim();
    if pair.contains('=') { Some(pair) } else { None }
}

#[async_trait]
impl PollingAdapter for MtsSmartAdapter {
    fn vendor(&self) -> &str {
        Self::VENDOR
    }

    async fn authenticate(&self) -> std::result::Result<Option<Session>, PollError> {
        let url = format!("{}{}", self.base_url, LOGIN_PATH);
        let request = self.client.post(&url).json(&LoginRequest {
            username: &self.username,
            password: &self.password,
        });
        let response = send(request, |msg| PollError::auth(Self::VENDOR, msg)).await?;

        let cookie = response
            .headers()
            .get(SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(session_cookie)
            .ok_or_else(|| {
                PollError::auth(Self::VENDOR, "login response carried no session cookie")
            })?;
        debug!(vendor = Self::VENDOR, "Session established");
        Ok(Some(Session::new(cookie)))
    }

    async fn fetch(&self, session: Option<&Session>) -> std::result::Result<Bytes, PollError> {
        let session =
            session.ok_or_else(|| PollError::auth(Self::VENDOR, "no session for asset request"))?;
        let url = format!("{}{}", self.base_url, ASSETS_PATH);
        let request = self
            .client
            .post(&url)
            .header(COOKIE, session.cookie())
            .json(&json!({}));
        let response = send(request, |msg| PollError::fetch(Self::VENDOR, msg)).await?;
        response
            .bytes()
            .await
            .map_err(|e| PollError::fetch(Self::VENDOR, format!("failed to read body: {e}")))
    }

    fn collection_pointer(&self) -> &str {
        "/Assets"
    }
}
