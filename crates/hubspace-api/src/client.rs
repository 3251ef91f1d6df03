// Device-cloud HTTP client
//
// Catalog fetch, per-device state read and state write. Every request
// carries a bearer token from the shared `TokenBroker`; the account id is
// resolved through it once and reused for URL construction.

use std::sync::Arc;

use reqwest::StatusCode;
use reqwest::header::{HOST, USER_AGENT};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::auth::TokenBroker;
use crate::endpoints::host_header;
use crate::error::Error;
use crate::models::{MetaDeviceRecord, StateEnvelope, StateRecord};
use crate::transport::APP_USER_AGENT;

/// Raw HTTP client for the metadevice API.
///
/// Cheap to clone; the HTTP connection pool and token cache live in the
/// shared [`TokenBroker`].
#[derive(Clone)]
pub struct AferoClient {
    broker: Arc<TokenBroker>,
}

impl AferoClient {
    pub fn new(broker: Arc<TokenBroker>) -> Self {
        Self { broker }
    }

    pub fn broker(&self) -> &Arc<TokenBroker> {
        &self.broker
    }

    // ── Catalog ──────────────────────────────────────────────────────

    /// Fetch the full metadevice list (devices, rooms, homes) with state expanded.
    pub async fn list_metadevices(&self) -> Result<Vec<MetaDeviceRecord>, Error> {
        let account_id = self.broker.get_account_id().await?;
        let url = self.broker.endpoints().metadevices_url(&account_id)?;
        self.get(url).await
    }

    /// Same request as [`list_metadevices`](Self::list_metadevices), kept as
    /// untyped JSON for debug dumps.
    pub async fn list_metadevices_raw(&self) -> Result<Value, Error> {
        let account_id = self.broker.get_account_id().await?;
        let url = self.broker.endpoints().metadevices_url(&account_id)?;
        self.get(url).await
    }

    // ── State ────────────────────────────────────────────────────────

    /// Read the current state values of one metadevice.
    pub async fn get_state(&self, device_id: &str) -> Result<Vec<StateRecord>, Error> {
        let account_id = self.broker.get_account_id().await?;
        let url = self.broker.endpoints().state_url(&account_id, device_id)?;
        let envelope: StateEnvelope = self.get(url).await?;
        Ok(envelope.values)
    }

    /// Write state values to one metadevice. Returns the values the
    /// provider echoes back, which may be coerced from what was sent.
    pub async fn put_state(
        &self,
        device_id: &str,
        values: Vec<StateRecord>,
    ) -> Result<Vec<StateRecord>, Error> {
        let account_id = self.broker.get_account_id().await?;
        let url = self.broker.endpoints().command_url(&account_id, device_id)?;
        let payload = StateEnvelope {
            metadevice_id: Some(device_id.to_owned()),
            values,
        };

        debug!("PUT {}", url);
        let builder = self.authorized(self.broker.http().put(url.clone()), &url).await?;
        let resp = builder
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::from_reqwest(e, self.broker.timeout_ms()))?;

        let envelope: StateEnvelope = check_and_decode(resp, self.broker.timeout_ms()).await?;
        Ok(envelope.values)
    }

    // ── Request helpers ──────────────────────────────────────────────

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!("GET {}", url);
        let builder = self.authorized(self.broker.http().get(url.clone()), &url).await?;
        let resp = builder
            .send()
            .await
            .map_err(|e| Error::from_reqwest(e, self.broker.timeout_ms()))?;
        check_and_decode(resp, self.broker.timeout_ms()).await
    }

    /// Attach the bearer token and the headers the provider insists on.
    async fn authorized(
        &self,
        builder: reqwest::RequestBuilder,
        url: &Url,
    ) -> Result<reqwest::RequestBuilder, Error> {
        let token = self.broker.get_access_token().await?;
        let mut builder = builder
            .header(USER_AGENT, APP_USER_AGENT)
            .bearer_auth(token.expose_secret());
        if let Some(host) = host_header(url) {
            builder = builder.header(HOST, host);
        }
        Ok(builder)
    }
}

// ── Response decoding ────────────────────────────────────────────────

/// Map the status to an error, then decode the JSON body.
///
/// 401/403 mean the bearer token was refused: that is an authentication
/// failure, not a transient fault.
pub(crate) async fn check_and_decode<T: DeserializeOwned>(
    resp: reqwest::Response,
    timeout_ms: u64,
) -> Result<T, Error> {
    let status = resp.status();

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(Error::Authentication {
            message: format!("bearer token rejected (HTTP {status})"),
        });
    }

    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::Api {
            status: status.as_u16(),
            message: preview(&body),
        });
    }

    decode_json(resp, timeout_ms).await
}

/// Decode a JSON body, keeping the raw text on failure.
pub(crate) async fn decode_json<T: DeserializeOwned>(
    resp: reqwest::Response,
    timeout_ms: u64,
) -> Result<T, Error> {
    let body = resp
        .text()
        .await
        .map_err(|e| Error::from_reqwest(e, timeout_ms))?;

    serde_json::from_str(&body).map_err(|e| Error::Deserialization {
        message: format!("{e} (body preview: {:?})", preview(&body)),
        body,
    })
}

/// First 200 characters of a body, for error messages.
pub(crate) fn preview(body: &str) -> String {
    body.chars().take(200).collect()
}
