use thiserror::Error;

/// Top-level error type for the `hubspace-api` crate.
///
/// Covers every failure mode across both remote surfaces: the identity
/// provider (login + token exchange) and the device cloud (metadevices,
/// state reads and writes). `hubspace-core` maps these into domain errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login or token exchange failed (bad credentials, provider flow
    /// changed, refresh token revoked, or the exchange could not complete).
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request exceeded its deadline.
    #[error("Request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    // ── Device cloud ────────────────────────────────────────────────
    /// Non-success status from the device cloud.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this error indicates the credentials are stale
    /// and a new login is required.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }

    /// Returns `true` if this is a transient error that the next poll
    /// cycle may not hit again.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. } => true,
            Self::Api { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Api { status: 404, .. } => true,
            _ => false,
        }
    }

    /// Wrap any failure from the login/refresh flow as an authentication
    /// error. The identity provider gives no reliable way to tell a
    /// rejected credential from a lost response, so callers treat both
    /// as "credentials may be stale".
    pub(crate) fn into_auth(self) -> Self {
        match self {
            Self::Authentication { .. } => self,
            other => Self::Authentication {
                message: other.to_string(),
            },
        }
    }

    /// Translate a `reqwest` error, surfacing timeouts as their own kind.
    pub(crate) fn from_reqwest(err: reqwest::Error, timeout_ms: u64) -> Self {
        if err.is_timeout() {
            Self::Timeout { timeout_ms }
        } else {
            Self::Transport(err)
        }
    }
}
