// ── Core error types ──
//
// Domain errors surfaced to collaborators (entity adapters, the session
// owner). Transport-level detail from `hubspace-api` is folded into these
// variants; nothing above this crate matches on HTTP status codes.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Session ──────────────────────────────────────────────────────
    /// Login or token refresh failed. The credentials are probably stale;
    /// the session owner must re-authenticate, never retry silently.
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    // ── Remote reads ─────────────────────────────────────────────────
    /// Catalog or state read failed. The previous snapshot stays valid.
    #[error("Fetch failed: {message}")]
    Fetch { message: String },

    /// A bounded operation exceeded its deadline.
    #[error("Operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    // ── Local lookups ────────────────────────────────────────────────
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: &'static str,
        identifier: String,
    },

    // ── Writes ───────────────────────────────────────────────────────
    /// A state write was rejected or the echo could not be interpreted.
    #[error("Command failed: {message}")]
    Command { message: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::AuthenticationFailed { .. })
    }

    /// Fetch and timeout failures degrade availability but never end a poll loop.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Fetch { .. } | Self::Timeout { .. })
    }

    pub(crate) fn device_not_found(id: &str) -> Self {
        Self::NotFound {
            entity_type: "Device",
            identifier: id.to_owned(),
        }
    }

    /// Translate an API error raised while issuing a command.
    ///
    /// Authentication and timeouts keep their own kind; anything else is a
    /// rejected command.
    pub(crate) fn from_command(err: hubspace_api::Error) -> Self {
        match err {
            hubspace_api::Error::Authentication { .. } | hubspace_api::Error::Timeout { .. } => {
                err.into()
            }
            other => Self::Command {
                message: other.to_string(),
            },
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<hubspace_api::Error> for CoreError {
    fn from(err: hubspace_api::Error) -> Self {
        match err {
            hubspace_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            hubspace_api::Error::Timeout { timeout_ms } => CoreError::Timeout { timeout_ms },
            hubspace_api::Error::Transport(ref e) if e.is_timeout() => {
                CoreError::Timeout { timeout_ms: 0 }
            }
            hubspace_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            hubspace_api::Error::Transport(e) => CoreError::Fetch {
                message: e.to_string(),
            },
            hubspace_api::Error::Api { status, message } => CoreError::Fetch {
                message: format!("HTTP {status}: {message}"),
            },
            hubspace_api::Error::Deserialization { message, body: _ } => CoreError::Fetch {
                message: format!("unreadable response: {message}"),
            },
        }
    }
}
