// ── Runtime session configuration ──
//
// These types describe *how* to reach the Hubspace cloud and what to
// expose. They carry credential data and tuning, but never touch disk.
// `hubspace-config` (or the host application) builds a `SessionConfig`
// and hands it in.

use std::time::Duration;

use secrecy::SecretString;

use hubspace_api::{DEFAULT_TOKEN_VALIDITY, Endpoints};

use crate::discovery::DiscoveryFilter;
use crate::error::CoreError;
use crate::sync::SyncConfig;

/// How to authenticate.
#[derive(Debug, Clone)]
pub enum SessionCredentials {
    /// Full PKCE login with account credentials.
    Password {
        username: String,
        password: SecretString,
    },
    /// Resume from a refresh token obtained earlier in this process.
    RefreshToken(SecretString),
}

/// Configuration for one account session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub endpoints: Endpoints,
    pub credentials: SessionCredentials,
    /// How long a bearer token is reused before a refresh.
    pub token_validity: Duration,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
    pub poll_interval: Duration,
    /// Upper bound on one catalog refresh during polling.
    pub poll_timeout: Duration,
    /// Exact friendly names to expose. Empty with `rooms` empty = all.
    pub friendly_names: Vec<String>,
    /// Room names whose devices to expose.
    pub rooms: Vec<String>,
}

impl SessionConfig {
    /// Defaults for everything except credentials.
    pub fn new(credentials: SessionCredentials) -> Self {
        let sync = SyncConfig::default();
        Self {
            endpoints: Endpoints::default(),
            credentials,
            token_validity: DEFAULT_TOKEN_VALIDITY,
            request_timeout: Duration::from_secs(10),
            poll_interval: sync.interval,
            poll_timeout: sync.poll_timeout,
            friendly_names: Vec::new(),
            rooms: Vec::new(),
        }
    }

    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            interval: self.poll_interval,
            poll_timeout: self.poll_timeout,
        }
    }

    pub fn discovery_filter(&self) -> DiscoveryFilter {
        DiscoveryFilter::new(self.friendly_names.iter().cloned(), self.rooms.iter().cloned())
    }

    /// Reject settings the session cannot run with. Out-of-range values
    /// are errors, never silently clamped.
    pub fn validate(&self) -> Result<(), CoreError> {
        self.sync_config().validate()?;

        if self.token_validity.is_zero() {
            return Err(CoreError::Config {
                message: "token validity must be greater than zero".into(),
            });
        }
        if self.request_timeout.is_zero() {
            return Err(CoreError::Config {
                message: "request timeout must be greater than zero".into(),
            });
        }
        if let SessionCredentials::Password { username, .. } = &self.credentials {
            if username.trim().is_empty() {
                return Err(CoreError::Config {
                    message: "username must not be empty".into(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SessionConfig {
        SessionConfig::new(SessionCredentials::Password {
            username: "user@example.com".into(),
            password: SecretString::from("hunter2".to_owned()),
        })
    }

    #[test]
    fn defaults_are_valid() {
        let config = config();
        assert!(config.validate().is_ok());
        assert_eq!(config.token_validity, Duration::from_secs(118));
        assert_eq!(config.poll_interval, Duration::from_secs(30));
        assert_eq!(config.poll_timeout, Duration::from_secs(10));
        assert!(config.discovery_filter().is_unrestricted());
    }

    #[test]
    fn sub_minimum_poll_interval_is_rejected() {
        let mut config = config();
        config.poll_interval = Duration::from_secs(1);
        assert!(matches!(config.validate(), Err(CoreError::Config { .. })));
    }

    #[test]
    fn blank_username_is_rejected() {
        let mut config = config();
        config.credentials = SessionCredentials::Password {
            username: "  ".into(),
            password: SecretString::from(String::new()),
        };
        assert!(config.validate().is_err());
    }
}
