//! Configuration for Hubspace sessions.
//!
//! TOML account profiles, credential resolution (env + keyring +
//! plaintext), and translation to `hubspace_core::SessionConfig`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use hubspace_api::Endpoints;
use hubspace_core::{SessionConfig, SessionCredentials};

/// Keyring service under which passwords are stored.
pub const KEYRING_SERVICE: &str = "hubspace";

const ENV_PREFIX: &str = "HUBSPACE_";
const PASSWORD_ENV: &str = "HUBSPACE_PASSWORD";
const USERNAME_ENV: &str = "HUBSPACE_USERNAME";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is named.
    pub default_profile: Option<String>,

    /// Tuning shared by every profile.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named account profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Look up a profile by name, falling back to `default_profile`.
    pub fn profile(&self, name: Option<&str>) -> Result<(&str, &Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .ok_or_else(|| ConfigError::Validation {
                field: "default_profile".into(),
                reason: "no profile named and no default set".into(),
            })?;
        self.profiles
            .get_key_value(name)
            .map(|(k, v)| (k.as_str(), v))
            .ok_or_else(|| ConfigError::Validation {
                field: "profile".into(),
                reason: format!("no profile named '{name}'"),
            })
    }
}

/// Timings in whole seconds.
#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    /// Per-request HTTP timeout.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,

    /// Upper bound on one catalog refresh during polling.
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout: u64,

    /// How long a bearer token is reused before a refresh.
    #[serde(default = "default_token_validity")]
    pub token_validity: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            poll_interval: default_poll_interval(),
            poll_timeout: default_poll_timeout(),
            token_validity: default_token_validity(),
        }
    }
}

fn default_timeout() -> u64 {
    10
}
fn default_poll_interval() -> u64 {
    30
}
fn default_poll_timeout() -> u64 {
    10
}
fn default_token_validity() -> u64 {
    118
}
fn default_true() -> bool {
    true
}

/// One Hubspace account.
#[derive(Debug, Deserialize, Serialize)]
pub struct Profile {
    /// Account e-mail address.
    pub username: Option<String>,

    /// Password (plaintext, prefer keyring or `HUBSPACE_PASSWORD`).
    pub password: Option<String>,

    /// Consult the system keyring for the password.
    #[serde(default = "default_true")]
    pub keyring: bool,

    /// Exact friendly names to expose.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub friendly_names: Vec<String>,

    /// Rooms whose devices to expose.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rooms: Vec<String>,

    /// Identity realm override, e.g. for a proxy.
    pub auth_url: Option<String>,

    /// API host override.
    pub api_url: Option<String>,

    /// Command host override.
    pub semantics_url: Option<String>,

    pub timeout: Option<u64>,
    pub poll_interval: Option<u64>,
    pub poll_timeout: Option<u64>,
    pub token_validity: Option<u64>,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            username: None,
            password: None,
            keyring: true,
            friendly_names: Vec::new(),
            rooms: Vec::new(),
            auth_url: None,
            api_url: None,
            semantics_url: None,
            timeout: None,
            poll_interval: None,
            poll_timeout: None,
            token_validity: None,
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "hubspace", "hubspace").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("hubspace");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file, then overlay `HUBSPACE_` variables.
///
/// Nested keys use a double underscore: `HUBSPACE_DEFAULTS__POLL_INTERVAL`.
/// A missing file is not an error.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(
            Env::prefixed(ENV_PREFIX)
                .ignore(&["password", "username"])
                .split("__"),
        );

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if loading fails.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

/// Store a profile's password in the system keyring.
pub fn store_password(profile_name: &str, password: &SecretString) -> Result<(), ConfigError> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, &keyring_user(profile_name))?;
    entry.set_password(password.expose_secret())?;
    Ok(())
}

fn keyring_user(profile_name: &str) -> String {
    format!("{profile_name}/password")
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve username + password for a profile.
///
/// The username comes from the profile, then `HUBSPACE_USERNAME`. The
/// password from `HUBSPACE_PASSWORD`, then the keyring, then plaintext.
pub fn resolve_credentials(
    profile: &Profile,
    profile_name: &str,
) -> Result<(String, SecretString), ConfigError> {
    let username = profile
        .username
        .clone()
        .or_else(|| std::env::var(USERNAME_ENV).ok())
        .ok_or_else(|| ConfigError::NoCredentials {
            profile: profile_name.into(),
        })?;

    // 1. Env var
    if let Ok(pw) = std::env::var(PASSWORD_ENV) {
        return Ok((username, SecretString::from(pw)));
    }

    // 2. Keyring
    if profile.keyring {
        if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &keyring_user(profile_name)) {
            if let Ok(pw) = entry.get_password() {
                return Ok((username, SecretString::from(pw)));
            }
        }
    }

    // 3. Plaintext in config
    if let Some(ref pw) = profile.password {
        return Ok((username, SecretString::from(pw.clone())));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

fn parse_url(field: &str, raw: &str) -> Result<Url, ConfigError> {
    // Bases are joined against, so they need a trailing slash.
    let normalized = if raw.ends_with('/') {
        raw.to_owned()
    } else {
        format!("{raw}/")
    };
    normalized.parse().map_err(|_| ConfigError::Validation {
        field: field.into(),
        reason: format!("invalid URL: {raw}"),
    })
}

fn endpoints(profile: &Profile) -> Result<Endpoints, ConfigError> {
    let mut endpoints = Endpoints::default();
    if let Some(ref raw) = profile.auth_url {
        endpoints.auth_base = parse_url("auth_url", raw)?;
    }
    if let Some(ref raw) = profile.api_url {
        endpoints.api_base = parse_url("api_url", raw)?;
    }
    if let Some(ref raw) = profile.semantics_url {
        endpoints.semantics_base = parse_url("semantics_url", raw)?;
    }
    Ok(endpoints)
}

/// Build a validated `SessionConfig` from a profile.
///
/// Per-profile timings override `defaults`. Out-of-range values are
/// reported as `ConfigError::Validation`, never clamped.
pub fn profile_to_session_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<SessionConfig, ConfigError> {
    let (username, password) = resolve_credentials(profile, profile_name)?;

    let mut config = SessionConfig::new(SessionCredentials::Password { username, password });
    config.endpoints = endpoints(profile)?;
    config.request_timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    config.poll_interval =
        Duration::from_secs(profile.poll_interval.unwrap_or(defaults.poll_interval));
    config.poll_timeout =
        Duration::from_secs(profile.poll_timeout.unwrap_or(defaults.poll_timeout));
    config.token_validity =
        Duration::from_secs(profile.token_validity.unwrap_or(defaults.token_validity));
    config.friendly_names.clone_from(&profile.friendly_names);
    config.rooms.clone_from(&profile.rooms);

    config.validate().map_err(|e| ConfigError::Validation {
        field: format!("profiles.{profile_name}"),
        reason: e.to_string(),
    })?;
    Ok(config)
}

/// Load a profile (or the default one) and build its `SessionConfig`.
pub fn session_config(cfg: &Config, profile: Option<&str>) -> Result<SessionConfig, ConfigError> {
    let (name, profile) = cfg.profile(profile)?;
    profile_to_session_config(profile, name, &cfg.defaults)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn url_overrides_gain_a_trailing_slash() {
        let url = parse_url("api_url", "http://localhost:8080/v1").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/v1/");
        assert!(parse_url("api_url", "not a url").is_err());
    }

    #[test]
    fn unknown_profile_is_a_validation_error() {
        let cfg = Config::default();
        assert!(matches!(
            cfg.profile(None),
            Err(ConfigError::Validation { ref field, .. }) if field == "profile"
        ));
    }
}
