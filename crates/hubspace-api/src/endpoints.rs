// Provider endpoint layout.
//
// Three hosts are involved: the identity realm (login + tokens), the API
// host (account lookup, catalog and state reads), and the semantics host
// (state writes). Each is configurable so tests can point them at a mock.

use url::Url;

use crate::error::Error;

/// OAuth client id of the mobile app.
pub const CLIENT_ID: &str = "hubspace_android";

/// Redirect URI registered for the mobile app. Never actually dereferenced.
pub const REDIRECT_URI: &str = "hubspace-app://loginredirect";

const DEFAULT_AUTH_BASE: &str = "https://accounts.hubspaceconnect.com/auth/realms/thd/";
const DEFAULT_API_BASE: &str = "https://api2.afero.net/v1/";
const DEFAULT_SEMANTICS_BASE: &str = "https://semantics2.afero.net/v1/";

/// Base URLs for every remote surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Identity realm root, e.g. `https://accounts.../auth/realms/thd/`.
    pub auth_base: Url,
    /// API host root, e.g. `https://api2.afero.net/v1/`.
    pub api_base: Url,
    /// Command host root, e.g. `https://semantics2.afero.net/v1/`.
    pub semantics_base: Url,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            auth_base: Url::parse(DEFAULT_AUTH_BASE).expect("valid default auth URL"),
            api_base: Url::parse(DEFAULT_API_BASE).expect("valid default API URL"),
            semantics_base: Url::parse(DEFAULT_SEMANTICS_BASE)
                .expect("valid default semantics URL"),
        }
    }
}

impl Endpoints {
    /// Point all three surfaces at one server (mock servers, proxies).
    ///
    /// Paths mirror the production layout: `/auth/realms/thd/` for the
    /// identity realm and `/v1/` for both API hosts.
    pub fn single_host(base: &Url) -> Result<Self, Error> {
        Ok(Self {
            auth_base: base.join("/auth/realms/thd/")?,
            api_base: base.join("/v1/")?,
            semantics_base: base.join("/v1/")?,
        })
    }

    // ── Identity realm ───────────────────────────────────────────────

    pub fn authorize_url(&self) -> Result<Url, Error> {
        Ok(self.auth_base.join("protocol/openid-connect/auth")?)
    }

    pub fn login_action_url(&self) -> Result<Url, Error> {
        Ok(self.auth_base.join("login-actions/authenticate")?)
    }

    pub fn token_url(&self) -> Result<Url, Error> {
        Ok(self.auth_base.join("protocol/openid-connect/token")?)
    }

    // ── Device cloud ─────────────────────────────────────────────────

    pub fn whoami_url(&self) -> Result<Url, Error> {
        Ok(self.api_base.join("users/me")?)
    }

    pub fn metadevices_url(&self, account_id: &str) -> Result<Url, Error> {
        let mut url = self
            .api_base
            .join(&format!("accounts/{account_id}/metadevices"))?;
        url.query_pairs_mut().append_pair("expansions", "state");
        Ok(url)
    }

    pub fn state_url(&self, account_id: &str, device_id: &str) -> Result<Url, Error> {
        Ok(self
            .api_base
            .join(&format!("accounts/{account_id}/metadevices/{device_id}/state"))?)
    }

    pub fn command_url(&self, account_id: &str, device_id: &str) -> Result<Url, Error> {
        Ok(self
            .semantics_base
            .join(&format!("accounts/{account_id}/metadevices/{device_id}/state"))?)
    }
}

/// The `host` header value for a URL, including a non-default port.
pub(crate) fn host_header(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_owned(),
    })
}
