// Session/token lifecycle
//
// Three-step PKCE login against the identity provider, then a cached
// short-lived bearer token minted from the long-lived refresh token.
// One `TokenBroker` per set of credentials; every other component asks it
// for a bearer token and never touches the refresh token directly.

pub mod login_page;
pub mod pkce;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqwest::header::{HOST, LOCATION, USER_AGENT};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::{Mutex, OnceCell};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

use crate::client::{check_and_decode, decode_json, preview};
use crate::endpoints::{CLIENT_ID, Endpoints, REDIRECT_URI, host_header};
use crate::error::Error;
use crate::models::{TokenResponse, WhoAmI};
use crate::transport::{APP_USER_AGENT, BROWSER_USER_AGENT, TransportConfig};

use login_page::{LoginForm, authorization_code_from_location};
use pkce::CodeVerifier;

/// Observed lifetime of a bearer token, minus a small safety margin.
pub const DEFAULT_TOKEN_VALIDITY: Duration = Duration::from_secs(118);

const LOGIN_SCOPE: &str = "openid offline_access";
const REFRESH_SCOPE: &str = "openid email offline_access profile";

/// Session credentials. Never persisted.
#[derive(Debug, Clone)]
pub struct Credential {
    /// The only long-lived secret, obtained once per login.
    pub refresh_token: SecretString,
    pub access_token: Option<SecretString>,
    pub access_token_issued_at: Option<Instant>,
}

impl Credential {
    pub fn from_refresh_token(refresh_token: SecretString) -> Self {
        Self {
            refresh_token,
            access_token: None,
            access_token_issued_at: None,
        }
    }

    /// The cached bearer token, if it is still inside `validity`.
    fn fresh_access_token(&self, validity: Duration) -> Option<&SecretString> {
        let issued_at = self.access_token_issued_at?;
        if issued_at.elapsed() < validity {
            self.access_token.as_ref()
        } else {
            None
        }
    }
}

/// Sole source of valid bearer credentials for one account.
///
/// Refresh-token exchanges are serialized behind a mutex: concurrent
/// callers that find the cache stale queue up, and all but the first find
/// a freshly minted token when they get the lock.
///
/// An exchange runs in its own task holding the lock, so it completes and
/// stores any rotated refresh token even when the caller gives up waiting.
pub struct TokenBroker {
    http: reqwest::Client,
    endpoints: Endpoints,
    validity: Duration,
    timeout_ms: u64,
    credential: Arc<Mutex<Option<Credential>>>,
    account_id: OnceCell<String>,
    refresh_count: Arc<AtomicU64>,
}

impl TokenBroker {
    /// Create a broker with its own HTTP client and cookie jar.
    ///
    /// The identity provider ties the authorize page and the credential
    /// POST together with a session cookie, so the jar is mandatory.
    pub fn new(
        endpoints: Endpoints,
        transport: &TransportConfig,
        validity: Duration,
    ) -> Result<Self, Error> {
        let config = if transport.cookie_jar.is_some() {
            transport.clone()
        } else {
            transport.clone().with_cookie_jar()
        };
        let http = config.build_client()?;
        Ok(Self::with_client(
            http,
            endpoints,
            validity,
            config.timeout_ms(),
        ))
    }

    /// Create a broker around a pre-built client (must not follow redirects).
    pub fn with_client(
        http: reqwest::Client,
        endpoints: Endpoints,
        validity: Duration,
        timeout_ms: u64,
    ) -> Self {
        Self {
            http,
            endpoints,
            validity,
            timeout_ms,
            credential: Arc::new(Mutex::new(None)),
            account_id: OnceCell::new(),
            refresh_count: Arc::new(AtomicU64::new(0)),
        }
    }

    /// The underlying HTTP client, shared with the device-cloud client.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    /// How many refresh-token exchanges this broker has performed.
    pub fn refresh_count(&self) -> u64 {
        self.refresh_count.load(Ordering::Relaxed)
    }

    /// A copy of the current credential, if logged in.
    pub async fn credential(&self) -> Option<Credential> {
        self.credential.lock().await.clone()
    }

    // ── Login ─────────────────────────────────────────────────────────

    /// Run the full PKCE login and store the resulting credential.
    ///
    /// 1. `GET` the authorize page with the code challenge and scrape the
    ///    login form parameters out of it.
    /// 2. `POST` username/password to the login action without following
    ///    the redirect; the `Location` header carries the authorization code.
    /// 3. Exchange the code plus the verifier for a refresh token.
    ///
    /// Any missing field or failed step is an [`Error::Authentication`].
    pub async fn login(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<Credential, Error> {
        let verifier = CodeVerifier::generate();

        let form = self
            .fetch_login_form(&verifier)
            .await
            .map_err(Error::into_auth)?;
        debug!("login form extracted");

        let code = self
            .submit_credentials(&form, username, password)
            .await
            .map_err(Error::into_auth)?;
        debug!("authorization code received");

        let refresh_token = self
            .exchange_code(&code, &verifier)
            .await
            .map_err(Error::into_auth)?;

        let credential = Credential::from_refresh_token(refresh_token);
        *self.credential.lock().await = Some(credential.clone());
        info!("login successful");
        Ok(credential)
    }

    /// Resume a session from a refresh token obtained earlier in this process.
    pub async fn restore(&self, refresh_token: SecretString) {
        *self.credential.lock().await = Some(Credential::from_refresh_token(refresh_token));
        debug!("session restored from refresh token");
    }

    async fn fetch_login_form(&self, verifier: &CodeVerifier) -> Result<LoginForm, Error> {
        let url = self.endpoints.authorize_url()?;
        debug!("GET {}", url);

        let resp = self
            .http
            .get(url)
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .query(&[
                ("response_type", "code"),
                ("client_id", CLIENT_ID),
                ("redirect_uri", REDIRECT_URI),
                ("code_challenge", verifier.challenge().as_str()),
                ("code_challenge_method", "S256"),
                ("scope", LOGIN_SCOPE),
            ])
            .send()
            .await
            .map_err(|e| Error::from_reqwest(e, self.timeout_ms))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| Error::from_reqwest(e, self.timeout_ms))?;
        if !status.is_success() {
            return Err(Error::Authentication {
                message: format!("authorize page returned HTTP {status}"),
            });
        }

        Ok(LoginForm::parse(&body)?)
    }

    async fn submit_credentials(
        &self,
        form: &LoginForm,
        username: &str,
        password: &SecretString,
    ) -> Result<String, Error> {
        let base = self.endpoints.login_action_url()?;
        debug!("POST {}", base);
        let url = form.action_url(&base, CLIENT_ID);

        let resp = self
            .http
            .post(url)
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .form(&[
                ("username", username),
                ("password", password.expose_secret()),
                ("credentialId", ""),
            ])
            .send()
            .await
            .map_err(|e| Error::from_reqwest(e, self.timeout_ms))?;

        if !resp.status().is_redirection() {
            // The provider re-renders the login page on bad credentials.
            return Err(Error::Authentication {
                message: format!(
                    "credentials rejected (HTTP {} instead of a redirect)",
                    resp.status()
                ),
            });
        }

        let location = resp.headers().get(LOCATION).and_then(|v| v.to_str().ok());
        Ok(authorization_code_from_location(location)?)
    }

    async fn exchange_code(
        &self,
        code: &str,
        verifier: &CodeVerifier,
    ) -> Result<SecretString, Error> {
        let tokens = self
            .token_request(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", REDIRECT_URI),
                ("code_verifier", verifier.expose()),
                ("client_id", CLIENT_ID),
            ])
            .await?;

        tokens
            .refresh_token
            .filter(|t| !t.is_empty())
            .map(SecretString::from)
            .ok_or_else(|| Error::Authentication {
                message: "token response has no refresh_token".into(),
            })
    }

    // ── Access tokens ─────────────────────────────────────────────────

    /// Return a bearer token, minting a new one if the cached one has aged
    /// past the validity window.
    pub async fn get_access_token(&self) -> Result<SecretString, Error> {
        let mut guard = Arc::clone(&self.credential).lock_owned().await;
        let credential = guard.as_ref().ok_or_else(|| Error::Authentication {
            message: "not logged in".into(),
        })?;

        if let Some(token) = credential.fresh_access_token(self.validity) {
            return Ok(token.clone());
        }

        debug!("access token stale, refreshing");
        let refresh_token = credential.refresh_token.clone();
        let http = self.http.clone();
        let url = self.endpoints.token_url()?;
        let timeout_ms = self.timeout_ms;
        let refresh_count = Arc::clone(&self.refresh_count);

        // The task owns the lock guard: once the provider has consumed the
        // old refresh token, the outcome is written back no matter what
        // happens to this caller.
        let exchange = tokio::spawn(async move {
            let tokens = post_token_form(
                &http,
                &url,
                &[
                    ("grant_type", "refresh_token"),
                    ("refresh_token", refresh_token.expose_secret()),
                    ("scope", REFRESH_SCOPE),
                    ("client_id", CLIENT_ID),
                ],
                timeout_ms,
            )
            .await
            .map_err(Error::into_auth)?;
            refresh_count.fetch_add(1, Ordering::Relaxed);

            let credential = guard.as_mut().ok_or_else(|| Error::Authentication {
                message: "not logged in".into(),
            })?;
            // Providers that rotate refresh tokens hand back a new one here.
            if let Some(rotated) = tokens.refresh_token.clone().filter(|t| !t.is_empty()) {
                credential.refresh_token = SecretString::from(rotated);
            }

            let bearer = tokens.bearer().ok_or_else(|| Error::Authentication {
                message: "token response has neither id_token nor access_token".into(),
            })?;
            let bearer = SecretString::from(bearer.to_owned());
            credential.access_token = Some(bearer.clone());
            credential.access_token_issued_at = Some(Instant::now());
            Ok::<_, Error>(bearer)
        });

        exchange.await.map_err(|e| {
            warn!(error = %e, "token refresh task failed");
            Error::Authentication {
                message: format!("token refresh did not complete: {e}"),
            }
        })?
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenResponse, Error> {
        let url = self.endpoints.token_url()?;
        post_token_form(&self.http, &url, form, self.timeout_ms).await
    }

    // ── Account ───────────────────────────────────────────────────────

    /// Resolve the account id once; it cannot change without a new login.
    pub async fn get_account_id(&self) -> Result<String, Error> {
        self.account_id
            .get_or_try_init(|| self.fetch_account_id())
            .await
            .cloned()
    }

    async fn fetch_account_id(&self) -> Result<String, Error> {
        let token = self.get_access_token().await?;
        let url = self.endpoints.whoami_url()?;
        debug!("GET {}", url);

        let mut builder = self
            .http
            .get(url.clone())
            .header(USER_AGENT, APP_USER_AGENT)
            .bearer_auth(token.expose_secret());
        if let Some(host) = host_header(&url) {
            builder = builder.header(HOST, host);
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| Error::from_reqwest(e, self.timeout_ms))?;
        let me: WhoAmI = check_and_decode(resp, self.timeout_ms).await?;

        let account_id = me
            .account_id()
            .ok_or_else(|| Error::Authentication {
                message: "users/me response has no accountAccess[0].account.accountId".into(),
            })?
            .to_owned();
        debug!(%account_id, "resolved account id");
        Ok(account_id)
    }
}

/// POST a form to the token endpoint. Any non-2xx is an authentication
/// failure.
async fn post_token_form(
    http: &reqwest::Client,
    url: &Url,
    form: &[(&str, &str)],
    timeout_ms: u64,
) -> Result<TokenResponse, Error> {
    debug!("POST {}", url);

    let mut builder = http.post(url.clone()).header(USER_AGENT, APP_USER_AGENT);
    if let Some(host) = host_header(url) {
        builder = builder.header(HOST, host);
    }

    let resp = builder
        .form(form)
        .send()
        .await
        .map_err(|e| Error::from_reqwest(e, timeout_ms))?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::Authentication {
            message: format!(
                "token exchange rejected (HTTP {status}): {}",
                preview(&body)
            ),
        });
    }

    decode_json(resp, timeout_ms).await
}
