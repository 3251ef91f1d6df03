// Extraction of login-flow parameters from the identity provider's
// semi-structured responses.
//
// The authorize endpoint answers with an HTML page whose form action embeds
// `session_code`, `execution` and `tab_id` as query parameters. The
// credential POST answers with a redirect whose `Location` carries the
// authorization code. Neither is a documented API, so parsing lives here,
// away from the transport code.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use url::Url;

static LOGIN_FORM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"session_code=(?P<session_code>[^&"\s]+)&(?:amp;)?execution=(?P<execution>[^&"\s]+)&(?:amp;)?client_id=[^&"\s]+&(?:amp;)?tab_id=(?P<tab_id>[^&"\s]+)"#,
    )
    .expect("valid regex")
});

static SESSION_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"session_code=(?P<v>[^&"\s]+)"#).expect("valid regex"));
static EXECUTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"execution=(?P<v>[^&"\s]+)"#).expect("valid regex"));
static TAB_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"tab_id=(?P<v>[^&"\s]+)"#).expect("valid regex"));

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LoginPageError {
    #[error("login page is missing `{0}`")]
    MissingField(&'static str),

    #[error("login redirect is missing a Location header")]
    MissingLocation,

    #[error("login redirect has no authorization code: {0}")]
    MissingCode(String),
}

impl From<LoginPageError> for crate::Error {
    fn from(err: LoginPageError) -> Self {
        Self::Authentication {
            message: err.to_string(),
        }
    }
}

/// Parameters for the credential POST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginForm {
    pub session_code: String,
    pub execution: String,
    pub tab_id: String,
}

impl LoginForm {
    /// Extract the login-action parameters from the authorize response body.
    ///
    /// The whole form action is matched first; when the provider reorders
    /// parameters each field is looked up on its own so the error names the
    /// field that is actually absent.
    pub fn parse(body: &str) -> Result<Self, LoginPageError> {
        if let Some(caps) = LOGIN_FORM.captures(body) {
            return Ok(Self {
                session_code: caps["session_code"].to_owned(),
                execution: caps["execution"].to_owned(),
                tab_id: caps["tab_id"].to_owned(),
            });
        }

        Ok(Self {
            session_code: capture(&SESSION_CODE, body, "session_code")?,
            execution: capture(&EXECUTION, body, "execution")?,
            tab_id: capture(&TAB_ID, body, "tab_id")?,
        })
    }

    /// The full login-action URL for this form.
    pub fn action_url(&self, base: &Url, client_id: &str) -> Url {
        let mut url = base.clone();
        url.query_pairs_mut()
            .append_pair("session_code", &self.session_code)
            .append_pair("execution", &self.execution)
            .append_pair("client_id", client_id)
            .append_pair("tab_id", &self.tab_id);
        url
    }
}

fn capture(re: &Regex, body: &str, field: &'static str) -> Result<String, LoginPageError> {
    re.captures(body)
        .map(|caps| caps["v"].to_owned())
        .ok_or(LoginPageError::MissingField(field))
}

/// Pull the authorization code out of a redirect `Location` value.
///
/// The redirect targets the app's custom scheme
/// (`hubspace-app://loginredirect?session_state=..&code=..`), which still
/// parses as a URL.
pub fn authorization_code_from_location(location: Option<&str>) -> Result<String, LoginPageError> {
    let location = location.ok_or(LoginPageError::MissingLocation)?;
    Url::parse(location)
        .ok()
        .and_then(|url| {
            url.query_pairs()
                .find(|(key, _)| key == "code")
                .map(|(_, value)| value.into_owned())
        })
        .filter(|code| !code.is_empty())
        .ok_or_else(|| LoginPageError::MissingCode(location.to_owned()))
}
