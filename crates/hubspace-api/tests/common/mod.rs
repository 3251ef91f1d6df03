#![allow(clippy::unwrap_used, dead_code)]
// Shared wiremock fixtures for the identity provider and the device cloud.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use url::Url;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use hubspace_api::{Endpoints, TokenBroker, TransportConfig};

pub const ACCOUNT_ID: &str = "acct-0001";
pub const REFRESH_TOKEN: &str = "refresh-token-1";
pub const BEARER: &str = "id-token-1";

pub const AUTHORIZE_PATH: &str = "/auth/realms/thd/protocol/openid-connect/auth";
pub const LOGIN_ACTION_PATH: &str = "/auth/realms/thd/login-actions/authenticate";
pub const TOKEN_PATH: &str = "/auth/realms/thd/protocol/openid-connect/token";
pub const WHOAMI_PATH: &str = "/v1/users/me";

pub async fn broker(server: &MockServer, validity: Duration) -> Arc<TokenBroker> {
    broker_with_timeout(server, validity, Duration::from_secs(5)).await
}

pub async fn broker_with_timeout(
    server: &MockServer,
    validity: Duration,
    timeout: Duration,
) -> Arc<TokenBroker> {
    let base = Url::parse(&server.uri()).unwrap();
    let endpoints = Endpoints::single_host(&base).unwrap();
    let transport = TransportConfig {
        timeout,
        cookie_jar: None,
    };
    Arc::new(TokenBroker::new(endpoints, &transport, validity).unwrap())
}

pub fn login_page(server: &MockServer) -> String {
    format!(
        r#"<html><body><form id="kc-form-login" action="{}{LOGIN_ACTION_PATH}?session_code=SC-1&amp;execution=EX-1&amp;client_id=hubspace_android&amp;tab_id=TAB-1" method="post"></form></body></html>"#,
        server.uri()
    )
}

/// Mount the authorize page and the token exchange for an authorization code.
pub async fn mount_login_flow(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(AUTHORIZE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(login_page(server)))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=AUTH-CODE-1"))
        .and(body_string_contains("code_verifier="))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "unused-access",
            "id_token": "unused-id",
            "refresh_token": REFRESH_TOKEN,
            "expires_in": 120
        })))
        .mount(server)
        .await;
}

/// Mount the refresh-token grant, answering with [`BEARER`].
pub async fn mount_refresh(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id_token": BEARER,
            "access_token": "ignored-access",
            "expires_in": 120
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

pub async fn mount_whoami(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(WHOAMI_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "accountAccess": [{ "account": { "accountId": ACCOUNT_ID } }]
        })))
        .mount(server)
        .await;
}
