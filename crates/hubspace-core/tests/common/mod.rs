#![allow(clippy::unwrap_used, dead_code)]
// Shared wiremock fixtures: an authenticated account and a small catalog.
//
// Catalog layout:
//   Living Room: "Ceiling Fan" unit (aggregate of fan-1 + light-1), "Lamp"
//   Outside:     "Patio" switch with two toggle zones

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use serde_json::{Value, json};
use url::Url;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use hubspace_api::Endpoints;
use hubspace_core::sync::SyncEvent;
use hubspace_core::{MIN_POLL_INTERVAL, Session, SessionConfig, SessionCredentials};

pub const ACCOUNT_ID: &str = "acct-0001";
pub const REFRESH_TOKEN: &str = "refresh-token-1";
pub const BEARER: &str = "id-token-1";

pub const TOKEN_PATH: &str = "/auth/realms/thd/protocol/openid-connect/token";
pub const WHOAMI_PATH: &str = "/v1/users/me";

pub fn metadevices_path() -> String {
    format!("/v1/accounts/{ACCOUNT_ID}/metadevices")
}

pub fn state_path(device_id: &str) -> String {
    format!("/v1/accounts/{ACCOUNT_ID}/metadevices/{device_id}/state")
}

// ── Account ─────────────────────────────────────────────────────────

/// Refresh grant and whoami, with no call-count expectations.
pub async fn mount_account(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id_token": BEARER,
            "expires_in": 120
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(WHOAMI_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "accountAccess": [{ "account": { "accountId": ACCOUNT_ID } }]
        })))
        .mount(server)
        .await;
}

/// Session config resuming from [`REFRESH_TOKEN`] against the mock server.
pub fn config(server: &MockServer) -> SessionConfig {
    let mut config = SessionConfig::new(SessionCredentials::RefreshToken(SecretString::from(
        REFRESH_TOKEN.to_owned(),
    )));
    config.endpoints = Endpoints::single_host(&Url::parse(&server.uri()).unwrap()).unwrap();
    config.poll_interval = MIN_POLL_INTERVAL;
    config.poll_timeout = Duration::from_secs(5);
    config.request_timeout = Duration::from_secs(5);
    config
}

pub async fn connected(config: SessionConfig) -> Session {
    let session = Session::new(config).unwrap();
    session.connect().await.unwrap();
    session
}

// ── Catalog ─────────────────────────────────────────────────────────

fn state(class: &str, instance: Option<&str>, value: Value, updated: i64) -> Value {
    let mut state = json!({
        "functionClass": class,
        "value": value,
        "lastUpdateTime": updated
    });
    if let Some(instance) = instance {
        state["functionInstance"] = json!(instance);
    }
    state
}

fn function(class: &str, instance: Option<&str>) -> Value {
    let mut function = json!({ "functionClass": class, "type": "category" });
    if let Some(instance) = instance {
        function["functionInstance"] = json!(instance);
    }
    function
}

fn device(
    id: &str,
    name: &str,
    class: &str,
    children: &[&str],
    functions: Vec<Value>,
    states: Vec<Value>,
) -> Value {
    json!({
        "id": id,
        "deviceId": "grp-1",
        "typeId": "metadevice.device",
        "friendlyName": name,
        "description": {
            "defaultName": class,
            "defaultImage": format!("{class}-icon"),
            "device": { "model": "MODEL-1", "deviceClass": class, "manufacturerName": "Acme" },
            "functions": functions
        },
        "children": children,
        "state": { "metadeviceId": id, "values": states }
    })
}

pub fn catalog() -> Value {
    let t = 1_700_000_000_000_i64;
    json!([
        {
            "id": "home-1", "typeId": "metadevice.home", "friendlyName": "Home",
            "children": ["room-1", "room-2"]
        },
        {
            "id": "room-1", "typeId": "metadevice.room", "friendlyName": "Living Room",
            "children": ["fan-unit", "lamp-1"]
        },
        {
            "id": "room-2", "typeId": "metadevice.room", "friendlyName": "Outside",
            "children": ["patio-1"]
        },
        device("fan-unit", "Ceiling Fan", "ceiling-fan", &["fan-1", "light-1"], vec![], vec![]),
        device(
            "fan-1", "Ceiling Fan", "fan", &[],
            vec![function("fan-speed", Some("fan-speed")), function("power", Some("fan-power"))],
            vec![
                state("fan-speed", Some("fan-speed"), json!("fan-speed-050"), t),
                state("power", Some("fan-power"), json!("on"), t),
            ],
        ),
        device(
            "light-1", "Ceiling Fan", "light", &[],
            vec![function("power", Some("light-power")), function("brightness", None)],
            vec![
                state("power", Some("light-power"), json!("on"), t),
                state("brightness", None, json!(60), t),
            ],
        ),
        device(
            "lamp-1", "Lamp", "light", &[],
            vec![
                function("power", None),
                function("brightness", None),
                function("wifi-ssid", None),
            ],
            vec![
                state("power", None, json!("off"), t),
                state("brightness", None, json!(40), t),
                state("wifi-ssid", None, json!("HomeNet"), t),
                state("wifi-mac-address", None, json!("a4cf12b3c4d5"), t),
            ],
        ),
        device(
            "patio-1", "Patio", "switch", &[],
            vec![
                function("toggle", Some("zone-1")),
                function("toggle", Some("zone-2")),
                function("power", None),
            ],
            vec![
                state("toggle", Some("zone-1"), json!("on"), t),
                state("toggle", Some("zone-2"), json!("off"), t),
                state("power", None, json!("on"), t),
            ],
        ),
    ])
}

/// Replace one state value (and optionally its timestamp) in a catalog body.
pub fn with_state(
    mut catalog: Value,
    device_id: &str,
    class: &str,
    instance: Option<&str>,
    value: Value,
    updated: Option<i64>,
) -> Value {
    let entry = catalog
        .as_array_mut()
        .unwrap()
        .iter_mut()
        .find(|d| d["id"] == device_id)
        .unwrap();
    let states = entry["state"]["values"].as_array_mut().unwrap();
    let slot = states
        .iter_mut()
        .find(|s| s["functionClass"] == class && s["functionInstance"].as_str() == instance)
        .unwrap();
    slot["value"] = value;
    if let Some(updated) = updated {
        slot["lastUpdateTime"] = json!(updated);
    }
    catalog
}

pub fn without_device(mut catalog: Value, device_id: &str) -> Value {
    catalog.as_array_mut().unwrap().retain(|d| d["id"] != device_id);
    catalog
}

/// Serve `bodies` in order; the last one answers every later request.
pub async fn mount_catalog_sequence(server: &MockServer, bodies: Vec<ResponseTemplate>) {
    let last = bodies.len().saturating_sub(1);
    for (i, response) in bodies.into_iter().enumerate() {
        let mock = Mock::given(method("GET"))
            .and(path(metadevices_path()))
            .and(query_param("expansions", "state"))
            .respond_with(response);
        if i == last {
            mock.mount(server).await;
        } else {
            mock.up_to_n_times(1).with_priority(1).mount(server).await;
        }
    }
}

pub async fn mount_catalog(server: &MockServer, body: Value) {
    mount_catalog_sequence(server, vec![ResponseTemplate::new(200).set_body_json(body)]).await;
}

pub fn ok(body: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(body)
}

// ── Events ──────────────────────────────────────────────────────────

/// Everything currently queued on a receiver.
pub fn drain(rx: &mut tokio::sync::broadcast::Receiver<Arc<SyncEvent>>) -> Vec<SyncEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push((*event).clone());
    }
    events
}
