// Wire types for the identity provider and the device cloud.
//
// Only the fields the client acts on are typed; everything else a
// function descriptor carries is kept as raw JSON so nothing is lost
// when the provider adds metadata.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Identity provider ────────────────────────────────────────────────

/// Token endpoint response (both grant types).
///
/// The refresh grant answers with an `id_token`, which is what the device
/// cloud accepts as a bearer credential; `access_token` is the fallback.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

impl TokenResponse {
    /// The credential to send as `Authorization: Bearer`.
    pub fn bearer(&self) -> Option<&str> {
        self.id_token
            .as_deref()
            .or(self.access_token.as_deref())
            .filter(|t| !t.is_empty())
    }
}

/// `GET users/me` response, reduced to the account id path.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhoAmI {
    #[serde(default)]
    pub account_access: Vec<AccountAccess>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountAccess {
    pub account: AccountRef,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRef {
    pub account_id: String,
}

impl WhoAmI {
    /// `accountAccess[0].account.accountId`
    pub fn account_id(&self) -> Option<&str> {
        self.account_access
            .first()
            .map(|access| access.account.account_id.as_str())
    }
}

// ── Device cloud ─────────────────────────────────────────────────────

/// `typeId` of a device entry in the metadevice list.
pub const TYPE_DEVICE: &str = "metadevice.device";
/// `typeId` of a room entry in the metadevice list.
pub const TYPE_ROOM: &str = "metadevice.room";

/// One entry of the flat metadevice list: a device, a room, or a home.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaDeviceRecord {
    pub id: String,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub type_id: String,
    #[serde(default)]
    pub friendly_name: String,
    #[serde(default)]
    pub description: DescriptionRecord,
    #[serde(default)]
    pub children: Vec<String>,
    #[serde(default)]
    pub state: Option<StateEnvelope>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptionRecord {
    #[serde(default)]
    pub default_name: String,
    #[serde(default)]
    pub default_image: String,
    #[serde(default)]
    pub device: DeviceInfoRecord,
    #[serde(default)]
    pub functions: Vec<FunctionRecord>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfoRecord {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub device_class: String,
    #[serde(default)]
    pub manufacturer_name: Option<String>,
}

/// A capability declaration. `type`, `values` and any other metadata
/// are kept in `extra` untouched.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionRecord {
    pub function_class: String,
    #[serde(default)]
    pub function_instance: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// State read/write envelope.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadevice_id: Option<String>,
    #[serde(default)]
    pub values: Vec<StateRecord>,
}

/// One addressed state value. `functionInstance` is omitted from
/// outgoing payloads when absent (addresses the primary instance).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateRecord {
    pub function_class: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_instance: Option<String>,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub last_update_time: i64,
}
