// ── Device catalog ──
//
// Holds the current `CatalogSnapshot` behind an `ArcSwap`. Polls build a
// new snapshot off to the side and swap it in; command writes patch a copy
// with `rcu`, so readers never observe a half-applied update and a poll
// that is abandoned mid-flight leaves the catalog untouched.

use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info};

use hubspace_api::AferoClient;

use super::snapshot::CatalogSnapshot;
use crate::convert::partition_records;
use crate::error::CoreError;
use crate::model::{MetaDevice, Room, StateKey, StateValue};

pub struct DeviceCatalog {
    client: AferoClient,
    snapshot: ArcSwap<CatalogSnapshot>,
    last_refresh: watch::Sender<Option<DateTime<Utc>>>,
}

impl DeviceCatalog {
    pub fn new(client: AferoClient) -> Self {
        let (last_refresh, _) = watch::channel(None);
        Self {
            client,
            snapshot: ArcSwap::from_pointee(CatalogSnapshot::default()),
            last_refresh,
        }
    }

    pub fn client(&self) -> &AferoClient {
        &self.client
    }

    // ── Refresh ──────────────────────────────────────────────────────

    /// Fetch the full metadevice list and replace the snapshot wholesale.
    ///
    /// On error the previous snapshot is left in place.
    pub async fn refresh(&self) -> Result<Arc<CatalogSnapshot>, CoreError> {
        let records = self.client.list_metadevices().await?;
        let (devices, rooms) = partition_records(records);
        let snapshot = Arc::new(CatalogSnapshot::new(devices, rooms));

        info!(
            devices = snapshot.len(),
            rooms = snapshot.rooms().len(),
            "catalog refreshed"
        );
        self.snapshot.store(Arc::clone(&snapshot));
        let _ = self.last_refresh.send(snapshot.fetched_at());
        Ok(snapshot)
    }

    /// Re-read one device's state through the state endpoint and patch it
    /// into the current snapshot, without a full catalog fetch.
    pub async fn refresh_device_state(
        &self,
        device_id: &str,
    ) -> Result<Arc<MetaDevice>, CoreError> {
        self.get(device_id)?;
        let values: Vec<StateValue> = self
            .client
            .get_state(device_id)
            .await?
            .into_iter()
            .map(StateValue::from)
            .collect();
        debug!(device_id, values = values.len(), "device state refreshed");

        let mut updated = None;
        self.snapshot.rcu(|current| {
            let Some(device) = current.device(device_id) else {
                updated = None;
                return Arc::clone(current);
            };
            let mut device = (**device).clone();
            device.states.clone_from(&values);
            let next = current.with_device(device);
            updated = next.device(device_id).cloned();
            Arc::new(next)
        });

        updated.ok_or_else(|| CoreError::device_not_found(device_id))
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// The current snapshot (cheap `Arc` clone).
    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        self.snapshot.load_full()
    }

    pub fn get(&self, device_id: &str) -> Result<Arc<MetaDevice>, CoreError> {
        self.snapshot
            .load()
            .device(device_id)
            .cloned()
            .ok_or_else(|| CoreError::device_not_found(device_id))
    }

    /// Value of the state with exactly this key. `None` as the instance
    /// matches only a state without an instance.
    pub fn get_state(
        &self,
        device_id: &str,
        function_class: &str,
        function_instance: Option<&str>,
    ) -> Result<Value, CoreError> {
        let device = self.get(device_id)?;
        device
            .state(function_class, function_instance)
            .map(|s| s.value.clone())
            .ok_or_else(|| CoreError::NotFound {
                entity_type: "State",
                identifier: format!(
                    "{device_id}:{}",
                    StateKey::new(function_class, function_instance)
                ),
            })
    }

    pub fn list_rooms(&self) -> Vec<Room> {
        self.snapshot.load().rooms().to_vec()
    }

    pub fn devices_with_function(
        &self,
        function_class: &str,
        function_instance: Option<&str>,
    ) -> Vec<Arc<MetaDevice>> {
        self.snapshot
            .load()
            .devices_with_function(function_class, function_instance)
    }

    /// Subscribe to the time of the last successful full refresh.
    pub fn last_refresh(&self) -> watch::Receiver<Option<DateTime<Utc>>> {
        self.last_refresh.subscribe()
    }

    // ── Local writes ─────────────────────────────────────────────────

    /// Insert or replace one state value on a device. Returns the value it
    /// replaced, if any.
    pub(crate) fn patch_state(
        &self,
        device_id: &str,
        value: &StateValue,
    ) -> Result<Option<StateValue>, CoreError> {
        let mut found = false;
        let mut previous = None;

        self.snapshot.rcu(|current| {
            let Some(device) = current.device(device_id) else {
                found = false;
                return Arc::clone(current);
            };
            found = true;
            let mut device = (**device).clone();
            previous = device.upsert_state(value.clone());
            Arc::new(current.with_device(device))
        });

        if found {
            Ok(previous)
        } else {
            Err(CoreError::device_not_found(device_id))
        }
    }

    /// Undo an optimistic write, but only while the state still holds the
    /// value that write put there. A newer poll or write wins.
    pub(crate) fn restore_state(
        &self,
        device_id: &str,
        key: &StateKey,
        optimistic: &Value,
        previous: Option<StateValue>,
    ) -> bool {
        let mut restored = false;

        self.snapshot.rcu(|current| {
            restored = false;
            let Some(device) = current.device(device_id) else {
                return Arc::clone(current);
            };
            let still_optimistic = device
                .state(&key.function_class, key.function_instance.as_deref())
                .is_some_and(|s| &s.value == optimistic);
            if !still_optimistic {
                return Arc::clone(current);
            }

            let mut device = (**device).clone();
            match &previous {
                Some(prev) => {
                    device.upsert_state(prev.clone());
                }
                None => device.remove_state(key),
            }
            restored = true;
            Arc::new(current.with_device(device))
        });

        restored
    }

    /// Install a snapshot directly.
    #[cfg(test)]
    pub(crate) fn replace_snapshot(&self, snapshot: CatalogSnapshot) {
        self.snapshot.store(Arc::new(snapshot));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use hubspace_api::{DEFAULT_TOKEN_VALIDITY, Endpoints, TokenBroker, TransportConfig};
    use serde_json::json;

    use super::*;

    fn offline_catalog() -> DeviceCatalog {
        let endpoints = Endpoints::single_host(&"http://127.0.0.1:9/".parse().unwrap()).unwrap();
        let broker = TokenBroker::new(
            endpoints,
            &TransportConfig::default(),
            DEFAULT_TOKEN_VALIDITY,
        )
        .unwrap();
        DeviceCatalog::new(AferoClient::new(Arc::new(broker)))
    }

    fn fan() -> MetaDevice {
        MetaDevice {
            id: "fan-1".into(),
            device_id: Some("grp-1".into()),
            model: "52133-CR".into(),
            device_class: "fan".into(),
            default_name: "Fan".into(),
            default_image: String::new(),
            friendly_name: "Bedroom Fan".into(),
            functions: Vec::new(),
            children: Vec::new(),
            states: vec![StateValue {
                function_class: "fan-speed".into(),
                function_instance: Some("fan-speed".into()),
                value: json!("fan-speed-050"),
                last_update_time: 1,
            }],
        }
    }

    fn speed(value: &str) -> StateValue {
        StateValue {
            function_class: "fan-speed".into(),
            function_instance: Some("fan-speed".into()),
            value: json!(value),
            last_update_time: 2,
        }
    }

    #[test]
    fn get_state_misses_are_not_found() {
        let catalog = offline_catalog();
        catalog.replace_snapshot(CatalogSnapshot::new(vec![fan()], Vec::new()));

        assert_eq!(
            catalog.get_state("fan-1", "fan-speed", Some("fan-speed")).unwrap(),
            json!("fan-speed-050")
        );
        let err = catalog.get_state("fan-1", "fan-speed", None).unwrap_err();
        assert!(matches!(err, CoreError::NotFound { entity_type: "State", .. }));
        let err = catalog.get("nope").unwrap_err();
        assert!(matches!(err, CoreError::NotFound { entity_type: "Device", .. }));
    }

    #[test]
    fn patch_then_restore() {
        let catalog = offline_catalog();
        catalog.replace_snapshot(CatalogSnapshot::new(vec![fan()], Vec::new()));
        let before = catalog.snapshot();

        let previous = catalog.patch_state("fan-1", &speed("fan-speed-100")).unwrap();
        assert_eq!(previous.as_ref().unwrap().value, "fan-speed-050");
        assert_eq!(
            catalog.get_state("fan-1", "fan-speed", Some("fan-speed")).unwrap(),
            "fan-speed-100"
        );
        // Readers holding the old snapshot are unaffected.
        assert_eq!(before.device("fan-1").unwrap().states[0].value, "fan-speed-050");

        let key = StateKey::new("fan-speed", Some("fan-speed"));
        assert!(catalog.restore_state("fan-1", &key, &json!("fan-speed-100"), previous));
        assert_eq!(
            catalog.get_state("fan-1", "fan-speed", Some("fan-speed")).unwrap(),
            "fan-speed-050"
        );
    }

    #[test]
    fn restore_skips_when_value_moved_on() {
        let catalog = offline_catalog();
        catalog.replace_snapshot(CatalogSnapshot::new(vec![fan()], Vec::new()));

        let previous = catalog.patch_state("fan-1", &speed("fan-speed-100")).unwrap();
        catalog.patch_state("fan-1", &speed("fan-speed-025")).unwrap();

        let key = StateKey::new("fan-speed", Some("fan-speed"));
        assert!(!catalog.restore_state("fan-1", &key, &json!("fan-speed-100"), previous));
        assert_eq!(
            catalog.get_state("fan-1", "fan-speed", Some("fan-speed")).unwrap(),
            "fan-speed-025"
        );
    }

    #[test]
    fn restore_removes_key_that_did_not_exist() {
        let catalog = offline_catalog();
        catalog.replace_snapshot(CatalogSnapshot::new(vec![fan()], Vec::new()));

        let power = StateValue {
            function_class: "power".into(),
            function_instance: None,
            value: json!("on"),
            last_update_time: 3,
        };
        let previous = catalog.patch_state("fan-1", &power).unwrap();
        assert!(previous.is_none());

        let key = StateKey::new("power", None);
        assert!(catalog.restore_state("fan-1", &key, &json!("on"), previous));
        assert!(catalog.get_state("fan-1", "power", None).is_err());
    }

    #[test]
    fn patch_unknown_device_fails() {
        let catalog = offline_catalog();
        assert!(catalog.patch_state("ghost", &speed("fan-speed-100")).is_err());
    }
}
