// ── Immutable catalog snapshot ──
//
// One consistent view of the account: every device by id, the rooms, and
// a function index. A snapshot is never mutated after construction; the
// catalog replaces it wholesale on refresh and swaps in patched copies
// for optimistic writes.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::model::{MetaDevice, Room, StateKey};

#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    devices: HashMap<String, Arc<MetaDevice>>,
    rooms: Vec<Room>,
    /// (functionClass, functionInstance) -> ids of devices declaring or
    /// reporting it. Ids are sorted.
    function_index: HashMap<StateKey, Vec<String>>,
    fetched_at: Option<DateTime<Utc>>,
}

impl CatalogSnapshot {
    /// Build a snapshot from freshly converted devices and rooms.
    pub fn new(devices: Vec<MetaDevice>, rooms: Vec<Room>) -> Self {
        let devices: HashMap<String, Arc<MetaDevice>> = devices
            .into_iter()
            .map(|d| (d.id.clone(), Arc::new(d)))
            .collect();
        let function_index = build_function_index(&devices);

        Self {
            devices,
            rooms,
            function_index,
            fetched_at: Some(Utc::now()),
        }
    }

    pub fn device(&self, id: &str) -> Option<&Arc<MetaDevice>> {
        self.devices.get(id)
    }

    /// All devices, aggregates included, in no particular order.
    pub fn devices(&self) -> impl Iterator<Item = &Arc<MetaDevice>> {
        self.devices.values()
    }

    pub fn rooms(&self) -> &[Room] {
        &self.rooms
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// When the data was fetched. `None` for the empty initial snapshot.
    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.fetched_at
    }

    /// Devices that declare or report the exact (class, instance) key.
    pub fn devices_with_function(
        &self,
        function_class: &str,
        function_instance: Option<&str>,
    ) -> Vec<Arc<MetaDevice>> {
        let key = StateKey::new(function_class, function_instance);
        self.function_index
            .get(&key)
            .map(|ids| ids.iter().filter_map(|id| self.devices.get(id).cloned()).collect())
            .unwrap_or_default()
    }

    /// A copy of this snapshot with one device replaced. Functions are not
    /// expected to change, so the index is carried over; new state keys are
    /// added to it.
    pub(crate) fn with_device(&self, device: MetaDevice) -> Self {
        let mut next = self.clone();
        for state in &device.states {
            let ids = next.function_index.entry(state.key()).or_default();
            if let Err(pos) = ids.binary_search(&device.id) {
                ids.insert(pos, device.id.clone());
            }
        }
        next.devices.insert(device.id.clone(), Arc::new(device));
        next
    }
}

fn build_function_index(
    devices: &HashMap<String, Arc<MetaDevice>>,
) -> HashMap<StateKey, Vec<String>> {
    let mut index: HashMap<StateKey, Vec<String>> = HashMap::new();

    for device in devices.values() {
        let keys = device
            .functions
            .iter()
            .map(crate::model::FunctionDescriptor::key)
            .chain(device.states.iter().map(crate::model::StateValue::key));
        for key in keys {
            index.entry(key).or_default().push(device.id.clone());
        }
    }

    for ids in index.values_mut() {
        ids.sort();
        ids.dedup();
    }
    index
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::model::{FunctionDescriptor, StateValue};

    fn device(id: &str, functions: &[(&str, Option<&str>)]) -> MetaDevice {
        MetaDevice {
            id: id.into(),
            device_id: None,
            model: String::new(),
            device_class: "light".into(),
            default_name: String::new(),
            default_image: String::new(),
            friendly_name: id.to_uppercase(),
            functions: functions
                .iter()
                .map(|(fc, fi)| FunctionDescriptor {
                    function_class: (*fc).into(),
                    function_instance: fi.map(str::to_owned),
                    metadata: serde_json::Map::new(),
                })
                .collect(),
            children: Vec::new(),
            states: Vec::new(),
        }
    }

    #[test]
    fn function_index_uses_exact_keys() {
        let snap = CatalogSnapshot::new(
            vec![
                device("b", &[("power", None), ("toggle", Some("zone-1"))]),
                device("a", &[("power", None)]),
                device("c", &[("toggle", Some("zone-2"))]),
            ],
            Vec::new(),
        );

        let ids = |fc, fi| {
            snap.devices_with_function(fc, fi)
                .iter()
                .map(|d| d.id.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(ids("power", None), vec!["a", "b"]);
        assert_eq!(ids("toggle", Some("zone-1")), vec!["b"]);
        assert!(ids("toggle", None).is_empty());
        assert!(snap.fetched_at().is_some());
    }

    #[test]
    fn with_device_leaves_original_untouched() {
        let snap = CatalogSnapshot::new(vec![device("a", &[("power", None)])], Vec::new());
        let mut patched = (**snap.device("a").unwrap()).clone();
        patched.states.push(StateValue {
            function_class: "brightness".into(),
            function_instance: None,
            value: json!(40),
            last_update_time: 0,
        });

        let next = snap.with_device(patched);
        assert!(snap.device("a").unwrap().states.is_empty());
        assert_eq!(next.device("a").unwrap().states.len(), 1);
        assert_eq!(next.devices_with_function("brightness", None).len(), 1);
    }
}
