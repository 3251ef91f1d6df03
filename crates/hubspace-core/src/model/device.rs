// ── Metadevice domain type ──

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::capability::Capability;
use super::state::{StateKey, StateValue};

/// One controllable or readable capability a device declares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDescriptor {
    pub function_class: String,
    pub function_instance: Option<String>,
    /// Provider metadata (`type`, `values`, ranges...), untouched.
    pub metadata: serde_json::Map<String, Value>,
}

impl FunctionDescriptor {
    pub fn key(&self) -> StateKey {
        StateKey {
            function_class: self.function_class.clone(),
            function_instance: self.function_instance.clone(),
        }
    }
}

/// A catalog entry: either a leaf device or an aggregate grouping of
/// child metadevices (e.g. a ceiling fan unit holding a fan and a light).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaDevice {
    /// Opaque instance id; the address for state reads and writes.
    pub id: String,
    /// Grouping id shared by siblings of one physical unit.
    pub device_id: Option<String>,
    pub model: String,
    pub device_class: String,
    pub default_name: String,
    pub default_image: String,
    pub friendly_name: String,
    pub functions: Vec<FunctionDescriptor>,
    pub children: Vec<String>,
    pub states: Vec<StateValue>,
}

impl MetaDevice {
    /// Aggregates are structural and never surfaced as entities.
    pub fn is_aggregate(&self) -> bool {
        !self.children.is_empty()
    }

    /// Exact-key lookup over the state list.
    pub fn state(
        &self,
        function_class: &str,
        function_instance: Option<&str>,
    ) -> Option<&StateValue> {
        self.states
            .iter()
            .find(|s| s.matches(function_class, function_instance))
    }

    pub fn function(
        &self,
        function_class: &str,
        function_instance: Option<&str>,
    ) -> Option<&FunctionDescriptor> {
        self.functions.iter().find(|f| {
            f.function_class == function_class
                && f.function_instance.as_deref() == function_instance
        })
    }

    /// All instances declared for a function class, in declaration order.
    pub fn instances_of(&self, function_class: &str) -> Vec<Option<&str>> {
        self.functions
            .iter()
            .filter(|f| f.function_class == function_class)
            .map(|f| f.function_instance.as_deref())
            .collect()
    }

    pub fn capabilities(&self) -> BTreeSet<Capability> {
        self.functions
            .iter()
            .filter_map(|f| Capability::from_function_class(&f.function_class))
            .collect()
    }

    pub fn supports(&self, capability: Capability) -> bool {
        let class = capability.function_class();
        self.functions.iter().any(|f| f.function_class == class)
    }

    /// Insert or replace the state with the same key. Returns the value
    /// it replaced.
    pub(crate) fn upsert_state(&mut self, value: StateValue) -> Option<StateValue> {
        match self.states.iter_mut().find(|s| {
            s.function_class == value.function_class
                && s.function_instance == value.function_instance
        }) {
            Some(slot) => Some(std::mem::replace(slot, value)),
            None => {
                self.states.push(value);
                None
            }
        }
    }

    /// Drop the state with this key, if any.
    pub(crate) fn remove_state(&mut self, key: &StateKey) {
        self.states.retain(|s| {
            !(s.function_class == key.function_class
                && s.function_instance == key.function_instance)
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn function(class: &str, instance: Option<&str>) -> FunctionDescriptor {
        FunctionDescriptor {
            function_class: class.into(),
            function_instance: instance.map(str::to_owned),
            metadata: serde_json::Map::new(),
        }
    }

    fn state(class: &str, instance: Option<&str>, value: Value) -> StateValue {
        StateValue {
            function_class: class.into(),
            function_instance: instance.map(str::to_owned),
            value,
            last_update_time: 1,
        }
    }

    fn switch() -> MetaDevice {
        MetaDevice {
            id: "dev-1".into(),
            device_id: Some("grp-1".into()),
            model: "HPSA11CWB".into(),
            device_class: "switch".into(),
            default_name: "Switch".into(),
            default_image: "switch-icon".into(),
            friendly_name: "Patio".into(),
            functions: vec![
                function("power", None),
                function("toggle", Some("zone-1")),
                function("toggle", Some("zone-2")),
            ],
            children: Vec::new(),
            states: vec![
                state("power", None, json!("on")),
                state("toggle", Some("zone-1"), json!("off")),
                state("toggle", Some("zone-2"), json!("on")),
            ],
        }
    }

    #[test]
    fn state_lookup_disambiguates_instances() {
        let device = switch();
        assert_eq!(device.state("toggle", Some("zone-2")).unwrap().value, "on");
        assert_eq!(device.state("toggle", Some("zone-1")).unwrap().value, "off");
        assert!(device.state("toggle", None).is_none());
        assert_eq!(device.state("power", None).unwrap().value, "on");
    }

    #[test]
    fn capabilities_come_from_functions() {
        let device = switch();
        assert!(device.supports(Capability::Toggle));
        assert!(device.supports(Capability::Power));
        assert!(!device.supports(Capability::Brightness));
        assert_eq!(
            device.capabilities().into_iter().collect::<Vec<_>>(),
            vec![Capability::Power, Capability::Toggle]
        );
        assert_eq!(device.instances_of("toggle"), vec![Some("zone-1"), Some("zone-2")]);
    }

    #[test]
    fn upsert_replaces_only_the_exact_key() {
        let mut device = switch();
        let old = device.upsert_state(state("toggle", Some("zone-1"), json!("on")));
        assert_eq!(old.unwrap().value, "off");
        assert_eq!(device.state("toggle", Some("zone-2")).unwrap().value, "on");
        assert_eq!(device.states.len(), 3);

        assert!(device.upsert_state(state("brightness", None, json!(10))).is_none());
        assert_eq!(device.states.len(), 4);

        device.remove_state(&StateKey::new("brightness", None));
        assert_eq!(device.states.len(), 3);
    }

    #[test]
    fn aggregate_detection() {
        let mut device = switch();
        assert!(!device.is_aggregate());
        device.children.push("dev-2".into());
        assert!(device.is_aggregate());
    }
}
