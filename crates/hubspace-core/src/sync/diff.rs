// ── Snapshot diffing ──
//
// Compares the state of the selected devices between two polls. Only the
// value counts: a state whose timestamp moved but whose value did not is
// unchanged.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use serde_json::Value;

use crate::model::{MetaDevice, StateKey};

/// Per-device state values, keyed by address.
pub(crate) type StateMap = BTreeMap<StateKey, Value>;

/// What the coordinator remembers about the previous poll.
pub(crate) type Baseline = HashMap<String, StateMap>;

pub(crate) fn state_map(device: &MetaDevice) -> StateMap {
    device
        .states
        .iter()
        .map(|s| (s.key(), s.value.clone()))
        .collect()
}

pub(crate) fn baseline_of(devices: &[Arc<MetaDevice>]) -> Baseline {
    devices
        .iter()
        .map(|d| (d.id.clone(), state_map(d)))
        .collect()
}

/// Result of comparing one poll against the previous.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollReport {
    /// Devices present in both polls with at least one changed state.
    pub changed: Vec<String>,
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl PollReport {
    pub fn is_quiet(&self) -> bool {
        self.changed.is_empty() && self.added.is_empty() && self.removed.is_empty()
    }
}

/// Diff `current` against `previous`. Output ids are sorted.
pub(crate) fn diff(previous: &Baseline, current: &Baseline) -> PollReport {
    let mut report = PollReport::default();

    let prev_ids: BTreeSet<&String> = previous.keys().collect();
    let curr_ids: BTreeSet<&String> = current.keys().collect();

    for id in &curr_ids {
        match previous.get(*id) {
            None => report.added.push((*id).clone()),
            Some(old) if old != &current[*id] => report.changed.push((*id).clone()),
            Some(_) => {}
        }
    }
    report.removed = prev_ids.difference(&curr_ids).map(|id| (*id).clone()).collect();
    report
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn map(entries: &[(&str, Option<&str>, Value)]) -> StateMap {
        entries
            .iter()
            .map(|(fc, fi, v)| (StateKey::new(*fc, *fi), v.clone()))
            .collect()
    }

    #[test]
    fn single_value_change_reports_one_device() {
        let previous: Baseline = [
            ("a".to_owned(), map(&[("power", None, json!("on")), ("brightness", None, json!(50))])),
            ("b".to_owned(), map(&[("power", None, json!("off"))])),
        ]
        .into();
        let mut current = previous.clone();
        current
            .get_mut("a")
            .unwrap()
            .insert(StateKey::new("brightness", None), json!(75));

        let report = diff(&previous, &current);
        assert_eq!(report.changed, vec!["a".to_owned()]);
        assert!(report.added.is_empty());
        assert!(report.removed.is_empty());
    }

    #[test]
    fn instance_is_part_of_the_key() {
        let previous: Baseline =
            [("a".to_owned(), map(&[("toggle", Some("zone-1"), json!("on"))]))].into();
        let current: Baseline = [(
            "a".to_owned(),
            map(&[
                ("toggle", Some("zone-1"), json!("on")),
                ("toggle", Some("zone-2"), json!("on")),
            ]),
        )]
        .into();

        assert_eq!(diff(&previous, &current).changed, vec!["a".to_owned()]);
    }

    #[test]
    fn membership_changes() {
        let previous: Baseline = [
            ("a".to_owned(), StateMap::new()),
            ("b".to_owned(), StateMap::new()),
        ]
        .into();
        let current: Baseline = [
            ("b".to_owned(), StateMap::new()),
            ("c".to_owned(), StateMap::new()),
        ]
        .into();

        let report = diff(&previous, &current);
        assert_eq!(report.added, vec!["c".to_owned()]);
        assert_eq!(report.removed, vec!["a".to_owned()]);
        assert!(report.changed.is_empty());
    }

    #[test]
    fn identical_polls_are_quiet() {
        let previous: Baseline = [("a".to_owned(), map(&[("power", None, json!("on"))]))].into();
        assert!(diff(&previous, &previous.clone()).is_quiet());
    }
}
