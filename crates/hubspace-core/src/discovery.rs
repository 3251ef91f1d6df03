// ── Device discovery ──
//
// Chooses which leaf devices an installation exposes, from optional
// friendly-name and room-name allow-lists. Aggregates are structural and
// never selected; a room that lists an aggregate contributes its leaves.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use crate::model::MetaDevice;
use crate::store::CatalogSnapshot;

/// Allow-lists for device selection. Both empty means "everything".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryFilter {
    friendly_names: BTreeSet<String>,
    room_names: BTreeSet<String>,
}

impl DiscoveryFilter {
    pub fn new<F, R>(friendly_names: F, room_names: R) -> Self
    where
        F: IntoIterator,
        F::Item: Into<String>,
        R: IntoIterator,
        R::Item: Into<String>,
    {
        Self {
            friendly_names: friendly_names.into_iter().map(Into::into).collect(),
            room_names: room_names.into_iter().map(Into::into).collect(),
        }
    }

    /// No allow-lists: select every leaf device.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn is_unrestricted(&self) -> bool {
        self.friendly_names.is_empty() && self.room_names.is_empty()
    }

    /// Select leaf devices, ordered by friendly name (then id).
    pub fn select(&self, snapshot: &CatalogSnapshot) -> Vec<Arc<MetaDevice>> {
        let mut selected: Vec<Arc<MetaDevice>> = if self.is_unrestricted() {
            snapshot
                .devices()
                .filter(|d| !d.is_aggregate())
                .cloned()
                .collect()
        } else {
            let mut ids: BTreeSet<&str> = BTreeSet::new();

            if !self.friendly_names.is_empty() {
                ids.extend(
                    snapshot
                        .devices()
                        .filter(|d| {
                            !d.is_aggregate() && self.friendly_names.contains(&d.friendly_name)
                        })
                        .map(|d| d.id.as_str()),
                );
            }

            if !self.room_names.is_empty() {
                for room in snapshot
                    .rooms()
                    .iter()
                    .filter(|r| self.room_names.contains(&r.friendly_name))
                {
                    let mut visited = HashSet::new();
                    for child in &room.children {
                        collect_leaves(snapshot, child, &mut visited, &mut ids);
                    }
                }
            }

            ids.into_iter()
                .filter_map(|id| snapshot.device(id).cloned())
                .collect()
        };

        selected.sort_by(|a, b| {
            a.friendly_name
                .cmp(&b.friendly_name)
                .then_with(|| a.id.cmp(&b.id))
        });
        selected
    }
}

/// Select from a snapshot with plain name lists.
pub fn select(
    snapshot: &CatalogSnapshot,
    friendly_names: &[String],
    room_names: &[String],
) -> Vec<Arc<MetaDevice>> {
    DiscoveryFilter::new(friendly_names.iter().cloned(), room_names.iter().cloned())
        .select(snapshot)
}

/// Walk down from `id` to leaf devices. Unknown ids are skipped; `visited`
/// guards against child cycles.
fn collect_leaves<'a>(
    snapshot: &'a CatalogSnapshot,
    id: &'a str,
    visited: &mut HashSet<&'a str>,
    out: &mut BTreeSet<&'a str>,
) {
    if !visited.insert(id) {
        return;
    }
    let Some(device) = snapshot.device(id) else {
        return;
    };
    if device.is_aggregate() {
        for child in &device.children {
            collect_leaves(snapshot, child, visited, out);
        }
    } else {
        out.insert(device.id.as_str());
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::Room;

    fn device(id: &str, name: &str, children: &[&str]) -> MetaDevice {
        MetaDevice {
            id: id.into(),
            device_id: None,
            model: String::new(),
            device_class: String::new(),
            default_name: String::new(),
            default_image: String::new(),
            friendly_name: name.into(),
            functions: Vec::new(),
            children: children.iter().map(|c| (*c).to_owned()).collect(),
            states: Vec::new(),
        }
    }

    fn room(id: &str, name: &str, children: &[&str]) -> Room {
        Room {
            id: id.into(),
            friendly_name: name.into(),
            children: children.iter().map(|c| (*c).to_owned()).collect(),
        }
    }

    /// Living room holds a fan unit (aggregate of fan + light) and a lamp.
    fn snapshot() -> CatalogSnapshot {
        CatalogSnapshot::new(
            vec![
                device("unit", "Ceiling Fan", &["unit-fan", "unit-light"]),
                device("unit-fan", "Ceiling Fan", &[]),
                device("unit-light", "Ceiling Fan", &[]),
                device("lamp", "Lamp", &[]),
                device("porch", "Porch", &[]),
                device("a", "B", &[]),
                device("b", "A", &[]),
            ],
            vec![
                room("r1", "Living Room", &["unit", "lamp", "missing"]),
                room("r2", "Outside", &["porch"]),
            ],
        )
    }

    fn ids(devices: &[Arc<MetaDevice>]) -> Vec<&str> {
        devices.iter().map(|d| d.id.as_str()).collect()
    }

    #[test]
    fn empty_filters_select_every_leaf() {
        let snap = snapshot();
        let selected = DiscoveryFilter::all().select(&snap);
        assert_eq!(
            ids(&selected),
            vec!["b", "a", "unit-fan", "unit-light", "lamp", "porch"]
        );
        assert!(selected.iter().all(|d| !d.is_aggregate()));
    }

    #[test]
    fn friendly_names_are_exact_and_deduplicated() {
        let snap = snapshot();
        let names = vec!["A".to_owned(), "B".to_owned(), "A".to_owned(), "lamp".to_owned()];
        let selected = select(&snap, &names, &[]);
        assert_eq!(ids(&selected), vec!["b", "a"]);
    }

    #[test]
    fn friendly_name_never_selects_aggregate() {
        let snap = snapshot();
        let selected = DiscoveryFilter::new(["Ceiling Fan"], Vec::<String>::new()).select(&snap);
        assert_eq!(ids(&selected), vec!["unit-fan", "unit-light"]);
    }

    #[test]
    fn rooms_expand_aggregates_to_leaves() {
        let snap = snapshot();
        let selected = DiscoveryFilter::new(Vec::<String>::new(), ["Living Room"]).select(&snap);
        assert_eq!(ids(&selected), vec!["unit-fan", "unit-light", "lamp"]);
    }

    #[test]
    fn names_and_rooms_union() {
        let snap = snapshot();
        let selected =
            DiscoveryFilter::new(["Lamp", "A"], ["Outside", "Living Room"]).select(&snap);
        assert_eq!(
            ids(&selected),
            vec!["b", "unit-fan", "unit-light", "lamp", "porch"]
        );
    }

    #[test]
    fn unknown_room_selects_nothing() {
        let snap = snapshot();
        let selected = DiscoveryFilter::new(Vec::<String>::new(), ["Attic"]).select(&snap);
        assert!(selected.is_empty());
    }
}
