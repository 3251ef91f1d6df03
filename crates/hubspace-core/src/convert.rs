// ── API-to-domain type conversions ──
//
// Bridges raw `hubspace_api` records into canonical `hubspace_core::model`
// types. The metadevice list is flat and mixes devices, rooms and homes;
// `partition_records` splits it by `typeId` and drops everything else.

use hubspace_api::models::{FunctionRecord, MetaDeviceRecord, StateRecord, TYPE_DEVICE, TYPE_ROOM};
use tracing::trace;

use crate::model::{FunctionDescriptor, MetaDevice, Room, StateValue};

impl From<StateRecord> for StateValue {
    fn from(r: StateRecord) -> Self {
        Self {
            function_class: r.function_class,
            function_instance: r.function_instance,
            value: r.value,
            last_update_time: r.last_update_time,
        }
    }
}

impl From<StateValue> for StateRecord {
    fn from(v: StateValue) -> Self {
        Self {
            function_class: v.function_class,
            function_instance: v.function_instance,
            value: v.value,
            last_update_time: v.last_update_time,
        }
    }
}

impl From<FunctionRecord> for FunctionDescriptor {
    fn from(r: FunctionRecord) -> Self {
        Self {
            function_class: r.function_class,
            function_instance: r.function_instance,
            metadata: r.extra,
        }
    }
}

impl From<MetaDeviceRecord> for MetaDevice {
    fn from(r: MetaDeviceRecord) -> Self {
        let states = r
            .state
            .map(|envelope| envelope.values.into_iter().map(StateValue::from).collect())
            .unwrap_or_default();

        Self {
            id: r.id,
            device_id: r.device_id.filter(|d| !d.is_empty()),
            model: r.description.device.model,
            device_class: r.description.device.device_class,
            default_name: r.description.default_name,
            default_image: r.description.default_image,
            friendly_name: r.friendly_name,
            functions: r
                .description
                .functions
                .into_iter()
                .map(FunctionDescriptor::from)
                .collect(),
            children: r.children,
            states,
        }
    }
}

impl From<MetaDeviceRecord> for Room {
    fn from(r: MetaDeviceRecord) -> Self {
        Self {
            id: r.id,
            friendly_name: r.friendly_name,
            children: r.children,
        }
    }
}

/// Split a raw metadevice list into devices and rooms.
pub(crate) fn partition_records(records: Vec<MetaDeviceRecord>) -> (Vec<MetaDevice>, Vec<Room>) {
    let mut devices = Vec::new();
    let mut rooms = Vec::new();

    for record in records {
        match record.type_id.as_str() {
            TYPE_DEVICE => devices.push(MetaDevice::from(record)),
            TYPE_ROOM => rooms.push(Room::from(record)),
            other => trace!(id = %record.id, type_id = other, "skipping metadevice entry"),
        }
    }

    (devices, rooms)
}
