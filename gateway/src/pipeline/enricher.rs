//! Record enricher
//!
//! Stamps a raw record with its device identity, canonical vendor tag and
//! ingestion timestamp, and strips the fields the vendor declares unbounded.
//! Pure function: no I/O, never fails.

use crate::record::{
    DEVICE_ID, DEVICE_VENDOR, DeviceIdentity, ENQUEUED_TIME_UTC, EnrichedRecord, RawRecord,
    SourceMeta, pointer_token,
};
use crate::registry::VendorEntry;
use serde_json::{Map, Value};

/// Enrich a record classified as `vendor`
///
/// - push path (`DeviceIdentity::Connection`): `deviceId` is the connection
///   identity, verbatim
/// - pull path (`DeviceIdentity::Native`): `deviceId` is `<tag>_<asset id>`
///
/// Enriching an already-enriched record with the same metadata yields the
/// same record.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use telemetry_gateway::pipeline::enrich;
/// use telemetry_gateway::record::SourceMeta;
/// use telemetry_gateway::registry::VendorEntry;
///
/// let raw = json!({"deviceVendor": "exelonix", "temp": 21.5});
/// let record = enrich(
///     raw.as_object().unwrap().clone(),
///     &VendorEntry::new("exelonix"),
///     &SourceMeta::pushed("sensor-7", "2024-05-01T12:00:00.000Z"),
/// );
/// assert_eq!(record.device_id(), "sensor-7");
/// ```
pub fn enrich(mut record: RawRecord, vendor: &VendorEntry, meta: &SourceMeta) -> EnrichedRecord {
    for pointer in vendor.strip_pointers() {
        strip(&mut record, pointer);
    }

    let device_id = match &meta.identity {
        DeviceIdentity::Connection(id) => id.clone(),
        DeviceIdentity::Native(asset_id) => format!("{}_{}", vendor.tag(), asset_id),
    };

    record.insert(DEVICE_VENDOR.to_string(), Value::from(vendor.tag()));
    record.insert(DEVICE_ID.to_string(), Value::from(device_id));
    record.insert(
        ENQUEUED_TIME_UTC.to_string(),
        Value::from(meta.enqueued_time.as_str()),
    );

    EnrichedRecord::from_map(record)
}

/// Remove the field at `pointer`; absent fields and non-object parents are left alone
fn strip(record: &mut RawRecord, pointer: &str) {
    let Some(path) = pointer.strip_prefix('/') else {
        return;
    };
    match path.rsplit_once('/') {
        None => {
            record.remove(pointer_token(path).as_ref());
        }
        Some((parent, key)) => {
            if let Some(parent) = parent_object(record, parent) {
                parent.remove(pointer_token(key).as_ref());
            }
        }
    }
}

fn parent_object<'a>(record: &'a mut RawRecord, path: &str) -> Option<&'a mut Map<String, Value>> {
    let (head, tail) = match path.split_once('/') {
        Some((head, tail)) => (head, Some(tail)),
        None => (path, None),
    };
    let value = record.get_mut(pointer_token(head).as_ref())?;
    let value = match tail {
        Some(tail) => value.pointer_mut(&format!("/{tail}"))?,
        None => value,
    };
    value.as_object_mut()
}
