//! Small helpers shared by the signal encoders.

use crate::attributes::{AttrMap, AttrValue};

/// Resource attribute promoted to the fixed `service_name` column for
/// traces and logs.
pub(crate) const SERVICE_NAME_KEY: &str = "service.name";

/// Lowercase-hex rendering of a trace/span identifier. Absent ids (empty or
/// all-zero bytes) render as the empty string, never null.
pub(crate) fn hex_id(bytes: &[u8]) -> String {
    if bytes.iter().all(|b| *b == 0) {
        return String::new();
    }
    let mut hex = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        hex.push_str(&format!("{byte:02x}"));
    }
    hex
}

/// OTLP nanosecond timestamps to the Unix milliseconds Arc expects.
pub(crate) fn unix_millis(nanos: u64) -> i64 {
    (nanos / 1_000_000) as i64
}

/// The resource's `service.name`, or empty string when unset or non-string.
pub(crate) fn service_name(resource_attrs: &AttrMap) -> String {
    match resource_attrs.get(SERVICE_NAME_KEY) {
        Some(AttrValue::String(name)) => name.clone(),
        _ => String::new(),
    }
}
