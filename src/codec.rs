//! MessagePack codec shared by typed entities and the migration property bag.
//!
//! Entities are packed in map mode (`to_vec_named`) so that field names are
//! present on the wire; `unpack_generic` relies on this to rebuild a record
//! as an ordered `(name, value)` list without knowing its original type.

use chrono::{DateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};

use crate::core::{Result, StoreError, Value};

pub(crate) fn pack<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    rmp_serde::to_vec_named(value)
        .map_err(|e| StoreError::Encode(format!("Failed to serialize entity: {}", e)))
}

pub(crate) fn unpack<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    rmp_serde::from_slice(bytes)
        .map_err(|e| StoreError::Decode(format!("Failed to deserialize entity: {}", e)))
}

/// Decodes a packed record into its fields, preserving wire order.
///
/// The top-level value must be a map with string keys, which is what `pack`
/// produces for any struct entity.
pub(crate) fn unpack_generic(bytes: &[u8]) -> Result<Vec<(String, Value)>> {
    let decoded = rmpv::decode::read_value(&mut &bytes[..])
        .map_err(|e| StoreError::Decode(format!("Failed to deserialize record: {}", e)))?;

    let pairs = match decoded {
        rmpv::Value::Map(pairs) => pairs,
        other => {
            return Err(StoreError::Decode(format!(
                "Expected a map-encoded record, found {}",
                other
            )));
        }
    };

    let mut fields = Vec::with_capacity(pairs.len());
    for (key, value) in pairs {
        let name = match key {
            rmpv::Value::String(name) => name
                .into_str()
                .ok_or_else(|| StoreError::Decode("Record field name is not valid UTF-8".into()))?,
            other => {
                return Err(StoreError::Decode(format!(
                    "Record field names must be strings, found {}",
                    other
                )));
            }
        };
        fields.push((name, convert(value)));
    }
    Ok(fields)
}

fn convert(value: rmpv::Value) -> Value {
    match value {
        rmpv::Value::Nil => Value::Nil,
        rmpv::Value::Boolean(b) => Value::Bool(b),
        rmpv::Value::Integer(i) => match (i.as_i64(), i.as_u64()) {
            (Some(v), _) => Value::Int(v),
            (None, Some(v)) => Value::UInt(v),
            (None, None) => Value::Nil,
        },
        rmpv::Value::F32(f) => Value::Float(f64::from(f)),
        rmpv::Value::F64(f) => Value::Float(f),
        rmpv::Value::String(s) => s.into_str().map(Value::Str).unwrap_or(Value::Nil),
        rmpv::Value::Binary(b) => Value::Bytes(b),
        rmpv::Value::Ext(-1, data) => decode_timestamp(&data)
            .map(Value::Timestamp)
            .unwrap_or(Value::Nil),
        // Arrays, maps and unknown extensions carry nothing a migration step
        // can coerce; the field stays visible as nil.
        _ => Value::Nil,
    }
}

/// MessagePack timestamp extension (type -1), all three wire widths.
fn decode_timestamp(data: &[u8]) -> Option<DateTime<Utc>> {
    let (secs, nanos) = match data.len() {
        4 => (i64::from(u32::from_be_bytes(data.try_into().ok()?)), 0u32),
        8 => {
            let packed = u64::from_be_bytes(data.try_into().ok()?);
            let nanos = u32::try_from(packed >> 34).ok()?;
            let secs = i64::try_from(packed & 0x3_FFFF_FFFF).ok()?;
            (secs, nanos)
        }
        12 => {
            let nanos = u32::from_be_bytes(data[..4].try_into().ok()?);
            let secs = i64::from_be_bytes(data[4..].try_into().ok()?);
            (secs, nanos)
        }
        _ => return None,
    };
    DateTime::from_timestamp(secs, nanos)
}
