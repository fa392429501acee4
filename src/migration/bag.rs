use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::codec;
use crate::core::{Result, Value};

/// Read-only view over a record serialized under a now-superseded schema.
///
/// A bag presents the raw stored bytes as an order-preserving map from field
/// name to a coercible [`Value`], independent of the current type's shape —
/// fields that were renamed or removed on the current type are still
/// reachable here. Migration step bodies are the only intended consumer.
///
/// # Example
///
/// Reading a field the current type no longer has:
///
/// ```ignore
/// MigrationPlan::new().step(0, 1, |profile, bag| {
///     if let Some(name) = bag.try_get::<String>("legacy_name") {
///         profile.display_name = name;
///     }
/// })
/// ```
pub struct PropertyBag {
    entries: Vec<(String, Property)>,
}

impl PropertyBag {
    /// Decodes raw stored bytes with the same codec used for typed entities.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let fields = codec::unpack_generic(bytes)?;
        Ok(Self {
            entries: fields
                .into_iter()
                .map(|(name, value)| (name, Property::new(value)))
                .collect(),
        })
    }

    pub fn get(&self, name: &str) -> Option<&Property> {
        self.entries
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, property)| property)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Field names in wire order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Compatibility check for a named field; `None` when the field is
    /// missing or stored as nil.
    pub fn is_type_of<V: FromProperty>(&self, name: &str) -> Option<bool> {
        self.get(name)?.is_type_of::<V>()
    }

    /// Coerced value of a named field; `None` when the field is missing or
    /// the stored shape does not coerce. Never panics.
    pub fn try_get<V: FromProperty>(&self, name: &str) -> Option<V> {
        self.get(name)?.try_get()
    }
}

/// One stored field wrapped with the coercion rules.
pub struct Property {
    value: Value,
}

impl Property {
    pub(crate) fn new(value: Value) -> Self {
        Self { value }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Tri-state compatibility check: `None` for a nil stored value,
    /// otherwise whether the stored shape coerces to `V`.
    pub fn is_type_of<V: FromProperty>(&self) -> Option<bool> {
        if self.value.is_nil() {
            return None;
        }
        Some(V::is_type_of(&self.value))
    }

    /// Attempts the coercion; `None` on any mismatch, never panics.
    pub fn try_get<V: FromProperty>(&self) -> Option<V> {
        V::from_value(&self.value)
    }
}

/// Types retrievable from a stored field.
///
/// The table mirrors how records are written: requesting a type succeeds
/// only when the stored runtime shape matches it, with three deliberate
/// exceptions — `char` from a single-byte integer, [`Decimal`] from a
/// numeric string, and [`DateTime<Utc>`] from a 64-bit integer (milliseconds
/// since the Unix epoch) or a native MessagePack timestamp.
pub trait FromProperty: Sized {
    fn is_type_of(value: &Value) -> bool;
    fn from_value(value: &Value) -> Option<Self>;
}

impl FromProperty for bool {
    fn is_type_of(value: &Value) -> bool {
        matches!(value, Value::Bool(_))
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

macro_rules! impl_from_property_for_int {
    ($($t:ty),*) => {
        $(
            impl FromProperty for $t {
                fn is_type_of(value: &Value) -> bool {
                    match *value {
                        Value::Int(i) => <$t>::try_from(i).is_ok(),
                        Value::UInt(u) => <$t>::try_from(u).is_ok(),
                        _ => false,
                    }
                }

                fn from_value(value: &Value) -> Option<Self> {
                    match *value {
                        Value::Int(i) => <$t>::try_from(i).ok(),
                        Value::UInt(u) => <$t>::try_from(u).ok(),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_from_property_for_int!(i8, i16, i32, i64, u8, u16, u32, u64);

impl FromProperty for f32 {
    fn is_type_of(value: &Value) -> bool {
        matches!(value, Value::Float(_))
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_f64().map(|f| f as f32)
    }
}

impl FromProperty for f64 {
    fn is_type_of(value: &Value) -> bool {
        matches!(value, Value::Float(_))
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_f64()
    }
}

// Chars are single-byte integers on the wire.
impl FromProperty for char {
    fn is_type_of(value: &Value) -> bool {
        u8::is_type_of(value)
    }

    fn from_value(value: &Value) -> Option<Self> {
        u8::from_value(value).map(char::from)
    }
}

impl FromProperty for String {
    fn is_type_of(value: &Value) -> bool {
        matches!(value, Value::Str(_))
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_owned)
    }
}

impl FromProperty for Vec<u8> {
    fn is_type_of(value: &Value) -> bool {
        matches!(value, Value::Bytes(_))
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_bytes().map(<[u8]>::to_vec)
    }
}

// Decimals are numeric strings on the wire.
impl FromProperty for Decimal {
    fn is_type_of(value: &Value) -> bool {
        Self::from_value(value).is_some()
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_str().and_then(|s| s.parse().ok())
    }
}

// Instants are 64-bit epoch milliseconds on the wire, or a native
// MessagePack timestamp extension.
impl FromProperty for DateTime<Utc> {
    fn is_type_of(value: &Value) -> bool {
        match *value {
            Value::Int(_) => true,
            Value::UInt(u) => i64::try_from(u).is_ok(),
            Value::Timestamp(_) => true,
            _ => false,
        }
    }

    fn from_value(value: &Value) -> Option<Self> {
        match *value {
            Value::Int(millis) => DateTime::from_timestamp_millis(millis),
            Value::UInt(millis) => DateTime::from_timestamp_millis(i64::try_from(millis).ok()?),
            Value::Timestamp(instant) => Some(instant),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Legacy {
        flag: bool,
        count: i32,
        big: u64,
        signed: i64,
        ratio: f64,
        letter: u8,
        name: String,
        price: String,
        seen_at: i64,
        gone: Option<String>,
    }

    fn sample_bag() -> PropertyBag {
        let legacy = Legacy {
            flag: true,
            count: -42,
            big: u64::MAX,
            signed: 7,
            ratio: 2.5,
            letter: b'f',
            name: "SomeTestString".into(),
            price: "3.14".into(),
            seen_at: 1_700_000_000_000,
            gone: None,
        };
        PropertyBag::from_bytes(&crate::codec::pack(&legacy).unwrap()).unwrap()
    }

    fn bag_from_rmpv(fields: Vec<(&str, rmpv::Value)>) -> PropertyBag {
        let record = rmpv::Value::Map(
            fields
                .into_iter()
                .map(|(name, value)| (rmpv::Value::String(name.into()), value))
                .collect(),
        );
        let mut bytes = Vec::new();
        rmpv::encode::write_value(&mut bytes, &record).unwrap();
        PropertyBag::from_bytes(&bytes).unwrap()
    }

    #[test]
    fn exact_type_round_trips() {
        let bag = sample_bag();

        assert_eq!(bag.try_get::<bool>("flag"), Some(true));
        assert_eq!(bag.try_get::<i32>("count"), Some(-42));
        assert_eq!(bag.try_get::<u64>("big"), Some(u64::MAX));
        assert_eq!(bag.try_get::<i64>("signed"), Some(7));
        assert_eq!(bag.try_get::<f64>("ratio"), Some(2.5));
        assert_eq!(bag.try_get::<String>("name"), Some("SomeTestString".into()));
    }

    #[test]
    fn bytes_come_from_binary_fields() {
        let bag = bag_from_rmpv(vec![("blob", rmpv::Value::Binary(vec![1, 2, 3]))]);

        assert_eq!(bag.is_type_of::<Vec<u8>>("blob"), Some(true));
        assert_eq!(bag.try_get::<Vec<u8>>("blob"), Some(vec![1, 2, 3]));
        assert_eq!(bag.is_type_of::<String>("blob"), Some(false));
    }

    #[test]
    fn integer_family_respects_width() {
        let bag = sample_bag();

        assert_eq!(bag.is_type_of::<i8>("count"), Some(true));
        assert_eq!(bag.try_get::<i8>("count"), Some(-42));
        assert_eq!(bag.is_type_of::<u8>("count"), Some(false));
        assert_eq!(bag.try_get::<u8>("count"), None);
        assert_eq!(bag.is_type_of::<i64>("big"), Some(false));
        assert_eq!(bag.try_get::<i64>("big"), None);
        assert_eq!(bag.try_get::<u16>("signed"), Some(7));
    }

    #[test]
    fn char_comes_from_single_byte_integer() {
        let bag = sample_bag();

        assert_eq!(bag.is_type_of::<char>("letter"), Some(true));
        assert_eq!(bag.try_get::<char>("letter"), Some('f'));
        assert_eq!(bag.is_type_of::<char>("seen_at"), Some(false));
        assert_eq!(bag.try_get::<char>("name"), None);
    }

    #[test]
    fn decimal_comes_from_numeric_string() {
        let bag = sample_bag();

        assert_eq!(bag.is_type_of::<Decimal>("price"), Some(true));
        assert_eq!(
            bag.try_get::<Decimal>("price"),
            Some("3.14".parse().unwrap())
        );
        assert_eq!(bag.is_type_of::<Decimal>("name"), Some(false));
        assert_eq!(bag.try_get::<Decimal>("count"), None);
    }

    #[test]
    fn datetime_comes_from_epoch_millis() {
        let bag = sample_bag();

        assert_eq!(bag.is_type_of::<DateTime<Utc>>("seen_at"), Some(true));
        let instant = bag.try_get::<DateTime<Utc>>("seen_at").unwrap();
        assert_eq!(instant.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(bag.is_type_of::<DateTime<Utc>>("name"), Some(false));
    }

    #[test]
    fn datetime_comes_from_native_timestamp() {
        let packed = (500_000u64 << 34) | 1_700_000_000;
        let bag = bag_from_rmpv(vec![(
            "stamp",
            rmpv::Value::Ext(-1, packed.to_be_bytes().to_vec()),
        )]);

        assert_eq!(bag.is_type_of::<DateTime<Utc>>("stamp"), Some(true));
        let instant = bag.try_get::<DateTime<Utc>>("stamp").unwrap();
        assert_eq!(instant.timestamp(), 1_700_000_000);
        assert_eq!(instant.timestamp_subsec_nanos(), 500_000);
    }

    #[test]
    fn mismatch_is_none_not_panic() {
        let bag = sample_bag();

        assert_eq!(bag.try_get::<String>("count"), None);
        assert_eq!(bag.try_get::<bool>("name"), None);
        assert_eq!(bag.try_get::<f64>("count"), None);
        assert_eq!(bag.is_type_of::<String>("count"), Some(false));
    }

    #[test]
    fn nil_field_is_tristate_none() {
        let bag = sample_bag();

        assert!(bag.contains("gone"));
        assert_eq!(bag.is_type_of::<String>("gone"), None);
        assert_eq!(bag.try_get::<String>("gone"), None);
    }

    #[test]
    fn missing_field_is_none() {
        let bag = sample_bag();

        assert!(!bag.contains("never_there"));
        assert_eq!(bag.is_type_of::<bool>("never_there"), None);
        assert_eq!(bag.try_get::<bool>("never_there"), None);
    }

    #[test]
    fn names_preserve_wire_order() {
        let bag = sample_bag();
        let first: Vec<&str> = bag.names().take(3).collect();

        assert_eq!(first, vec!["flag", "count", "big"]);
        assert_eq!(bag.len(), 10);
    }
}
