//! OTLP attribute flattening and precedence merging.
//!
//! OTLP attributes are lists of `KeyValue` whose values are a recursive
//! `AnyValue` union. The Arc payload is dynamically typed msgpack, so the
//! conversion target is [`AttrValue`], a closed union that serializes as the
//! bare dynamic value (no enum tagging). Conversion is total: anything the
//! union cannot represent degrades to [`AttrValue::Null`] instead of failing
//! the batch.

use std::collections::BTreeMap;

use opentelemetry_proto::tonic::common::v1::{any_value, AnyValue, KeyValue};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

/// A flat attribute set, keyed by attribute name.
pub type AttrMap = BTreeMap<String, AttrValue>;

/// Dynamically-typed attribute value.
///
/// Mirrors the OTLP `AnyValue` kinds one-to-one. Nesting is preserved as
/// nested values; keys are never collapsed into dotted paths.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    String(String),
    Int(i64),
    Double(f64),
    Bool(bool),
    Bytes(Vec<u8>),
    Array(Vec<AttrValue>),
    Map(AttrMap),
    Null,
}

impl Serialize for AttrValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            AttrValue::String(v) => serializer.serialize_str(v),
            AttrValue::Int(v) => serializer.serialize_i64(*v),
            AttrValue::Double(v) => serializer.serialize_f64(*v),
            AttrValue::Bool(v) => serializer.serialize_bool(*v),
            AttrValue::Bytes(v) => serializer.serialize_bytes(v),
            AttrValue::Array(values) => {
                let mut seq = serializer.serialize_seq(Some(values.len()))?;
                for value in values {
                    seq.serialize_element(value)?;
                }
                seq.end()
            }
            AttrValue::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
            AttrValue::Null => serializer.serialize_unit(),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::String(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::String(v)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Int(v)
    }
}

impl From<i32> for AttrValue {
    fn from(v: i32) -> Self {
        AttrValue::Int(i64::from(v))
    }
}

impl From<u32> for AttrValue {
    fn from(v: u32) -> Self {
        AttrValue::Int(i64::from(v))
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Double(v)
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        AttrValue::Bool(v)
    }
}

/// Converts one `AnyValue` to an [`AttrValue`]. Total: an absent or unknown
/// kind becomes `Null` so malformed upstream data degrades instead of
/// aborting an export.
pub fn any_value_to_attr(value: &AnyValue) -> AttrValue {
    match &value.value {
        Some(any_value::Value::StringValue(s)) => AttrValue::String(s.clone()),
        Some(any_value::Value::IntValue(i)) => AttrValue::Int(*i),
        Some(any_value::Value::DoubleValue(d)) => AttrValue::Double(*d),
        Some(any_value::Value::BoolValue(b)) => AttrValue::Bool(*b),
        Some(any_value::Value::BytesValue(b)) => AttrValue::Bytes(b.clone()),
        Some(any_value::Value::ArrayValue(array)) => {
            AttrValue::Array(array.values.iter().map(any_value_to_attr).collect())
        }
        Some(any_value::Value::KvlistValue(kvlist)) => {
            AttrValue::Map(attributes_to_map(&kvlist.values))
        }
        None => AttrValue::Null,
    }
}

/// Flattens an OTLP attribute list into an [`AttrMap`].
///
/// A `KeyValue` with no value still contributes its key, as `Null`.
pub fn attributes_to_map(attrs: &[KeyValue]) -> AttrMap {
    attrs
        .iter()
        .map(|kv| {
            let value = kv
                .value
                .as_ref()
                .map_or(AttrValue::Null, any_value_to_attr);
            (kv.key.clone(), value)
        })
        .collect()
}

/// Merges two attribute sets; on key collision the `overrides` value wins.
///
/// This is the precedence rule for every signal: record-level context
/// overrides resource-level context of the same name.
pub fn merge(base: &AttrMap, overrides: &AttrMap) -> AttrMap {
    let mut merged = base.clone();
    for (key, value) in overrides {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

/// Returns `base` plus one extra entry, leaving `base` untouched. Used for
/// the per-row discriminator labels during metric explosion.
pub fn with_label(base: &AttrMap, key: &str, value: AttrValue) -> AttrMap {
    let mut labeled = base.clone();
    labeled.insert(key.to_string(), value);
    labeled
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry_proto::tonic::common::v1::{ArrayValue, KeyValueList};
    use proptest::prelude::*;

    fn kv(key: &str, value: any_value::Value) -> KeyValue {
        KeyValue {
            key: key.to_string(),
            value: Some(AnyValue { value: Some(value) }),
        }
    }

    fn string_map(entries: &[(&str, &str)]) -> AttrMap {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), AttrValue::from(*v)))
            .collect()
    }

    #[test]
    fn test_scalar_conversion() {
        let attrs = vec![
            kv("s", any_value::Value::StringValue("hello".to_string())),
            kv("i", any_value::Value::IntValue(7)),
            kv("d", any_value::Value::DoubleValue(2.5)),
            kv("b", any_value::Value::BoolValue(true)),
            kv("raw", any_value::Value::BytesValue(vec![1, 2, 3])),
        ];
        let map = attributes_to_map(&attrs);
        assert_eq!(map["s"], AttrValue::String("hello".to_string()));
        assert_eq!(map["i"], AttrValue::Int(7));
        assert_eq!(map["d"], AttrValue::Double(2.5));
        assert_eq!(map["b"], AttrValue::Bool(true));
        assert_eq!(map["raw"], AttrValue::Bytes(vec![1, 2, 3]));
    }

    #[test]
    fn test_nested_values_stay_nested() {
        let attrs = vec![
            kv(
                "list",
                any_value::Value::ArrayValue(ArrayValue {
                    values: vec![
                        AnyValue {
                            value: Some(any_value::Value::IntValue(1)),
                        },
                        AnyValue {
                            value: Some(any_value::Value::StringValue("two".to_string())),
                        },
                    ],
                }),
            ),
            kv(
                "nested",
                any_value::Value::KvlistValue(KeyValueList {
                    values: vec![kv("inner", any_value::Value::BoolValue(false))],
                }),
            ),
        ];
        let map = attributes_to_map(&attrs);
        assert_eq!(
            map["list"],
            AttrValue::Array(vec![AttrValue::Int(1), AttrValue::from("two")])
        );
        let mut inner = AttrMap::new();
        inner.insert("inner".to_string(), AttrValue::Bool(false));
        assert_eq!(map["nested"], AttrValue::Map(inner));
    }

    #[test]
    fn test_missing_value_becomes_null() {
        let attrs = vec![
            KeyValue {
                key: "empty".to_string(),
                value: None,
            },
            KeyValue {
                key: "unset".to_string(),
                value: Some(AnyValue { value: None }),
            },
        ];
        let map = attributes_to_map(&attrs);
        assert_eq!(map["empty"], AttrValue::Null);
        assert_eq!(map["unset"], AttrValue::Null);
    }

    #[test]
    fn test_merge_override_wins() {
        let base = string_map(&[("service.name", "api"), ("host", "a")]);
        let overrides = string_map(&[("host", "b"), ("extra", "x")]);
        let merged = merge(&base, &overrides);
        assert_eq!(merged["service.name"], AttrValue::from("api"));
        assert_eq!(merged["host"], AttrValue::from("b"));
        assert_eq!(merged["extra"], AttrValue::from("x"));
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn test_merge_with_empty_is_identity() {
        let base = string_map(&[("a", "1"), ("b", "2")]);
        assert_eq!(merge(&base, &AttrMap::new()), base);
        assert_eq!(merge(&AttrMap::new(), &base), base);
    }

    #[test]
    fn test_with_label_does_not_mutate_base() {
        let base = string_map(&[("a", "1")]);
        let labeled = with_label(&base, "role", AttrValue::from("count"));
        assert_eq!(base.len(), 1);
        assert_eq!(labeled.len(), 2);
        assert_eq!(labeled["role"], AttrValue::from("count"));
    }

    proptest! {
        #[test]
        fn prop_merge_keeps_override_values(
            base in proptest::collection::btree_map("[a-z]{1,8}", "[a-z]{0,8}", 0..8),
            overrides in proptest::collection::btree_map("[a-z]{1,8}", "[a-z]{0,8}", 0..8),
        ) {
            let base: AttrMap = base
                .into_iter()
                .map(|(k, v)| (k, AttrValue::String(v)))
                .collect();
            let overrides: AttrMap = overrides
                .into_iter()
                .map(|(k, v)| (k, AttrValue::String(v)))
                .collect();
            let merged = merge(&base, &overrides);
            for (k, v) in &overrides {
                prop_assert_eq!(&merged[k], v);
            }
            for k in base.keys() {
                prop_assert!(merged.contains_key(k));
            }
            prop_assert!(merged.len() <= base.len() + overrides.len());
        }
    }
}
