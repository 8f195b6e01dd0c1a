//! Dynamically typed property values.
//!
//! Host documents store arbitrary JSON-shaped data on their nodes: positions,
//! attribute flags, socket defaults. [`Value`] keeps the numeric scalar and
//! array cases as distinct variants so that the serialization round-trip
//! preserves them exactly.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// A dynamically typed property value.
///
/// Equality is structural: two values are equal iff their variants match and
/// the payloads compare equal.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    /// No value.
    #[default]
    None,
    /// A boolean flag.
    Bool(bool),
    /// A floating point scalar.
    Float(f64),
    /// A homogeneous array of floats.
    FloatArray(Vec<f64>),
    /// An integer scalar.
    Int(i64),
    /// A homogeneous array of integers.
    IntArray(Vec<i64>),
    /// A string.
    Str(String),
    /// A heterogeneous list of values.
    List(Vec<Value>),
    /// A string-keyed dictionary of values.
    Dict(BTreeMap<String, Value>),
}

impl Value {
    /// Whether this is [`Value::None`].
    #[must_use]
    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    /// The boolean payload, if this is a [`Value::Bool`].
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The float payload, if this is a [`Value::Float`].
    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }

    /// The integer payload, if this is a [`Value::Int`].
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// The string payload, if this is a [`Value::Str`].
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The float array payload, if this is a [`Value::FloatArray`].
    #[must_use]
    pub fn as_float_array(&self) -> Option<&[f64]> {
        match self {
            Value::FloatArray(xs) => Some(xs),
            _ => None,
        }
    }

    /// The integer array payload, if this is a [`Value::IntArray`].
    #[must_use]
    pub fn as_int_array(&self) -> Option<&[i64]> {
        match self {
            Value::IntArray(ns) => Some(ns),
            _ => None,
        }
    }

    /// The list payload, if this is a [`Value::List`].
    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(vs) => Some(vs),
            _ => None,
        }
    }

    /// The dictionary payload, if this is a [`Value::Dict`].
    #[must_use]
    pub fn as_dict(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Dict(d) => Some(d),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<f64>> for Value {
    fn from(xs: Vec<f64>) -> Self {
        Value::FloatArray(xs)
    }
}

impl From<Vec<i64>> for Value {
    fn from(ns: Vec<i64>) -> Self {
        Value::IntArray(ns)
    }
}

impl From<Vec<Value>> for Value {
    fn from(vs: Vec<Value>) -> Self {
        Value::List(vs)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(d: BTreeMap<String, Value>) -> Self {
        Value::Dict(d)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

/// Values serialize to their natural JSON shape: the variant tag is implied
/// by the JSON type, with `None` mapping to `null`.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::None => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Float(x) => serializer.serialize_f64(*x),
            Value::FloatArray(xs) => xs.serialize(serializer),
            Value::Int(n) => serializer.serialize_i64(*n),
            Value::IntArray(ns) => ns.serialize(serializer),
            Value::Str(s) => serializer.serialize_str(s),
            Value::List(vs) => vs.serialize(serializer),
            Value::Dict(d) => d.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON-shaped property value")
    }

    fn visit_bool<E: de::Error>(self, b: bool) -> Result<Value, E> {
        Ok(Value::Bool(b))
    }

    fn visit_i64<E: de::Error>(self, n: i64) -> Result<Value, E> {
        Ok(Value::Int(n))
    }

    fn visit_u64<E: de::Error>(self, n: u64) -> Result<Value, E> {
        i64::try_from(n)
            .map(Value::Int)
            .map_err(|_| E::custom(format!("integer {n} out of range")))
    }

    fn visit_f64<E: de::Error>(self, x: f64) -> Result<Value, E> {
        Ok(Value::Float(x))
    }

    fn visit_str<E: de::Error>(self, s: &str) -> Result<Value, E> {
        Ok(Value::Str(s.to_owned()))
    }

    fn visit_string<E: de::Error>(self, s: String) -> Result<Value, E> {
        Ok(Value::Str(s))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::None)
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::None)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element::<Value>()? {
            items.push(item);
        }
        Ok(classify_array(items))
    }

    fn visit_map<A: de::MapAccess<'de>>(self, mut map: A) -> Result<Value, A::Error> {
        let mut dict = BTreeMap::new();
        while let Some((key, value)) = map.next_entry::<String, Value>()? {
            dict.insert(key, value);
        }
        Ok(Value::Dict(dict))
    }
}

/// Collapses an array of values into the dedicated numeric-array variants.
///
/// An array is numeric iff every element is a numeric scalar; a single float
/// promotes the whole array to floats. Anything else stays a list.
fn classify_array(items: Vec<Value>) -> Value {
    if items.is_empty() || !items.iter().all(|v| matches!(v, Value::Int(_) | Value::Float(_))) {
        return Value::List(items);
    }
    if items.iter().all(|v| matches!(v, Value::Int(_))) {
        let ns = items
            .into_iter()
            .filter_map(|v| v.as_int())
            .collect::<Vec<_>>();
        return Value::IntArray(ns);
    }
    let xs = items
        .into_iter()
        .map(|v| match v {
            Value::Int(n) => n as f64,
            Value::Float(x) => x,
            _ => unreachable!("non-numeric element in numeric array"),
        })
        .collect::<Vec<_>>();
    Value::FloatArray(xs)
}

#[cfg(test)]
mod test {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    fn roundtrip(value: &Value) -> Value {
        let json = serde_json::to_string(value).unwrap();
        serde_json::from_str(&json).unwrap()
    }

    #[test]
    fn equality_is_structural() {
        assert_eq!(Value::from(1i64), Value::Int(1));
        assert_ne!(Value::Int(1), Value::Float(1.0));
        assert_ne!(Value::IntArray(vec![1]), Value::Int(1));
        assert_eq!(Value::None, Value::default());
        assert_ne!(Value::Str("a".into()), Value::Str("b".into()));
    }

    #[rstest]
    #[case::none(Value::None)]
    #[case::boolean(Value::Bool(true))]
    #[case::float(Value::Float(2.5))]
    #[case::float_array(Value::FloatArray(vec![1.5, 2.0]))]
    #[case::int(Value::Int(-3))]
    #[case::int_array(Value::IntArray(vec![1, 2, 3]))]
    #[case::string(Value::Str("hello".into()))]
    #[case::list(Value::List(vec![Value::Int(1), Value::Str("x".into())]))]
    fn serde_roundtrip(#[case] value: Value) {
        assert_eq!(roundtrip(&value), value);
    }

    #[test]
    fn dict_roundtrip() {
        let dict = Value::Dict(BTreeMap::from([
            ("a".to_owned(), Value::Int(1)),
            ("b".to_owned(), Value::FloatArray(vec![0.5])),
        ]));
        assert_eq!(roundtrip(&dict), dict);
    }

    #[test]
    fn array_classification() {
        let ints: Value = serde_json::from_value(json!([1, 2, 3])).unwrap();
        assert_eq!(ints, Value::IntArray(vec![1, 2, 3]));

        // A single float promotes the whole array.
        let floats: Value = serde_json::from_value(json!([1, 2.5])).unwrap();
        assert_eq!(floats, Value::FloatArray(vec![1.0, 2.5]));

        let mixed: Value = serde_json::from_value(json!([1, "a"])).unwrap();
        assert_eq!(mixed, Value::List(vec![Value::Int(1), Value::Str("a".into())]));

        let empty: Value = serde_json::from_value(json!([])).unwrap();
        assert_eq!(empty, Value::List(vec![]));
    }

    #[test]
    fn null_is_none() {
        let none: Value = serde_json::from_value(json!(null)).unwrap();
        assert!(none.is_none());
        assert_eq!(serde_json::to_value(Value::None).unwrap(), json!(null));
    }

    #[test]
    fn accessors_check_the_variant() {
        let value = Value::Int(7);
        assert_eq!(value.as_int(), Some(7));
        assert_eq!(value.as_float(), None);
        assert_eq!(value.as_str(), None);
        assert_eq!(Value::Str("s".into()).as_str(), Some("s"));
    }

    #[test]
    fn nested_structures_roundtrip() {
        let value: Value = serde_json::from_value(json!({
            "position": [10.0, 20.0],
            "flags": {"muted": false},
            "tags": ["a", "b"],
        }))
        .unwrap();
        let dict = value.as_dict().unwrap();
        assert_eq!(dict["position"], Value::FloatArray(vec![10.0, 20.0]));
        assert_eq!(
            dict["flags"],
            Value::Dict(BTreeMap::from([("muted".to_owned(), Value::Bool(false))]))
        );
        assert_eq!(roundtrip(&value), value);
    }
}
