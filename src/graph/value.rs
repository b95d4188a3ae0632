//! NB-002: Property values and the ordered property map.
//!
//! Node properties are a closed tagged union. Absent entries are never
//! stored: the `maybe` builder skips `None`, so serialized graphs contain no
//! null placeholders.

use std::fmt;

use indexmap::IndexMap;
use serde::{Serialize, Serializer};

use crate::graph::types::OutputRef;

// ===== Values =====

/// One property value. `Ref` and `Interpolated` carry deferred handles that
/// the external engine resolves after apply.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Str(String),
    Bool(bool),
    Int(i64),
    List(Vec<PropertyValue>),
    Map(IndexMap<String, PropertyValue>),
    Ref(OutputRef),
    Interpolated(Interpolation),
}

impl PropertyValue {
    /// List of plain strings, the common shape for id lists.
    pub fn string_list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        PropertyValue::List(items.into_iter().map(|s| PropertyValue::Str(s.into())).collect())
    }

    /// Map of plain strings, the common shape for tag sets.
    pub fn string_map(entries: &IndexMap<String, String>) -> Self {
        PropertyValue::Map(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), PropertyValue::Str(v.clone())))
                .collect(),
        )
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::Str(v.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        PropertyValue::Str(v)
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        PropertyValue::Bool(v)
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        PropertyValue::Int(v)
    }
}

impl From<u32> for PropertyValue {
    fn from(v: u32) -> Self {
        PropertyValue::Int(i64::from(v))
    }
}

impl From<OutputRef> for PropertyValue {
    fn from(v: OutputRef) -> Self {
        PropertyValue::Ref(v)
    }
}

impl From<Interpolation> for PropertyValue {
    fn from(v: Interpolation) -> Self {
        PropertyValue::Interpolated(v)
    }
}

impl From<Vec<PropertyValue>> for PropertyValue {
    fn from(v: Vec<PropertyValue>) -> Self {
        PropertyValue::List(v)
    }
}

impl From<IndexMap<String, PropertyValue>> for PropertyValue {
    fn from(v: IndexMap<String, PropertyValue>) -> Self {
        PropertyValue::Map(v)
    }
}

impl Serialize for PropertyValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PropertyValue::Str(v) => serializer.serialize_str(v),
            PropertyValue::Bool(v) => serializer.serialize_bool(*v),
            PropertyValue::Int(v) => serializer.serialize_i64(*v),
            PropertyValue::List(items) => items.serialize(serializer),
            PropertyValue::Map(entries) => entries.serialize(serializer),
            PropertyValue::Ref(r) => serializer.collect_str(r),
            PropertyValue::Interpolated(i) => serializer.collect_str(i),
        }
    }
}

// ===== Interpolation =====

/// A string assembled from literal pieces and deferred fragments. Rendering
/// waits for the engine; here the deferred parts stay symbolic.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Interpolation {
    fragments: Vec<Fragment>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    Literal(String),
    Output(OutputRef),
}

impl Interpolation {
    pub fn new() -> Self {
        Interpolation::default()
    }

    pub fn literal(mut self, s: impl Into<String>) -> Self {
        self.fragments.push(Fragment::Literal(s.into()));
        self
    }

    pub fn output(mut self, r: OutputRef) -> Self {
        self.fragments.push(Fragment::Output(r));
        self
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }
}

impl fmt::Display for Interpolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for fragment in &self.fragments {
            match fragment {
                Fragment::Literal(s) => f.write_str(s)?,
                Fragment::Output(r) => write!(f, "{r}")?,
            }
        }
        Ok(())
    }
}

// ===== Property map =====

/// Ordered property bag. Insertion order is preserved all the way into the
/// serialized graph, which keeps plans and fingerprints deterministic.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PropertyMap {
    entries: IndexMap<String, PropertyValue>,
}

impl PropertyMap {
    pub fn new() -> Self {
        PropertyMap::default()
    }

    /// Set a property.
    pub fn set(mut self, key: &str, value: impl Into<PropertyValue>) -> Self {
        self.entries.insert(key.to_string(), value.into());
        self
    }

    /// Set a property only when a value is present. `None` leaves no entry
    /// behind at all.
    pub fn maybe<V: Into<PropertyValue>>(self, key: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.set(key, v),
            None => self,
        }
    }

    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &PropertyValue> {
        self.entries.values()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl Serialize for PropertyMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.entries.serialize(serializer)
    }
}
