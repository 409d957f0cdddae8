//! Minimal business-data carriers.
//!
//! The host owns the real entity model; the core only needs a named bag of
//! JSON attributes for the inline target and the pre/post snapshots.

use crate::RecordId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A snapshot of one business record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub logical_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,
}

impl EntityRecord {
    pub fn new(logical_name: impl Into<String>) -> Self {
        Self {
            logical_name: logical_name.into(),
            id: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_id(mut self, id: RecordId) -> Self {
        self.id = Some(id);
        self
    }

    /// Builder-style attribute setter.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(name.into(), value.into());
    }

    /// True when the record carries the attribute, even if its value is null.
    pub fn contains(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Typed attribute read; `None` when absent or not convertible.
    pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        self.attributes
            .get(name)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(Value::as_str)
    }
}

/// Named snapshots in registration order.
///
/// Order matters: "the" image of a kind is the first one registered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageSet(Vec<(String, EntityRecord)>);

impl ImageSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the image registered under `name`.
    pub fn insert(&mut self, name: impl Into<String>, record: EntityRecord) {
        let name = name.into();
        if let Some(slot) = self.0.iter_mut().find(|(existing, _)| *existing == name) {
            slot.1 = record;
        } else {
            self.0.push((name, record));
        }
    }

    pub fn with(mut self, name: impl Into<String>, record: EntityRecord) -> Self {
        self.insert(name, record);
        self
    }

    pub fn get(&self, name: &str) -> Option<&EntityRecord> {
        self.0
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, record)| record)
    }

    pub fn first(&self) -> Option<&EntityRecord> {
        self.0.first().map(|(_, record)| record)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &EntityRecord)> {
        self.0.iter().map(|(name, record)| (name.as_str(), record))
    }
}
