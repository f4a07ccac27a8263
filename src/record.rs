use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter},
};
use uuid::Uuid;

use crate::document::{Specification, TARGET_ID_KEY};

/// Store-assigned record identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId(pub u64);

impl Display for RecordId {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<RecordId> for Value {
    fn from(id: RecordId) -> Value {
        Value::from(id.0)
    }
}

impl RecordId {
    /// Reads a `target_id` style reference back out of a stored field item.
    pub fn from_item(item: &Value) -> Option<RecordId> {
        match item {
            Value::Object(map) => map.get(TARGET_ID_KEY).and_then(Value::as_u64).map(RecordId),
            _ => None,
        }
    }
}

/// A record as created or loaded by a [`RecordStore`](crate::store::RecordStore).
///
/// `id` stays `None` until the record is first saved. Properties hold the construction
/// arguments (identifying keys and scalar values); fields hold ordered value lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: Option<RecordId>,
    pub uuid: Option<Uuid>,
    pub record_type: String,
    pub bundle: Option<String>,
    #[serde(default)]
    pub properties: Specification,
    #[serde(default)]
    pub fields: BTreeMap<String, Vec<Value>>,
}

impl Record {
    pub fn new(record_type: impl Into<String>) -> Self {
        Record {
            record_type: record_type.into(),
            ..Default::default()
        }
    }

    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: Value) {
        self.properties.insert(key.into(), value);
    }

    pub fn field(&self, name: &str) -> &[Value] {
        self.fields.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn field_is_empty(&self, name: &str) -> bool {
        self.field(name).is_empty()
    }

    /// Replaces the field's contents with exactly one value.
    pub fn set_field(&mut self, name: &str, value: Value) {
        self.fields.insert(name.to_string(), vec![value]);
    }

    pub fn append_field(&mut self, name: &str, value: Value) {
        self.fields.entry(name.to_string()).or_default().push(value);
    }

    pub fn clear_field(&mut self, name: &str) {
        self.fields.insert(name.to_string(), Vec::new());
    }

    /// The value used when another record's field points at this one.
    pub fn reference_value(&self) -> Option<Value> {
        self.id.map(|id| {
            let mut map = Specification::new();
            map.insert(TARGET_ID_KEY.to_string(), id.into());
            Value::Object(map)
        })
    }

    /// Human readable label used in log output.
    pub fn label(&self) -> String {
        let name = ["title", "name", "filename"]
            .iter()
            .find_map(|key| self.properties.get(*key).and_then(Value::as_str));
        match (self.id, name) {
            (Some(id), Some(name)) => format!("{}:{} ({})", self.record_type, id, name),
            (Some(id), None) => format!("{}:{}", self.record_type, id),
            (None, Some(name)) => format!("{}:new ({})", self.record_type, name),
            (None, None) => format!("{}:new", self.record_type),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_assignment() {
        let mut record = Record::new("article");
        assert!(record.field_is_empty("tags"));
        record.append_field("tags", json!({"target_id": 1}));
        record.append_field("tags", json!({"target_id": 2}));
        assert_eq!(record.field("tags").len(), 2);
        record.set_field("tags", json!({"target_id": 3}));
        assert_eq!(record.field("tags"), &[json!({"target_id": 3})]);
        assert_eq!(RecordId::from_item(&record.field("tags")[0]), Some(RecordId(3)));
    }

    #[test]
    fn test_reference_value_requires_id() {
        let mut record = Record::new("tag");
        assert!(record.reference_value().is_none());
        record.id = Some(RecordId(7));
        assert_eq!(record.reference_value(), Some(json!({"target_id": 7})));
    }
}
