use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    collections::BTreeMap,
    fs::{read_to_string, write},
    path::Path,
    str::FromStr,
    sync::Arc,
};
use uuid::Uuid;

use crate::{
    codec::schema_registry::{SchemaInfo, SchemaRegistry},
    document::{Specification, UUID_KEY},
    error::SeedError,
    record::{Record, RecordId},
    store::RecordStore,
};

#[derive(Debug, Default)]
struct StoreState {
    next_id: u64,
    records: BTreeMap<RecordId, Record>,
    field_item_deletions: Vec<(RecordId, String, Value)>,
}

/// On-disk shape of a [`MemoryStore`].
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    next_id: u64,
    records: Vec<Record>,
}

/// In-memory [`RecordStore`] over a [`SchemaRegistry`].
///
/// Store order is ascending id. Records are validated against their schema's required
/// properties on save. The whole state can be written to and restored from a JSON snapshot,
/// which is how the CLI keeps content between runs.
#[derive(Debug)]
pub struct MemoryStore {
    schemas: SchemaRegistry,
    state: RwLock<StoreState>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        MemoryStore::new(SchemaRegistry::create())
    }
}

impl MemoryStore {
    pub fn new(schemas: SchemaRegistry) -> Self {
        MemoryStore {
            schemas,
            state: RwLock::new(StoreState::default()),
        }
    }

    pub fn schemas(&self) -> &SchemaRegistry {
        &self.schemas
    }

    /// Restores a store from a snapshot written by [`MemoryStore::write_snapshot`]. A missing
    /// snapshot file yields an empty store.
    pub fn from_snapshot<P: AsRef<Path>>(
        schemas: SchemaRegistry,
        path: P,
    ) -> Result<Self, SeedError> {
        let store = MemoryStore::new(schemas);
        if !path.as_ref().exists() {
            tracing::debug!("Snapshot {:?} not found, starting empty", path.as_ref());
            return Ok(store);
        }
        let snapshot: Snapshot = serde_json::from_str(&read_to_string(path.as_ref())?)?;
        tracing::debug!(
            "Restored {} records from {:?}",
            snapshot.records.len(),
            path.as_ref()
        );
        {
            let mut state = store.state.write();
            state.next_id = snapshot.next_id;
            for record in snapshot.records {
                let id = record.id.ok_or_else(|| {
                    SeedError::Serialization(format!("Snapshot holds unsaved {}", record.label()))
                })?;
                state.records.insert(id, record);
            }
        }
        Ok(store)
    }

    pub fn write_snapshot<P: AsRef<Path>>(&self, path: P) -> Result<(), SeedError> {
        let snapshot = {
            let state = self.state.read();
            Snapshot {
                next_id: state.next_id,
                records: state.records.values().cloned().collect(),
            }
        };
        let json = serde_json::to_string_pretty(&snapshot)?;
        write(path, json)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.state.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All saved records of a type, in store order.
    pub fn records(&self, record_type: &str) -> Vec<Record> {
        self.state
            .read()
            .records
            .values()
            .filter(|record| record.record_type == record_type)
            .cloned()
            .collect()
    }

    /// Field items handed to [`RecordStore::delete_field_items`], in call order.
    pub fn field_item_deletions(&self) -> Vec<(RecordId, String, Value)> {
        self.state.read().field_item_deletions.clone()
    }

    fn validate(schema: &SchemaInfo, record: &Record) -> Result<(), SeedError> {
        let missing = schema
            .required
            .iter()
            .filter(|key| record.property(key).map(Value::is_null).unwrap_or(true))
            .cloned()
            .collect::<Vec<String>>();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(SeedError::Validation(format!(
                "{} is missing required properties: {}",
                record.label(),
                missing.join(", ")
            )))
        }
    }
}

fn satisfies(record: &Record, key: &str, expected: &Value) -> bool {
    match key {
        "id" => record.id.map(Value::from).as_ref() == Some(expected)
            || record
                .id
                .zip(expected.as_str())
                .is_some_and(|(id, s)| id.to_string() == s),
        UUID_KEY => record
            .uuid
            .zip(expected.as_str())
            .is_some_and(|(uuid, s)| Uuid::from_str(s).is_ok_and(|other| other == uuid)),
        _ => match record.properties.get(key) {
            Some(actual) => loosely_equal(actual, expected),
            None => record
                .fields
                .get(key)
                .and_then(|items| items.first())
                .is_some_and(|item| loosely_equal(item, expected)),
        },
    }
}

// Document authors write `status: 1` and `status: "1"` interchangeably.
fn loosely_equal(actual: &Value, expected: &Value) -> bool {
    if actual == expected {
        return true;
    }
    match (actual, expected) {
        (Value::String(s), Value::Number(n)) | (Value::Number(n), Value::String(s)) => {
            s == &n.to_string()
        }
        (Value::Bool(b), Value::Number(n)) | (Value::Number(n), Value::Bool(b)) => {
            n.as_u64() == Some(*b as u64)
        }
        _ => false,
    }
}

impl RecordStore for MemoryStore {
    fn schema(&self, record_type: &str) -> Result<Arc<SchemaInfo>, SeedError> {
        self.schemas.require(record_type)
    }

    fn create(&self, record_type: &str, properties: &Specification) -> Result<Record, SeedError> {
        let schema = self.schema(record_type)?;
        let uuid = match properties.get(UUID_KEY) {
            Some(Value::String(raw)) => Uuid::from_str(raw)?,
            Some(other) => {
                return Err(SeedError::Validation(format!(
                    "'{UUID_KEY}' must be a string, found {other}"
                )))
            }
            None => Uuid::new_v4(),
        };
        let bundle = schema
            .bundle_key
            .as_ref()
            .and_then(|key| properties.get(key))
            .and_then(Value::as_str)
            .map(String::from);
        Ok(Record {
            id: None,
            uuid: Some(uuid),
            record_type: record_type.to_string(),
            bundle,
            properties: properties.clone(),
            fields: BTreeMap::default(),
        })
    }

    fn save(&self, record: &mut Record) -> Result<RecordId, SeedError> {
        let schema = self.schema(&record.record_type)?;
        Self::validate(&schema, record)?;
        let mut state = self.state.write();
        let id = match record.id {
            Some(id) => id,
            None => {
                state.next_id += 1;
                RecordId(state.next_id)
            }
        };
        record.id = Some(id);
        state.records.insert(id, record.clone());
        tracing::debug!("Saved {}", record.label());
        Ok(id)
    }

    fn query_exact(
        &self,
        record_type: &str,
        conditions: &Specification,
    ) -> Result<Vec<Record>, SeedError> {
        self.schema(record_type)?;
        Ok(self
            .state
            .read()
            .records
            .values()
            .filter(|record| record.record_type == record_type)
            .filter(|record| {
                conditions
                    .iter()
                    .all(|(key, expected)| satisfies(record, key, expected))
            })
            .cloned()
            .collect())
    }

    fn load(&self, record_type: &str, id: RecordId) -> Result<Option<Record>, SeedError> {
        Ok(self
            .state
            .read()
            .records
            .get(&id)
            .filter(|record| record.record_type == record_type)
            .cloned())
    }

    fn delete_record(&self, record: &Record) -> Result<(), SeedError> {
        if let Some(id) = record.id {
            if self.state.write().records.remove(&id).is_some() {
                tracing::debug!("Deleted {}", record.label());
            }
        }
        Ok(())
    }

    fn delete_field_items(
        &self,
        record: &Record,
        field: &str,
        items: &[Value],
    ) -> Result<(), SeedError> {
        if let Some(id) = record.id {
            let mut state = self.state.write();
            for item in items {
                state
                    .field_item_deletions
                    .push((id, field.to_string(), item.clone()));
            }
        }
        Ok(())
    }
}
