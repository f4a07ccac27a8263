//! Storage collaborators consumed by the build pipeline.
//!
//! The pipeline never reaches a store through global state: a [`RecordStore`] and a
//! [`PayloadStore`] are handed to the [`GraphLoader`](crate::codec::GraphLoader) and travel
//! down the recursive build inside the [`BuildContext`](crate::codec::BuildContext).
//!
//! All methods take `&self`; implementations that mutate shared state are expected to use
//! interior locking the way [`MemoryStore`] does.

use serde_json::Value;
use std::{path::Path, sync::Arc};

use crate::{
    codec::schema_registry::SchemaInfo,
    document::Specification,
    error::SeedError,
    record::{Record, RecordId},
};

pub mod memory;
pub mod payload;

pub use memory::MemoryStore;
pub use payload::FsPayloadStore;

pub trait RecordStore: Send + Sync {
    /// Type metadata for `record_type`; [`SeedError::UnknownType`] if none is registered.
    fn schema(&self, record_type: &str) -> Result<Arc<SchemaInfo>, SeedError>;

    /// Stubs out a new, unsaved record from its construction properties.
    fn create(&self, record_type: &str, properties: &Specification) -> Result<Record, SeedError>;

    /// Persists the record, assigning an id on first save.
    fn save(&self, record: &mut Record) -> Result<RecordId, SeedError>;

    /// Saved records of `record_type` whose values equal every condition, in store order.
    fn query_exact(
        &self,
        record_type: &str,
        conditions: &Specification,
    ) -> Result<Vec<Record>, SeedError>;

    /// Saved records of `record_type` whose `key` equals `value`, in store order.
    fn load_by_key(
        &self,
        record_type: &str,
        key: &str,
        value: &Value,
    ) -> Result<Vec<Record>, SeedError> {
        let mut conditions = Specification::new();
        conditions.insert(key.to_string(), value.clone());
        self.query_exact(record_type, &conditions)
    }

    fn load(&self, record_type: &str, id: RecordId) -> Result<Option<Record>, SeedError>;

    fn delete_record(&self, record: &Record) -> Result<(), SeedError>;

    /// Delete callbacks for field items about to be cleared from `record` during an update.
    fn delete_field_items(
        &self,
        _record: &Record,
        _field: &str,
        _items: &[Value],
    ) -> Result<(), SeedError> {
        Ok(())
    }
}

pub trait PayloadStore: Send + Sync {
    /// Reads a source payload. A missing file is `Ok(None)`, not an error.
    fn read_bytes(&self, path: &Path) -> Result<Option<Vec<u8>>, SeedError>;

    /// Persists `bytes` as `filename` under `directory` (relative to the public root, may be
    /// empty) and returns the saved record describing the payload.
    fn write_blob(
        &self,
        directory: &str,
        filename: &str,
        bytes: &[u8],
    ) -> Result<Record, SeedError>;
}
