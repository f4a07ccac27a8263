use serde_json::Value;

use crate::{
    codec::classify::classify_type,
    document::{Specification, UUID_KEY},
    error::SeedError,
    record::Record,
    store::RecordStore,
};

/// Looks up records a specification may already describe.
///
/// Lookup is by `uuid` when the specification carries one, otherwise by an exact match on every
/// scalar identifying property. Exempt record types never match.
pub struct ExistenceResolver<'a> {
    store: &'a dyn RecordStore,
}

impl<'a> ExistenceResolver<'a> {
    pub fn new(store: &'a dyn RecordStore) -> Self {
        ExistenceResolver { store }
    }

    pub fn find_existing(
        &self,
        record_type: &str,
        spec: &Specification,
    ) -> Result<Option<Record>, SeedError> {
        let schema = self.store.schema(record_type)?;
        if schema.exempt {
            tracing::debug!(
                "[ExistenceResolver] {} records are always created fresh",
                record_type
            );
            return Ok(None);
        }
        if let Some(uuid) = spec.get(UUID_KEY) {
            return self.load_by_uuid(record_type, uuid);
        }
        self.load_by_properties(record_type, &self.extract_properties(record_type, spec)?)
    }

    pub fn load_by_uuid(
        &self,
        record_type: &str,
        uuid: &Value,
    ) -> Result<Option<Record>, SeedError> {
        let mut matches = self.store.load_by_key(record_type, UUID_KEY, uuid)?;
        if matches.len() > 1 {
            tracing::debug!(
                "[ExistenceResolver] {} {} records share uuid {}, using the first",
                matches.len(),
                record_type,
                uuid
            );
        }
        Ok(if matches.is_empty() {
            None
        } else {
            Some(matches.swap_remove(0))
        })
    }

    /// An empty condition set never matches.
    pub fn load_by_properties(
        &self,
        record_type: &str,
        conditions: &Specification,
    ) -> Result<Option<Record>, SeedError> {
        if conditions.is_empty() {
            return Ok(None);
        }
        Ok(self
            .store
            .query_exact(record_type, conditions)?
            .into_iter()
            .next())
    }

    /// The scalar identifying properties of `spec`, usable as query conditions.
    pub fn extract_properties(
        &self,
        record_type: &str,
        spec: &Specification,
    ) -> Result<Specification, SeedError> {
        Ok(classify_type(self.store, record_type, spec)?.conditions())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        codec::schema_registry::{SchemaInfo, SchemaRegistry},
        store::MemoryStore,
    };
    use serde_json::json;

    fn store() -> MemoryStore {
        let schemas = SchemaRegistry::create();
        schemas.register("tag", SchemaInfo::with_keys(["id", "uuid", "name", "vid"]));
        schemas.register(
            "paragraph",
            SchemaInfo::with_keys(["id", "uuid", "kind"]).exempt(),
        );
        MemoryStore::new(schemas)
    }

    fn spec(value: Value) -> Specification {
        value.as_object().cloned().unwrap()
    }

    fn saved(store: &MemoryStore, record_type: &str, value: Value) -> Record {
        let mut record = store.create(record_type, &spec(value)).unwrap();
        store.save(&mut record).unwrap();
        record
    }

    #[test]
    fn test_property_match() {
        let store = store();
        let existing = saved(&store, "tag", json!({"name": "A", "vid": "tags"}));
        let resolver = ExistenceResolver::new(&store);
        let found = resolver
            .find_existing(
                "tag",
                &spec(json!({"type": "tag", "name": "A", "vid": "tags", "extra": [1]})),
            )
            .unwrap();
        assert_eq!(found.and_then(|r| r.id), existing.id);
        assert!(resolver
            .find_existing("tag", &spec(json!({"name": "A", "vid": "other"})))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_uuid_takes_priority() {
        let store = store();
        let target = saved(&store, "tag", json!({"name": "Original"}));
        saved(&store, "tag", json!({"name": "Renamed"}));
        let resolver = ExistenceResolver::new(&store);
        let uuid = target.uuid.unwrap().to_string();
        let found = resolver
            .find_existing("tag", &spec(json!({"uuid": uuid, "name": "Renamed"})))
            .unwrap()
            .unwrap();
        assert_eq!(found.id, target.id);

        // An unknown uuid does not fall back to the properties
        let missing = resolver
            .find_existing(
                "tag",
                &spec(json!({"uuid": "6f1c5e0a-8a1d-4a53-9a55-3f2c0b7e9d10", "name": "Renamed"})),
            )
            .unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_exempt_types_never_match() {
        let store = store();
        saved(&store, "paragraph", json!({"kind": "text"}));
        let resolver = ExistenceResolver::new(&store);
        assert!(resolver
            .find_existing("paragraph", &spec(json!({"kind": "text"})))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_empty_conditions_never_match() {
        let store = store();
        saved(&store, "tag", json!({"name": "A"}));
        let resolver = ExistenceResolver::new(&store);
        assert!(resolver
            .find_existing("tag", &spec(json!({"type": "tag"})))
            .unwrap()
            .is_none());
        assert!(matches!(
            resolver.find_existing("nope", &Specification::new()),
            Err(SeedError::UnknownType(_))
        ));
    }
}
