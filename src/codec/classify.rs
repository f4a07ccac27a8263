use crate::{
    codec::schema_registry::SchemaInfo,
    document::{is_composite, Specification},
    error::SeedError,
    store::RecordStore,
};

/// A specification partitioned against its record type's schema. Each part keeps document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassifiedAttributes {
    /// Identifying keys, plus field keys whose value is a scalar.
    pub properties: Specification,
    /// Field keys holding sequences or mappings.
    pub fields: Specification,
    /// Keys the schema does not know. Ignored downstream.
    pub unclassified: Specification,
}

impl ClassifiedAttributes {
    /// Properties usable as exact-match query conditions (scalars only).
    pub fn conditions(&self) -> Specification {
        self.properties
            .iter()
            .filter(|(_, value)| !is_composite(value))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

/// Partitions `spec` into properties, fields and unclassified keys.
///
/// A key that is both an identifying key and a field is treated as a property.
pub fn classify(schema: &SchemaInfo, spec: &Specification) -> ClassifiedAttributes {
    let mut attributes = ClassifiedAttributes::default();
    for (key, value) in spec.iter() {
        let bucket = if schema.is_key(key) || (schema.is_field(key) && !is_composite(value)) {
            &mut attributes.properties
        } else if schema.is_field(key) {
            &mut attributes.fields
        } else {
            &mut attributes.unclassified
        };
        bucket.insert(key.clone(), value.clone());
    }
    attributes
}

/// [`classify`] against the store's schema for `record_type`.
pub fn classify_type(
    store: &dyn RecordStore,
    record_type: &str,
    spec: &Specification,
) -> Result<ClassifiedAttributes, SeedError> {
    let schema = store.schema(record_type)?;
    Ok(classify(&schema, spec))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::schema_registry::{Cardinality, FieldDefinition};
    use serde_json::{json, Value};

    fn article() -> SchemaInfo {
        SchemaInfo::with_keys(["id", "uuid", "title", "status"])
            .field("body", FieldDefinition::new(Cardinality::Limited(1)))
            .field("status_note", FieldDefinition::new(Cardinality::Limited(1)))
            .field("tags", FieldDefinition::new(Cardinality::Unlimited))
    }

    fn spec(value: Value) -> Specification {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_partition() {
        let attributes = classify(
            &article(),
            &spec(json!({
                "type": "article",
                "title": "Basic Article",
                "body": {"value": "<p>Lorem</p>", "format": "full_html"},
                "tags": [{"target_id": 1}],
                "comment": "ignored"
            })),
        );
        assert_eq!(
            attributes.properties.keys().collect::<Vec<_>>(),
            vec!["title"]
        );
        assert_eq!(
            attributes.fields.keys().collect::<Vec<_>>(),
            vec!["body", "tags"]
        );
        assert_eq!(
            attributes.unclassified.keys().collect::<Vec<_>>(),
            vec!["type", "comment"]
        );
    }

    #[test]
    fn test_scalar_field_is_property() {
        let attributes = classify(&article(), &spec(json!({"status_note": 1})));
        assert_eq!(attributes.properties.get("status_note"), Some(&json!(1)));
        assert!(attributes.fields.is_empty());
    }

    #[test]
    fn test_classification_is_idempotent() {
        let schema = article();
        let input = spec(json!({
            "title": "A",
            "body": "plain",
            "tags": [{"target_id": 1}],
            "other": [1]
        }));
        let first = classify(&schema, &input);
        assert_eq!(first, classify(&schema, &input));
    }

    #[test]
    fn test_conditions_skip_composite_properties() {
        let schema = SchemaInfo::with_keys(["title", "link"]);
        let attributes = classify(
            &schema,
            &spec(json!({"title": "Home", "link": [{"uri": "internal:/"}]})),
        );
        assert_eq!(attributes.conditions(), spec(json!({"title": "Home"})));
    }
}
