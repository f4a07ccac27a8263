use chrono::Utc;
use serde_json::Value;

use crate::{
    codec::{
        classify::classify, context::BuildContext, existence::ExistenceResolver,
        populate::FieldPopulator, schema_registry::SchemaInfo,
    },
    document::{field_items, Specification, UUID_KEY},
    error::SeedError,
    event::ImportEvent,
    record::Record,
};

/// Record type whose `name` is made unique on every build.
pub const USER_TYPE: &str = "user";

/// Builds one record (and, recursively, the records nested in its fields) from a specification.
///
/// The returned record is not saved: the [`GraphLoader`](super::GraphLoader) saves top-level
/// records, and nested records are saved by the [`FieldPopulator`] that needs their id.
pub struct EntityBuilder<'c, 'a> {
    ctx: &'c BuildContext<'a>,
}

impl<'c, 'a> EntityBuilder<'c, 'a> {
    pub fn new(ctx: &'c BuildContext<'a>) -> Self {
        EntityBuilder { ctx }
    }

    pub fn build(&self, record_type: &str, spec: &Specification) -> Result<Record, SeedError> {
        let schema = self.ctx.store.schema(record_type)?;
        self.ctx
            .emit(&ImportEvent::ImportRecord { record_type, spec })?;

        let mut attributes = classify(&schema, spec);
        normalize_properties(record_type, &mut attributes.properties);

        let adopted = if self.ctx.is_update() {
            ExistenceResolver::new(self.ctx.store).find_existing(record_type, spec)?
        } else {
            None
        };

        let mut record = match adopted {
            Some(mut existing) => {
                if spec.contains_key(UUID_KEY) {
                    for (key, value) in attributes.properties.iter() {
                        existing.set_property(key.clone(), value.clone());
                    }
                }
                tracing::info!("Updating existing {}", existing.label());
                existing
            }
            None => self.ctx.store.create(record_type, &attributes.properties)?,
        };

        if schema.fieldable {
            self.populate_fields(&schema, &mut record, attributes.fields)?;
        } else if !attributes.fields.is_empty() {
            tracing::debug!(
                "{} records have no fields, ignoring {:?}",
                record_type,
                attributes.fields.keys().collect::<Vec<_>>()
            );
        }
        Ok(record)
    }

    /// Populates every classified field in document order. A field failing with a recoverable
    /// error is logged and left as it was; any other error aborts the build.
    pub fn populate_fields(
        &self,
        schema: &SchemaInfo,
        record: &mut Record,
        fields: Specification,
    ) -> Result<(), SeedError> {
        let populator = FieldPopulator::new(self.ctx);
        for (name, value) in fields {
            let Some(definition) = schema.fields.get(&name) else {
                return Err(SeedError::ConfigValue(format!(
                    "Undefined field: {}.{}",
                    record.record_type, name
                )));
            };
            let values = field_items(value);
            self.ctx.emit(&ImportEvent::ImportField {
                record: &*record,
                field: &name,
                values: &values,
            })?;
            match populator.populate(record, &name, definition, values) {
                Ok(()) => {}
                Err(e) if e.is_recoverable() => {
                    tracing::warn!(
                        "Skipping {}.{} on {}: {}",
                        record.record_type,
                        name,
                        record.label(),
                        e
                    );
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

/// Type-keyed adjustments to construction properties. A user's `name` gets a
/// `_<unix seconds>` suffix.
fn normalize_properties(record_type: &str, properties: &mut Specification) {
    if record_type != USER_TYPE {
        return;
    }
    let suffix = format!("_{}", Utc::now().timestamp());
    match properties.get_mut("name") {
        Some(Value::String(name)) => name.push_str(&suffix),
        Some(Value::Array(items)) => {
            if let Some(Value::String(name)) = items
                .first_mut()
                .and_then(|item| item.get_mut("value"))
            {
                name.push_str(&suffix);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        codec::context::ExistenceMode,
        store::RecordStore,
        tests::helpers::{spec, Fixture},
    };
    use serde_json::json;
    use test_log::test;

    #[test]
    fn test_create_mode_never_adopts() {
        let fixture = Fixture::new();
        let ctx = fixture.loader.context(ExistenceMode::CreateOnly);
        let input = spec(json!({"type": "tag", "name": "News"}));
        let mut first = ctx.build("tag", &input).unwrap();
        fixture.store.save(&mut first).unwrap();
        let second = ctx.build("tag", &input).unwrap();
        assert!(second.is_new());
    }

    #[test]
    fn test_update_mode_adopts_and_replaces_fields() {
        let fixture = Fixture::new();
        let ctx = fixture.loader.context(ExistenceMode::CheckAndUpdate);
        let mut first = ctx
            .build(
                "article",
                &spec(json!({"type": "article", "title": "A", "body": {"value": "one"}})),
            )
            .unwrap();
        fixture.store.save(&mut first).unwrap();

        let second = ctx
            .build(
                "article",
                &spec(json!({"type": "article", "title": "A", "body": {"value": "two"}})),
            )
            .unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.field("body"), &[json!({"value": "two"})]);
    }

    #[test]
    fn test_recoverable_field_errors_are_skipped() {
        let fixture = Fixture::new();
        let ctx = fixture.loader.context(ExistenceMode::CreateOnly);
        let record = ctx
            .build(
                "article",
                &spec(json!({
                    "type": "article",
                    "title": "A",
                    "image": {"process": {"name": "file", "args": ["image", {"filename": "none.png"}]}},
                    "body": {"value": "kept"}
                })),
            )
            .unwrap();
        assert!(record.field_is_empty("image"));
        assert_eq!(record.field("body"), &[json!({"value": "kept"})]);
    }

    #[test]
    fn test_recovered_field_keeps_prior_values_on_update() {
        let fixture = Fixture::new();
        fixture.write_payload("data_files", "ok.txt", b"ok");
        let mut existing = fixture
            .store
            .create("article", &spec(json!({"title": "A"})))
            .unwrap();
        existing.append_field("attachments", json!({"target_id": 100}));
        existing.append_field("attachments", json!({"target_id": 101}));
        fixture.store.save(&mut existing).unwrap();

        let ctx = fixture.loader.context(ExistenceMode::CheckAndUpdate);
        let record = ctx
            .build(
                "article",
                &spec(json!({
                    "type": "article",
                    "title": "A",
                    "attachments": [
                        {"process": {"name": "file", "args": ["file", {"filename": "ok.txt"}]}},
                        {"process": {"name": "file", "args": ["file", {"filename": "missing.txt"}]}}
                    ]
                })),
            )
            .unwrap();
        assert_eq!(record.id, existing.id);
        assert_eq!(
            record.field("attachments"),
            &[json!({"target_id": 100}), json!({"target_id": 101})]
        );
    }

    #[test]
    fn test_unknown_type() {
        let fixture = Fixture::new();
        let ctx = fixture.loader.context(ExistenceMode::CreateOnly);
        assert_eq!(
            ctx.build("nope", &spec(json!({"type": "nope"}))),
            Err(SeedError::UnknownType("nope".to_string()))
        );
    }

    #[test]
    fn test_user_names_are_suffixed() {
        let mut properties = json!({"name": "editor", "mail": "e@example.com"})
            .as_object()
            .cloned()
            .unwrap();
        normalize_properties(USER_TYPE, &mut properties);
        let name = properties["name"].as_str().unwrap();
        assert!(name.starts_with("editor_"));
        assert!(name["editor_".len()..].parse::<i64>().is_ok());

        let mut properties = json!({"name": [{"value": "admin"}]})
            .as_object()
            .cloned()
            .unwrap();
        normalize_properties(USER_TYPE, &mut properties);
        assert!(properties["name"][0]["value"]
            .as_str()
            .unwrap()
            .starts_with("admin_"));
    }

    #[test]
    fn test_other_types_are_untouched() {
        let mut properties = json!({"name": "News"}).as_object().cloned().unwrap();
        normalize_properties("tag", &mut properties);
        assert_eq!(properties["name"], json!("News"));
    }
}
