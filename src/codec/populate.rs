use serde_json::Value;

use crate::{
    codec::{
        context::BuildContext,
        schema_registry::{Cardinality, FieldDefinition},
    },
    document::FieldValue,
    error::SeedError,
    process::FieldHandle,
    record::{Record, RecordId},
};

/// Assigns document values to one field of a record.
pub struct FieldPopulator<'c, 'a> {
    ctx: &'c BuildContext<'a>,
}

impl<'c, 'a> FieldPopulator<'c, 'a> {
    pub fn new(ctx: &'c BuildContext<'a>) -> Self {
        FieldPopulator { ctx }
    }

    /// Populates `field` with `values` in document order.
    ///
    /// Cardinality is checked and every value resolved before the field is touched, so an error
    /// leaves the field unmodified. In update mode a non-empty field is then cleared. A
    /// single-value field takes the first value and ignores the rest.
    pub fn populate(
        &self,
        record: &mut Record,
        field: &str,
        definition: &FieldDefinition,
        values: Vec<Value>,
    ) -> Result<(), SeedError> {
        match definition.cardinality {
            Cardinality::Limited(0) => {
                return Err(SeedError::InvalidCardinality {
                    field: field.to_string(),
                })
            }
            Cardinality::Limited(limit) if values.len() > limit as usize => {
                return Err(SeedError::CardinalityExceeded {
                    field: field.to_string(),
                    limit,
                    received: values.len(),
                })
            }
            _ => {}
        }

        // Resolve everything before touching the field so a failing item leaves it as it was
        let total = values.len();
        let take = if definition.cardinality.is_single() {
            1
        } else {
            total
        };
        if total > take {
            tracing::warn!(
                "{}.{} holds a single value, ignoring {} more",
                record.record_type,
                field,
                total - take
            );
        }
        let items = values
            .into_iter()
            .take(take)
            .map(|value| self.resolve_item(&record.record_type, field, definition, value))
            .collect::<Result<Vec<Value>, SeedError>>()?;

        if self.ctx.is_update() && !record.field_is_empty(field) {
            self.clear(record, field, definition)?;
        }

        for item in items {
            if definition.cardinality.is_single() {
                record.set_field(field, item);
            } else {
                record.append_field(field, item);
            }
        }
        Ok(())
    }

    /// Empties a field ahead of an in-place update. Child records referenced through the field
    /// are deleted too when their type is exempt, since nothing else can reuse them.
    pub fn clear(
        &self,
        record: &mut Record,
        field: &str,
        definition: &FieldDefinition,
    ) -> Result<(), SeedError> {
        let held = record.field(field).to_vec();
        self.ctx.store.delete_field_items(record, field, &held)?;

        if let Some(target_type) = definition.target_type.as_deref() {
            if self.ctx.store.schema(target_type)?.exempt {
                for id in held.iter().filter_map(RecordId::from_item) {
                    if let Some(child) = self.ctx.store.load(target_type, id)? {
                        tracing::debug!("Deleting {} held by {}", child.label(), record.label());
                        self.ctx.store.delete_record(&child)?;
                    }
                }
            }
        }
        record.clear_field(field);
        Ok(())
    }

    fn resolve_item(
        &self,
        record_type: &str,
        field: &str,
        definition: &FieldDefinition,
        value: Value,
    ) -> Result<Value, SeedError> {
        let resolved = match FieldValue::from_value(value)? {
            FieldValue::Process {
                instruction,
                mut value,
            } => {
                let handle = FieldHandle::new(record_type, field, definition);
                self.ctx
                    .processors
                    .run(self.ctx, handle, &instruction, &mut value)?;
                FieldValue::from_value(value)?
            }
            other => other,
        };

        match resolved {
            FieldValue::Scalar(value) | FieldValue::Composite(value) => Ok(value),
            FieldValue::Reference { record_type, spec } => {
                let mut child = self.ctx.build(&record_type, &spec)?;
                self.ctx.store.save(&mut child)?;
                tracing::debug!("Built {} for {}", child.label(), field);
                child.reference_value().ok_or_else(|| {
                    SeedError::Storage(format!("{} has no id after saving", child.label()))
                })
            }
            FieldValue::Process { instruction, .. } => Err(SeedError::ConfigValue(format!(
                "Processor output for '{field}' carries another process instruction ('{}')",
                instruction.name
            ))),
        }
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

    fn definition(fixture: &Fixture, field: &str) -> FieldDefinition {
        fixture
            .store
            .schema("article")
            .unwrap()
            .fields
            .get(field)
            .cloned()
            .unwrap()
    }

    fn article(fixture: &Fixture) -> Record {
        let mut record = fixture
            .store
            .create("article", &spec(json!({"title": "Article"})))
            .unwrap();
        fixture.store.save(&mut record).unwrap();
        record
    }

    #[test]
    fn test_zero_cardinality_is_rejected() {
        let fixture = Fixture::new();
        let ctx = fixture.loader.context(ExistenceMode::CreateOnly);
        let mut record = article(&fixture);
        let result = FieldPopulator::new(&ctx).populate(
            &mut record,
            "broken",
            &definition(&fixture, "broken"),
            vec![],
        );
        assert_eq!(
            result,
            Err(SeedError::InvalidCardinality {
                field: "broken".to_string()
            })
        );
        assert!(record.field_is_empty("broken"));
    }

    #[test]
    fn test_exceeding_cardinality_leaves_field_untouched() {
        let fixture = Fixture::new();
        let ctx = fixture.loader.context(ExistenceMode::CheckAndUpdate);
        let mut record = article(&fixture);
        record.append_field("summary", json!("kept"));
        let result = FieldPopulator::new(&ctx).populate(
            &mut record,
            "summary",
            &definition(&fixture, "summary"),
            vec![json!("a"), json!("b"), json!("c")],
        );
        assert_eq!(
            result,
            Err(SeedError::CardinalityExceeded {
                field: "summary".to_string(),
                limit: 2,
                received: 3
            })
        );
        assert_eq!(record.field("summary"), &[json!("kept")]);
    }

    #[test]
    fn test_single_value_field_is_set_not_appended() {
        let fixture = Fixture::new();
        let ctx = fixture.loader.context(ExistenceMode::CreateOnly);
        let mut record = article(&fixture);
        record.append_field("body", json!({"value": "draft"}));
        FieldPopulator::new(&ctx)
            .populate(
                &mut record,
                "body",
                &definition(&fixture, "body"),
                vec![json!({"value": "final"})],
            )
            .unwrap();
        assert_eq!(record.field("body"), &[json!({"value": "final"})]);
    }

    #[test]
    fn test_nested_records_are_saved_and_referenced() {
        let fixture = Fixture::new();
        let ctx = fixture.loader.context(ExistenceMode::CreateOnly);
        let mut record = article(&fixture);
        FieldPopulator::new(&ctx)
            .populate(
                &mut record,
                "sections",
                &definition(&fixture, "sections"),
                vec![
                    json!({"type": "paragraph", "kind": "text", "text": {"value": "One"}}),
                    json!({"type": "paragraph", "kind": "text", "text": {"value": "Two"}}),
                ],
            )
            .unwrap();
        let paragraphs = fixture.store.records("paragraph");
        assert_eq!(paragraphs.len(), 2);
        assert_eq!(
            record.field("sections"),
            &[
                paragraphs[0].reference_value().unwrap(),
                paragraphs[1].reference_value().unwrap()
            ]
        );
        assert_eq!(paragraphs[1].field("text"), &[json!({"value": "Two"})]);
    }

    #[test]
    fn test_update_clears_and_cascades_exempt_children() {
        let fixture = Fixture::new();
        let sections = definition(&fixture, "sections");
        let mut record = article(&fixture);
        {
            let ctx = fixture.loader.context(ExistenceMode::CreateOnly);
            FieldPopulator::new(&ctx)
                .populate(
                    &mut record,
                    "sections",
                    &sections,
                    vec![json!({"type": "paragraph", "kind": "old"})],
                )
                .unwrap();
        }
        let old = fixture.store.records("paragraph");
        assert_eq!(old.len(), 1);

        let ctx = fixture.loader.context(ExistenceMode::CheckAndUpdate);
        FieldPopulator::new(&ctx)
            .populate(
                &mut record,
                "sections",
                &sections,
                vec![json!({"type": "paragraph", "kind": "new"})],
            )
            .unwrap();

        let remaining = fixture.store.records("paragraph");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].property("kind"), Some(&json!("new")));
        assert_eq!(
            record.field("sections"),
            &[remaining[0].reference_value().unwrap()]
        );
        assert_eq!(
            fixture.store.field_item_deletions(),
            vec![(
                record.id.unwrap(),
                "sections".to_string(),
                old[0].reference_value().unwrap()
            )]
        );
    }

    #[test]
    fn test_update_keeps_reusable_targets() {
        let fixture = Fixture::new();
        let tags = definition(&fixture, "tags");
        let mut record = article(&fixture);
        let ctx = fixture.loader.context(ExistenceMode::CheckAndUpdate);
        let populator = FieldPopulator::new(&ctx);
        let reference = json!({"process": {"name": "reference", "args": ["tag", {"name": "A"}]}});
        populator
            .populate(&mut record, "tags", &tags, vec![reference.clone()])
            .unwrap();
        populator
            .populate(&mut record, "tags", &tags, vec![reference])
            .unwrap();
        // The field was replaced, not appended to, and the tag itself survived
        assert_eq!(record.field("tags").len(), 1);
        assert_eq!(fixture.store.records("tag").len(), 1);
    }

    #[test]
    fn test_failing_item_leaves_field_unmodified() {
        let fixture = Fixture::new();
        fixture.write_payload("data_files", "ok.txt", b"ok");
        let attachments = definition(&fixture, "attachments");
        let mut record = article(&fixture);
        let prior = vec![json!({"target_id": 100}), json!({"target_id": 101})];
        for item in prior.iter() {
            record.append_field("attachments", item.clone());
        }

        let ctx = fixture.loader.context(ExistenceMode::CheckAndUpdate);
        let file = |name: &str| {
            json!({"process": {"name": "file", "args": [{"type": "file", "filename": name}]}})
        };
        let result = FieldPopulator::new(&ctx).populate(
            &mut record,
            "attachments",
            &attachments,
            vec![file("ok.txt"), file("missing.txt")],
        );
        assert!(matches!(result, Err(SeedError::MissingData(_))));
        assert_eq!(record.field("attachments"), prior.as_slice());
        assert!(fixture.store.field_item_deletions().is_empty());
    }

    #[test]
    fn test_create_mode_appends() {
        let fixture = Fixture::new();
        let ctx = fixture.loader.context(ExistenceMode::CreateOnly);
        let mut record = article(&fixture);
        record.append_field("tags", json!({"target_id": 99}));
        FieldPopulator::new(&ctx)
            .populate(
                &mut record,
                "tags",
                &definition(&fixture, "tags"),
                vec![json!({"target_id": 100})],
            )
            .unwrap();
        assert_eq!(record.field("tags").len(), 2);
    }

    #[test]
    fn test_instruction_never_reaches_the_record() {
        let fixture = Fixture::new();
        let ctx = fixture.loader.context(ExistenceMode::CreateOnly);
        let mut record = article(&fixture);
        FieldPopulator::new(&ctx)
            .populate(
                &mut record,
                "tags",
                &definition(&fixture, "tags"),
                vec![json!({
                    "weight": 3,
                    "#process": {"callback": "reference", "args": [{"type": "tag", "filter": {"name": "B"}}]}
                })],
            )
            .unwrap();
        let tag = &fixture.store.records("tag")[0];
        assert_eq!(
            record.field("tags"),
            &[json!({"weight": 3, "target_id": tag.id.unwrap().0})]
        );
    }

    #[test]
    fn test_unknown_processor() {
        let fixture = Fixture::new();
        let ctx = fixture.loader.context(ExistenceMode::CreateOnly);
        let mut record = article(&fixture);
        let result = FieldPopulator::new(&ctx).populate(
            &mut record,
            "tags",
            &definition(&fixture, "tags"),
            vec![json!({"process": {"name": "nope"}})],
        );
        assert_eq!(result, Err(SeedError::UnknownProcessor("nope".to_string())));

        let result = FieldPopulator::new(&ctx).populate(
            &mut record,
            "tags",
            &definition(&fixture, "tags"),
            vec![json!({"process": {"name": "reference", "args": []}})],
        );
        assert!(matches!(
            result,
            Err(SeedError::UncallableProcessor { ref name, .. }) if name == "reference"
        ));
    }
}
