//! Built-in [`ImportListener`]s.

use serde_json::{json, Value};
use std::collections::BTreeSet;

use crate::{
    codec::{context::BuildContext, schema_registry::FieldDefinition},
    document::{is_composite, ProcessInstruction, Specification, PROCESS_KEY, PROCESS_KEY_LEGACY},
    error::SeedError,
    event::{ImportEvent, ImportListener},
    process::{menu_link, FieldHandle},
    record::Record,
};

/// Item key holding the menu link to create for a saved record.
pub const MENU_KEY: &str = "menu";

/// Creates menu links for saved records whose document item carries a `menu` entry.
///
/// ```yaml
/// - type: page
///   title: About
///   menu:
///     menu_name: main
///     title: About us
///     parent: {menu_name: main, title: Company}
/// ```
///
/// The link points at the saved record and inherits its `langcode`. A `parent` mapping is
/// resolved to an existing link (or created) first and replaced by its plugin id.
pub struct MenuLinkSubscriber {
    record_types: BTreeSet<String>,
}

impl MenuLinkSubscriber {
    pub fn new<I, S>(record_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        MenuLinkSubscriber {
            record_types: record_types.into_iter().map(Into::into).collect(),
        }
    }

    fn create_link(
        &self,
        ctx: &BuildContext<'_>,
        menu: &Value,
        owner: Option<&Record>,
    ) -> Result<Value, SeedError> {
        let mut data = menu_data(menu)?;

        if let Some(owner) = owner {
            let id = owner.id.ok_or_else(|| {
                SeedError::MissingData(format!("{} must be saved before linking", owner.label()))
            })?;
            let mut linked = Specification::new();
            linked.insert(
                "link".to_string(),
                json!([{"uri": format!("entity:{}/{}", owner.record_type, id)}]),
            );
            if let Some(langcode) = owner.property("langcode") {
                linked.insert("langcode".to_string(), langcode.clone());
            }
            for (key, value) in data {
                linked.entry(key).or_insert(value);
            }
            data = linked;
        }

        if let Some(parent) = data.get("parent").filter(|p| is_composite(p)).cloned() {
            let parent_id = self.create_link(ctx, &parent, None)?;
            data.insert("parent".to_string(), parent_id);
        }

        let instruction = ProcessInstruction::new(menu_link::NAME, vec![Value::Object(data)]);
        let definition = FieldDefinition::default();
        let field = FieldHandle::new(
            owner.map(|o| o.record_type.as_str()).unwrap_or_default(),
            MENU_KEY,
            &definition,
        );
        let mut value = Value::Null;
        ctx.processors.run(ctx, field, &instruction, &mut value)?;
        Ok(value)
    }
}

/// The link properties of a `menu` entry: a mapping, a one-item list of mappings, or a
/// `menu_link` process instruction whose first argument is the mapping.
fn menu_data(menu: &Value) -> Result<Specification, SeedError> {
    let menu = match menu {
        Value::Array(items) => items.first().unwrap_or(&Value::Null),
        other => other,
    };
    let instruction = menu
        .get(PROCESS_KEY)
        .or_else(|| menu.get(PROCESS_KEY_LEGACY));
    let data = match instruction {
        Some(instruction) => instruction.get("args").and_then(|args| args.get(0)),
        None => Some(menu),
    };
    match data {
        Some(Value::Object(data)) => Ok(data.clone()),
        _ => Err(SeedError::ConfigValue(format!(
            "'{MENU_KEY}' must be a mapping of menu link properties"
        ))),
    }
}

impl ImportListener for MenuLinkSubscriber {
    fn on_event(&self, event: &ImportEvent<'_>, ctx: &BuildContext<'_>) -> Result<(), SeedError> {
        let ImportEvent::RecordPostSave { record, spec } = event else {
            return Ok(());
        };
        if !self.record_types.contains(&record.record_type) {
            return Ok(());
        }
        if let Some(menu) = spec.get(MENU_KEY) {
            tracing::info!("Creating menu link for {}", record.label());
            self.create_link(ctx, menu, Some(record))?;
        }
        Ok(())
    }
}
