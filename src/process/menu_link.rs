use serde_json::Value;
use std::ops::RangeInclusive;

use crate::{
    codec::{context::BuildContext, existence::ExistenceResolver, schema_registry::MENU_LINK_TYPE},
    document::{is_composite, Specification},
    error::SeedError,
    process::{param_error, FieldHandle, Processor},
    record::RecordId,
};

pub const NAME: &str = "menu_link";

/// Looks up or creates a `menu_link` record and rewrites the value to its plugin id,
/// `"<bundle>:<uuid>"`, which is how menu parents and menu fields refer to links.
#[derive(Debug, Default, Clone, Copy)]
pub struct MenuLinkProcessor;

impl Processor for MenuLinkProcessor {
    fn arity(&self) -> RangeInclusive<usize> {
        1..=1
    }

    fn process(
        &self,
        ctx: &BuildContext<'_>,
        _field: FieldHandle<'_>,
        value: &mut Value,
        args: &[Value],
    ) -> Result<Option<RecordId>, SeedError> {
        let Some(Value::Object(data)) = args.first() else {
            return Err(SeedError::ConfigValue(format!(
                "'{NAME}' expects a mapping of menu link properties"
            )));
        };
        let conditions = data
            .iter()
            .filter(|(_, v)| !is_composite(v))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect::<Specification>();

        let resolver = ExistenceResolver::new(ctx.store);
        let link = match resolver.load_by_properties(MENU_LINK_TYPE, &conditions)? {
            Some(existing) => existing,
            None => {
                let mut link = ctx.store.create(MENU_LINK_TYPE, data)?;
                match ctx.store.save(&mut link) {
                    Ok(_) => tracing::info!("Created {}", link.label()),
                    Err(SeedError::Validation(_)) => {
                        return Err(param_error(
                            "Unable to find referenced content",
                            MENU_LINK_TYPE,
                            data,
                        ))
                    }
                    Err(e) => return Err(e),
                }
                link
            }
        };
        let uuid = link.uuid.ok_or_else(|| {
            SeedError::MissingData(format!("{} has no uuid to link to", link.label()))
        })?;
        let bundle = link.bundle.as_deref().unwrap_or(MENU_LINK_TYPE);
        *value = Value::String(format!("{bundle}:{uuid}"));
        Ok(link.id)
    }
}
