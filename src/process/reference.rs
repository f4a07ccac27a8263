use serde_json::Value;
use std::ops::RangeInclusive;

use crate::{
    codec::{context::BuildContext, existence::ExistenceResolver},
    document::{is_composite, Specification},
    error::SeedError,
    process::{param_error, set_target_id, typed_args, FieldHandle, Processor},
    record::RecordId,
};

pub const NAME: &str = "reference";

/// Looks up a record by filter properties, creating it from the filters when none matches, and
/// points the value at it.
///
/// Arguments are either `[{type: tag, filter: {name: News}}]` or `[tag, {name: News}]`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReferenceProcessor;

impl Processor for ReferenceProcessor {
    fn arity(&self) -> RangeInclusive<usize> {
        1..=2
    }

    fn process(
        &self,
        ctx: &BuildContext<'_>,
        field: FieldHandle<'_>,
        value: &mut Value,
        args: &[Value],
    ) -> Result<Option<RecordId>, SeedError> {
        let (record_type, filter) = typed_args(NAME, args, Some("filter"))?;
        let conditions = filter
            .iter()
            .filter(|(_, v)| !is_composite(v))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect::<Specification>();

        let resolver = ExistenceResolver::new(ctx.store);
        let id = match resolver.load_by_properties(&record_type, &conditions)? {
            Some(existing) => existing.id,
            None => {
                let mut record = ctx.store.create(&record_type, &filter)?;
                match ctx.store.save(&mut record) {
                    Ok(id) => {
                        tracing::info!(
                            "Created {} referenced from {}.{}",
                            record.label(),
                            field.record_type,
                            field.name
                        );
                        Some(id)
                    }
                    Err(SeedError::Validation(reason)) => {
                        tracing::debug!("Referenced {} rejected: {}", record_type, reason);
                        None
                    }
                    Err(e) => return Err(e),
                }
            }
        };
        let id = id.ok_or_else(|| {
            param_error("Unable to find referenced content", &record_type, &filter)
        })?;
        set_target_id(value, id);
        Ok(Some(id))
    }
}
