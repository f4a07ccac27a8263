//! Pluggable value processors.
//!
//! A field value may carry a process instruction naming one of the processors registered
//! here. The processor rewrites the value before it is stored, typically by resolving it to the
//! id of another record:
//!
//! ```yaml
//! - type: article
//!   title: Tagged
//!   tags:
//!     - process:
//!         name: reference
//!         args: [{type: tag, filter: {name: News}}]
//!         dependency: tags.yml
//! ```
//!
//! Built-in processors are [`reference`], [`file`] and [`menu_link`]. Additional processors are
//! added with [`ProcessorRegistry::register`].

use parking_lot::RwLock;
use serde_json::Value;
use std::{collections::BTreeMap, ops::RangeInclusive, sync::Arc};

use crate::{
    codec::{context::BuildContext, schema_registry::FieldDefinition},
    document::{ProcessInstruction, Specification, PROCESS_KEY, PROCESS_KEY_LEGACY, TARGET_ID_KEY},
    error::SeedError,
    process::{file::FileProcessor, menu_link::MenuLinkProcessor, reference::ReferenceProcessor},
    record::RecordId,
};

pub mod file;
pub mod menu_link;
pub mod reference;

/// The field a processed value is destined for.
#[derive(Debug, Clone, Copy)]
pub struct FieldHandle<'a> {
    pub record_type: &'a str,
    pub name: &'a str,
    pub definition: &'a FieldDefinition,
}

impl<'a> FieldHandle<'a> {
    pub fn new(record_type: &'a str, name: &'a str, definition: &'a FieldDefinition) -> Self {
        FieldHandle {
            record_type,
            name,
            definition,
        }
    }
}

pub trait Processor: Send + Sync {
    /// Accepted number of positional arguments.
    fn arity(&self) -> RangeInclusive<usize> {
        0..=usize::MAX
    }

    /// Rewrites `value` in place, returning the id of the record it now refers to, if any.
    fn process(
        &self,
        ctx: &BuildContext<'_>,
        field: FieldHandle<'_>,
        value: &mut Value,
        args: &[Value],
    ) -> Result<Option<RecordId>, SeedError>;
}

/// Name-keyed table of [`Processor`]s.
pub struct ProcessorRegistry(Arc<RwLock<BTreeMap<String, Arc<dyn Processor>>>>);

impl Clone for ProcessorRegistry {
    fn clone(&self) -> Self {
        ProcessorRegistry(self.0.clone())
    }
}

impl Default for ProcessorRegistry {
    fn default() -> Self {
        ProcessorRegistry::create()
    }
}

impl ProcessorRegistry {
    /// An empty registry.
    pub fn empty() -> Self {
        ProcessorRegistry(Arc::new(RwLock::new(BTreeMap::new())))
    }

    /// Create registry with the built-in `reference`, `file` and `menu_link` processors
    pub fn create() -> Self {
        let registry = ProcessorRegistry::empty();
        registry.register(reference::NAME, ReferenceProcessor);
        registry.register(file::NAME, FileProcessor);
        registry.register(menu_link::NAME, MenuLinkProcessor);
        registry
    }

    pub fn register<P: Processor + 'static>(&self, name: &str, processor: P) {
        let mut writer = self.0.write();
        if writer.contains_key(name) {
            tracing::info!(
                "[ProcessorRegistry::register] Overwriting existing processor: {}",
                name
            );
        }
        writer.insert(name.to_string(), Arc::new(processor));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Processor>> {
        self.0.read().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.0.read().keys().cloned().collect()
    }

    /// Runs the processor an instruction names on `value`.
    ///
    /// When the instruction declares a dependency, that document is loaded in full first. Any
    /// process instruction left on the value afterwards is removed.
    pub fn run(
        &self,
        ctx: &BuildContext<'_>,
        field: FieldHandle<'_>,
        instruction: &ProcessInstruction,
        value: &mut Value,
    ) -> Result<Option<RecordId>, SeedError> {
        let name = instruction.name.as_str();
        let args = instruction.args.as_slice();
        // The lock is released before running: processors may recurse into the registry.
        let processor = self
            .get(name)
            .ok_or_else(|| SeedError::UnknownProcessor(name.to_string()))?;
        let arity = processor.arity();
        if !arity.contains(&args.len()) {
            return Err(SeedError::UncallableProcessor {
                name: name.to_string(),
                reason: format!(
                    "expects {} to {} arguments, {} given",
                    arity.start(),
                    arity.end(),
                    args.len()
                ),
            });
        }
        if let Some(document) = instruction.dependency.as_deref() {
            ctx.load_dependency(document)?;
        }
        tracing::debug!(
            "Running processor '{}' for {}.{}",
            name,
            field.record_type,
            field.name
        );
        let id = processor.process(ctx, field, value, args)?;
        if let Value::Object(map) = value {
            map.shift_remove(PROCESS_KEY);
            map.shift_remove(PROCESS_KEY_LEGACY);
        }
        Ok(id)
    }
}

/// Writes a resolved reference into a value, keeping any sibling keys (e.g. `alt` text).
pub(crate) fn set_target_id(value: &mut Value, id: RecordId) {
    match value {
        Value::Object(map) => {
            map.insert(TARGET_ID_KEY.to_string(), id.into());
        }
        other => {
            let mut map = Specification::new();
            map.insert(TARGET_ID_KEY.to_string(), id.into());
            *other = Value::Object(map);
        }
    }
}

/// A [`SeedError::MissingData`] listing the parameters that could not be satisfied.
pub(crate) fn param_error(message: &str, record_type: &str, params: &Specification) -> SeedError {
    let mut lines = vec!["[".to_string(), format!("  \"type\" => {record_type},")];
    for (key, value) in params.iter() {
        let shown = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        lines.push(format!("  '{key}' => '{shown}',"));
    }
    lines.push("]".to_string());
    SeedError::MissingData(format!("{message}: {}", lines.join("\n")))
}

/// Reads the `[type, {params}]` or `[{type, <params_key>: {params}}]` argument forms.
pub(crate) fn typed_args(
    processor: &str,
    args: &[Value],
    params_key: Option<&str>,
) -> Result<(String, Specification), SeedError> {
    let invalid = || {
        SeedError::ConfigValue(format!(
            "'{processor}' expects [type, {{...}}] or [{{type: ...}}] arguments"
        ))
    };
    match args {
        [Value::String(record_type), Value::Object(params)] => {
            Ok((record_type.clone(), params.clone()))
        }
        [Value::Object(map)] => {
            let record_type = map
                .get("type")
                .and_then(Value::as_str)
                .ok_or_else(invalid)?
                .to_string();
            let params = match params_key {
                Some(key) => match map.get(key) {
                    Some(Value::Object(params)) => params.clone(),
                    None => Specification::new(),
                    Some(_) => return Err(invalid()),
                },
                None => {
                    let mut params = map.clone();
                    params.shift_remove("type");
                    params
                }
            };
            Ok((record_type, params))
        }
        _ => Err(invalid()),
    }
}
