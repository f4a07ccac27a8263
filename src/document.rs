//! Document-level data model: record specifications, process instructions and the tagged
//! variant every field value is sorted into before it is assigned.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SeedError;

/// Discriminator key naming the record type of a specification.
pub const TYPE_KEY: &str = "type";
/// Key carrying a record's globally-unique identifier.
pub const UUID_KEY: &str = "uuid";
/// Reserved key holding a [`ProcessInstruction`].
pub const PROCESS_KEY: &str = "process";
/// Legacy spelling of [`PROCESS_KEY`].
pub const PROCESS_KEY_LEGACY: &str = "#process";
/// Key a resolved reference id is written into.
pub const TARGET_ID_KEY: &str = "target_id";

/// One document entry: an ordered mapping of keys to values.
pub type Specification = Map<String, Value>;

/// Scalars are direct construction arguments; sequences and mappings are composite.
pub fn is_composite(value: &Value) -> bool {
    matches!(value, Value::Array(_) | Value::Object(_))
}

/// The record type named by a specification's discriminator.
pub fn record_type(spec: &Specification) -> Option<&str> {
    spec.get(TYPE_KEY).and_then(Value::as_str)
}

/// An in-document directive naming a processor to run on a value before it is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessInstruction {
    #[serde(alias = "callback")]
    pub name: String,
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependency: Option<String>,
}

impl ProcessInstruction {
    pub fn new(name: impl Into<String>, args: Vec<Value>) -> Self {
        ProcessInstruction {
            name: name.into(),
            args,
            dependency: None,
        }
    }

    /// Removes the instruction from a mapping, returning it if one was present.
    ///
    /// Both [`PROCESS_KEY`] and [`PROCESS_KEY_LEGACY`] are recognized; a mapping carrying both
    /// is rejected since only one instruction may apply to a value.
    pub fn take(map: &mut Map<String, Value>) -> Result<Option<ProcessInstruction>, SeedError> {
        let current = map.shift_remove(PROCESS_KEY);
        let legacy = map.shift_remove(PROCESS_KEY_LEGACY);
        let raw = match (current, legacy) {
            (Some(_), Some(_)) => {
                return Err(SeedError::ConfigValue(format!(
                    "A value may carry only one process instruction ('{PROCESS_KEY}' and \
                     '{PROCESS_KEY_LEGACY}' both present)"
                )))
            }
            (Some(raw), None) | (None, Some(raw)) => raw,
            (None, None) => return Ok(None),
        };
        serde_json::from_value::<ProcessInstruction>(raw)
            .map(Some)
            .map_err(|e| SeedError::ConfigValue(format!("Malformed process instruction: {e}")))
    }
}

/// Every value handed to the field populator is exactly one of these.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// A string, number, boolean or null.
    Scalar(Value),
    /// A nested mapping with its own `type`; built as a record of its own.
    Reference {
        record_type: String,
        spec: Specification,
    },
    /// A value that must be run through a processor first. `value` is what remains once the
    /// instruction has been lifted out.
    Process {
        instruction: ProcessInstruction,
        value: Value,
    },
    /// Any other sequence or mapping, stored as given.
    Composite(Value),
}

impl FieldValue {
    pub fn from_value(value: Value) -> Result<FieldValue, SeedError> {
        match value {
            Value::Object(mut map) => {
                if let Some(instruction) = ProcessInstruction::take(&mut map)? {
                    return Ok(FieldValue::Process {
                        instruction,
                        value: Value::Object(map),
                    });
                }
                match map.get(TYPE_KEY) {
                    Some(Value::String(record_type)) => Ok(FieldValue::Reference {
                        record_type: record_type.clone(),
                        spec: map,
                    }),
                    _ => Ok(FieldValue::Composite(Value::Object(map))),
                }
            }
            Value::Array(_) => Ok(FieldValue::Composite(value)),
            scalar => Ok(FieldValue::Scalar(scalar)),
        }
    }
}

/// Field data may be written as a single value or as a sequence of values.
pub fn field_items(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        single => vec![single],
    }
}
