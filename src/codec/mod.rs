//! Document parsing and the record build pipeline.
//!
//! This module turns source documents (YAML, JSON, TOML) into ordered record specifications and
//! drives each specification through the pipeline that materializes it in a
//! [`RecordStore`](crate::store::RecordStore).
//!
//! ## Key Components
//!
//! - [`GraphLoader`] - Top-level driver: parses a document and builds, saves and reports each item
//! - [`EntityBuilder`] - Classifies attributes, resolves or creates the base record, populates fields
//! - [`FieldPopulator`] - Cardinality-aware value assignment with update-in-place semantics
//! - [`ExistenceResolver`] - Finds an existing record by uuid, else by identifying properties
//! - [`classify`] - Partitions a specification into properties, fields and unclassified keys
//! - [`BuildContext`] - Read-only bundle threaded through the recursive build
//! - [`DocParser`] trait - Implement custom document parsers for new file formats
//! - [`CodecMap`] - Registry of available parsers (accessible via [`CODECS`])
//!
//! ## Build Order
//!
//! Items are built and saved in document order. A nested specification (a field value carrying
//! its own `type`) is built and saved before the field referencing it is assigned, and a
//! process instruction's `dependency` document is loaded in full before its processor runs, so
//! no record ever references an id the store has not assigned yet.
//!
//! ## Built-in Parsers
//!
//! - **YAML** (`.yml`, `.yaml`) - a sequence of mappings
//! - **JSON** (`.json`) - an array of objects
//! - **TOML** (`.toml`) - a top-level `records` array of tables
//!
//! Register custom parsers via [`CodecMap::insert`]:
//!
//! ```rust
//! use seedgraph::{codec::{CODECS, DocParser}, document::Specification, SeedError};
//!
//! #[derive(Default)]
//! struct LineParser;
//!
//! impl DocParser for LineParser {
//!     fn parse(&self, content: &str) -> Result<Vec<Specification>, SeedError> {
//!         Ok(content
//!             .lines()
//!             .map(|title| {
//!                 let mut spec = Specification::new();
//!                 spec.insert("type".into(), "article".into());
//!                 spec.insert("title".into(), title.into());
//!                 spec
//!             })
//!             .collect())
//!     }
//! }
//!
//! CODECS.insert("lines", LineParser);
//! ```

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;

use crate::{
    document::{record_type, Specification, TYPE_KEY},
    error::SeedError,
};

pub mod builder;
pub mod classify;
pub mod context;
pub mod existence;
pub mod loader;
pub mod populate;
pub mod schema_registry;

pub use builder::EntityBuilder;
pub use classify::{classify, ClassifiedAttributes};
pub use context::{BuildContext, ExistenceMode};
pub use existence::ExistenceResolver;
pub use loader::GraphLoader;
pub use populate::FieldPopulator;
pub use schema_registry::SchemaRegistry;

/// Global codec map with the builtin parsers (yml, yaml, json, toml)
pub static CODECS: Lazy<CodecMap> = Lazy::new(CodecMap::create);

/// Parses raw document text into an ordered sequence of record specifications.
///
/// Empty (or whitespace-only) input must yield an empty sequence rather than an error.
pub trait DocParser: Send + Sync {
    fn parse(&self, content: &str) -> Result<Vec<Specification>, SeedError>;
}

/// Checks the parsed document shape: a sequence of mappings, each with a string `type`.
fn into_specifications(parsed: Value) -> Result<Vec<Specification>, SeedError> {
    let items = match parsed {
        Value::Null => return Ok(Vec::new()),
        Value::Array(items) => items,
        other => {
            return Err(SeedError::InvalidDocument(format!(
                "Expected a sequence of records, found {}",
                type_name(&other)
            )))
        }
    };
    items
        .into_iter()
        .enumerate()
        .map(|(position, item)| match item {
            Value::Object(spec) if record_type(&spec).is_some() => Ok(spec),
            Value::Object(_) => Err(SeedError::InvalidDocument(format!(
                "Item {position} has no string '{TYPE_KEY}' discriminator"
            ))),
            other => Err(SeedError::InvalidDocument(format!(
                "Item {position} is a {}, expected a mapping",
                type_name(&other)
            ))),
        })
        .collect()
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct YamlParser;

impl DocParser for YamlParser {
    fn parse(&self, content: &str) -> Result<Vec<Specification>, SeedError> {
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        into_specifications(serde_yaml::from_str::<Value>(content)?)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonParser;

impl DocParser for JsonParser {
    fn parse(&self, content: &str) -> Result<Vec<Specification>, SeedError> {
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        let parsed = serde_json::from_str::<Value>(content)
            .map_err(|e| SeedError::Parse(format!("JSON error: {e}")))?;
        into_specifications(parsed)
    }
}

/// TOML has no top-level arrays, so records live under a `records` array of tables.
#[derive(Debug, Default, Clone, Copy)]
pub struct TomlParser;

impl DocParser for TomlParser {
    fn parse(&self, content: &str) -> Result<Vec<Specification>, SeedError> {
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        let table = toml::from_str::<toml::Table>(content)
            .map_err(|e| SeedError::Parse(format!("TOML error: {e}")))?;
        let mut parsed = serde_json::to_value(table)?;
        let records = parsed
            .as_object_mut()
            .and_then(|map| map.shift_remove("records"))
            .unwrap_or(Value::Null);
        into_specifications(records)
    }
}

// Parsers are stateless, so entries are shared rather than locked per use.
#[allow(clippy::type_complexity)]
pub struct CodecMap(Arc<RwLock<Vec<(String, Arc<dyn DocParser>)>>>);

impl Clone for CodecMap {
    fn clone(&self) -> Self {
        CodecMap(self.0.clone())
    }
}

impl CodecMap {
    pub fn create() -> Self {
        CodecMap(Arc::new(RwLock::new(vec![
            ("yml".to_string(), Arc::new(YamlParser) as Arc<dyn DocParser>),
            ("yaml".to_string(), Arc::new(YamlParser)),
            ("json".to_string(), Arc::new(JsonParser)),
            ("toml".to_string(), Arc::new(TomlParser)),
        ])))
    }

    /// Registers `parser` for `extension`, replacing any parser already registered for it.
    pub fn insert<T: DocParser + 'static>(&self, extension: &str, parser: T) {
        let mut writer = self.0.write();
        if let Some(entry) = writer.iter_mut().find(|(ext, _)| ext == extension) {
            tracing::info!("[CodecMap::insert] Replacing parser for .{}", extension);
            entry.1 = Arc::new(parser);
        } else {
            writer.push((extension.to_string(), Arc::new(parser)));
        }
    }

    pub fn get(&self, ext: &str) -> Option<Arc<dyn DocParser>> {
        self.0
            .read()
            .iter()
            .find(|(codec_ext, _value)| ext == codec_ext)
            .map(|(_codec_ext, value)| value.clone())
    }

    pub fn extensions(&self) -> Vec<String> {
        self.0
            .read()
            .iter()
            .map(|(codec_ext, _value)| codec_ext.clone())
            .collect::<Vec<String>>()
    }
}
