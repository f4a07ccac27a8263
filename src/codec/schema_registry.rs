// Schema registry for record type definitions
//
// This module provides a registry for the per-type metadata the classifier, existence resolver
// and field populator consult: identifying keys, field cardinalities and field settings.
// Schemas can be registered at runtime or loaded from a TOML configuration file.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::Arc,
};

use crate::error::SeedError;

/// Record type holding ingested binary payloads.
pub const FILE_TYPE: &str = "file";
/// Record type holding menu links.
pub const MENU_LINK_TYPE: &str = "menu_link";

/// Maximum number of values a field accepts.
///
/// Configuration files spell "unlimited" as `-1`; `0` deserializes to `Limited(0)`, which the
/// field populator rejects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum Cardinality {
    Unlimited,
    Limited(u32),
}

impl Default for Cardinality {
    fn default() -> Self {
        Cardinality::Limited(1)
    }
}

impl From<i64> for Cardinality {
    fn from(raw: i64) -> Self {
        if raw < 0 {
            Cardinality::Unlimited
        } else {
            Cardinality::Limited(u32::try_from(raw).unwrap_or(u32::MAX))
        }
    }
}

impl From<Cardinality> for i64 {
    fn from(cardinality: Cardinality) -> Self {
        match cardinality {
            Cardinality::Unlimited => -1,
            Cardinality::Limited(n) => n as i64,
        }
    }
}

impl Cardinality {
    pub fn is_single(&self) -> bool {
        matches!(self, Cardinality::Limited(1))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    #[serde(default)]
    pub cardinality: Cardinality,
    /// Record type referenced by the field's values, if it is a reference field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_type: Option<String>,
    /// Destination directory template for ingested payloads, e.g. `[date:custom:Y]-[date:custom:m]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_directory: Option<String>,
}

impl FieldDefinition {
    pub fn new(cardinality: Cardinality) -> Self {
        FieldDefinition {
            cardinality,
            ..Default::default()
        }
    }

    pub fn referencing(cardinality: Cardinality, target_type: &str) -> Self {
        FieldDefinition {
            cardinality,
            target_type: Some(target_type.to_string()),
            ..Default::default()
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaInfo {
    /// Identifying property keys.
    #[serde(default)]
    pub keys: BTreeSet<String>,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldDefinition>,
    /// Exempt types are never matched against existing records and, when referenced from a
    /// field, are deleted along with the reference on update.
    #[serde(default)]
    pub exempt: bool,
    #[serde(default = "default_true")]
    pub fieldable: bool,
    /// Properties that must be present for a record of this type to be saved.
    #[serde(default)]
    pub required: BTreeSet<String>,
    /// Property carrying the bundle (subtype) tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle_key: Option<String>,
}

impl Default for SchemaInfo {
    fn default() -> Self {
        SchemaInfo {
            keys: BTreeSet::default(),
            fields: BTreeMap::default(),
            exempt: false,
            fieldable: true,
            required: BTreeSet::default(),
            bundle_key: None,
        }
    }
}

impl SchemaInfo {
    pub fn with_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SchemaInfo {
            keys: keys.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn field(mut self, name: &str, definition: FieldDefinition) -> Self {
        self.fields.insert(name.to_string(), definition);
        self
    }

    pub fn exempt(mut self) -> Self {
        self.exempt = true;
        self
    }

    pub fn require(mut self, key: &str) -> Self {
        self.required.insert(key.to_string());
        self
    }

    pub fn bundle_key(mut self, key: &str) -> Self {
        self.bundle_key = Some(key.to_string());
        self
    }

    pub fn is_key(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn is_field(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }
}

/// Thread-safe registry for record type schemas
///
/// Pattern matches [`CodecMap`](super::CodecMap) for consistency.
pub struct SchemaRegistry(Arc<RwLock<HashMap<String, Arc<SchemaInfo>>>>);

impl std::fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SchemaRegistry")
            .field(&self.list_schemas())
            .finish()
    }
}

impl Clone for SchemaRegistry {
    fn clone(&self) -> Self {
        SchemaRegistry(self.0.clone())
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        SchemaRegistry::create()
    }
}

impl SchemaRegistry {
    /// Create registry with the built-in payload and menu link schemas
    pub fn create() -> Self {
        let registry = SchemaRegistry(Arc::new(RwLock::new(HashMap::new())));

        let mut file = SchemaInfo::with_keys(["id", "uuid", "uri", "filename", "filesize"]).exempt();
        file.fieldable = false;
        registry.register(FILE_TYPE, file.require("uri"));

        registry.register(
            MENU_LINK_TYPE,
            SchemaInfo::with_keys([
                "id",
                "uuid",
                "menu_name",
                "title",
                "description",
                "weight",
                "link",
                "parent",
                "langcode",
            ])
            .require("title"),
        );

        registry
    }

    /// Builds a registry from configured type definitions on top of the built-in schemas.
    pub fn from_definitions(types: &BTreeMap<String, SchemaInfo>) -> Self {
        let registry = SchemaRegistry::create();
        for (name, info) in types.iter() {
            registry.register(name, info.clone());
        }
        registry
    }

    /// Register a schema definition
    ///
    /// If a schema with this name already exists, it will be overwritten and a log message emitted.
    pub fn register(&self, record_type: &str, info: SchemaInfo) {
        let mut writer = self.0.write();

        if writer.contains_key(record_type) {
            tracing::info!(
                "[SchemaRegistry::register] Overwriting existing schema: {}",
                record_type
            );
        }

        writer.insert(record_type.to_string(), Arc::new(info));
    }

    /// Retrieve a schema definition by name
    pub fn get(&self, record_type: &str) -> Option<Arc<SchemaInfo>> {
        self.0.read().get(record_type).cloned()
    }

    /// Like [`SchemaRegistry::get`], failing with [`SeedError::UnknownType`].
    pub fn require(&self, record_type: &str) -> Result<Arc<SchemaInfo>, SeedError> {
        self.get(record_type)
            .ok_or_else(|| SeedError::UnknownType(record_type.to_string()))
    }

    /// List all registered record type names, sorted
    pub fn list_schemas(&self) -> Vec<String> {
        let mut names = self.0.read().keys().cloned().collect::<Vec<String>>();
        names.sort();
        names
    }
}
