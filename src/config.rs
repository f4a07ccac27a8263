use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs::{read_to_string, write},
    path::{Path, PathBuf},
};

use crate::{
    codec::{
        context::ExistenceMode,
        schema_registry::{SchemaInfo, SchemaRegistry},
    },
    error::SeedError,
};

/// Directory, under the content root, payloads are written to when no public root is set.
pub const DEFAULT_PUBLIC_DIRECTORY: &str = "public";

fn default_content_root() -> PathBuf {
    PathBuf::from(".")
}

/// Import settings and record type definitions, usually read from a `seedgraph.toml`:
///
/// ```toml
/// content_root = "seed"
/// update = true
/// menu_link_types = ["page"]
///
/// [types.tag]
/// keys = ["id", "uuid", "name", "vid"]
/// required = ["name"]
///
/// [types.article]
/// keys = ["id", "uuid", "title", "status"]
/// [types.article.fields.tags]
/// cardinality = -1
/// target_type = "tag"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedConfig {
    #[serde(default = "default_content_root")]
    pub content_root: PathBuf,
    /// Where ingested payloads are written; `<content_root>/public` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_root: Option<PathBuf>,
    /// Adopt and update matching records instead of always creating new ones.
    #[serde(default)]
    pub update: bool,
    /// Record types whose items may carry a `menu` entry.
    #[serde(default)]
    pub menu_link_types: Vec<String>,
    #[serde(default)]
    pub types: BTreeMap<String, SchemaInfo>,
}

impl Default for SeedConfig {
    fn default() -> Self {
        SeedConfig {
            content_root: default_content_root(),
            public_root: None,
            update: false,
            menu_link_types: Vec::new(),
            types: BTreeMap::new(),
        }
    }
}

impl SeedConfig {
    pub fn parse(content: &str) -> Result<Self, SeedError> {
        Ok(toml::from_str(content)?)
    }

    /// Reads a config file. Relative roots are resolved against the file's directory.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SeedError> {
        let path = path.as_ref();
        tracing::debug!("Reading config from {:?}", path);
        let mut config = SeedConfig::parse(&read_to_string(path)?)?;
        if let Some(base) = path.parent() {
            if config.content_root.is_relative() {
                config.content_root = base.join(&config.content_root);
            }
            if let Some(public_root) = config.public_root.as_mut() {
                if public_root.is_relative() {
                    *public_root = base.join(&*public_root);
                }
            }
        }
        Ok(config)
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<(), SeedError> {
        write(path, toml::to_string(self)?)?;
        Ok(())
    }

    pub fn mode(&self) -> ExistenceMode {
        ExistenceMode::from(self.update)
    }

    pub fn public_root(&self) -> PathBuf {
        self.public_root
            .clone()
            .unwrap_or_else(|| self.content_root.join(DEFAULT_PUBLIC_DIRECTORY))
    }

    /// Built-in schemas plus every configured type.
    pub fn schemas(&self) -> SchemaRegistry {
        SchemaRegistry::from_definitions(&self.types)
    }
}
