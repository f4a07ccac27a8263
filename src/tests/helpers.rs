//! Shared fixtures for in-crate pipeline tests

use serde_json::Value;
use std::{fs, path::PathBuf, sync::Arc};
use tempfile::{tempdir, TempDir};

use crate::{
    codec::{
        schema_registry::{Cardinality, FieldDefinition, SchemaInfo, SchemaRegistry, FILE_TYPE},
        GraphLoader,
    },
    document::Specification,
    store::{FsPayloadStore, MemoryStore},
};

/// Initialize logging for tests
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

/// Record types used across the pipeline tests
pub fn test_schemas() -> SchemaRegistry {
    let schemas = SchemaRegistry::create();
    schemas.register(
        "tag",
        SchemaInfo::with_keys(["id", "uuid", "name", "vid"]).require("name"),
    );
    schemas.register(
        "paragraph",
        SchemaInfo::with_keys(["id", "uuid", "kind"])
            .field("text", FieldDefinition::new(Cardinality::Limited(1)))
            .exempt(),
    );
    let mut image = FieldDefinition::referencing(Cardinality::Limited(1), FILE_TYPE);
    image.file_directory = Some("[date:custom:Y]-[date:custom:m]".to_string());
    schemas.register(
        "article",
        SchemaInfo::with_keys(["id", "uuid", "title", "status", "langcode"])
            .require("title")
            .field("body", FieldDefinition::new(Cardinality::Limited(1)))
            .field("summary", FieldDefinition::new(Cardinality::Limited(2)))
            .field("broken", FieldDefinition::new(Cardinality::Limited(0)))
            .field(
                "tags",
                FieldDefinition::referencing(Cardinality::Unlimited, "tag"),
            )
            .field(
                "sections",
                FieldDefinition::referencing(Cardinality::Unlimited, "paragraph"),
            )
            .field("image", image)
            .field(
                "attachments",
                FieldDefinition::referencing(Cardinality::Unlimited, FILE_TYPE),
            ),
    );
    schemas.register(
        "user",
        SchemaInfo::with_keys(["id", "uuid", "name", "mail"]).require("name"),
    );
    schemas
}

/// A content root in a temporary directory with a memory store and loader over it
pub struct Fixture {
    pub dir: TempDir,
    pub store: Arc<MemoryStore>,
    pub loader: GraphLoader,
}

impl Fixture {
    pub fn new() -> Self {
        init_logging();
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("content")).unwrap();
        let store = Arc::new(MemoryStore::new(test_schemas()));
        let payloads = Arc::new(FsPayloadStore::new(
            dir.path().join("public"),
            store.clone(),
        ));
        let loader = GraphLoader::new(dir.path(), store.clone(), payloads);
        Fixture { dir, store, loader }
    }

    pub fn write_document(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join("content").join(name);
        fs::write(&path, content).unwrap();
        path
    }

    pub fn write_payload(&self, directory: &str, name: &str, bytes: &[u8]) {
        let dir = self.dir.path().join(directory);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(name), bytes).unwrap();
    }
}

pub fn spec(value: Value) -> Specification {
    value.as_object().cloned().unwrap()
}
