//! Shared test utilities for integration tests.
//!
//! Import from integration test files as:
//! ```ignore
//! mod common;
//! ```

use seedgraph::{
    codec::GraphLoader,
    config::SeedConfig,
    store::{FsPayloadStore, MemoryStore},
    subscriber::MenuLinkSubscriber,
};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};
use tempfile::TempDir;

/// Initialize tracing for tests, respecting RUST_LOG env var.
///
/// Safe to call multiple times; later calls are no-ops.
#[allow(dead_code)]
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

fn copy_dir_all(src: &Path, dst: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            copy_dir_all(&entry.path(), &dst.join(entry.file_name()))?;
        } else {
            fs::copy(entry.path(), dst.join(entry.file_name()))?;
        }
    }
    Ok(())
}

/// Copies `tests/fixtures/seed` into a temporary directory so payload writes stay out of the
/// source tree. Returns the directory guard and the path of the copied content root.
#[allow(dead_code)]
pub fn generate_test_root() -> (TempDir, PathBuf) {
    let fixture = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/seed");
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("seed");
    copy_dir_all(&fixture, &root).unwrap();
    (temp, root)
}

/// A loader over a fresh copy of the fixture content root.
#[allow(dead_code)]
pub struct TestSeed {
    pub temp: TempDir,
    pub config: SeedConfig,
    pub store: Arc<MemoryStore>,
    pub loader: GraphLoader,
}

#[allow(dead_code)]
impl TestSeed {
    pub fn new() -> Self {
        init_logging();
        let (temp, root) = generate_test_root();
        let config = SeedConfig::from_file(root.join("seedgraph.toml")).unwrap();
        let store = Arc::new(MemoryStore::new(config.schemas()));
        let payloads = Arc::new(FsPayloadStore::new(config.public_root(), store.clone()));
        let mut loader = GraphLoader::new(&config.content_root, store.clone(), payloads);
        loader.subscribe(Arc::new(MenuLinkSubscriber::new(
            config.menu_link_types.iter().cloned(),
        )));
        TestSeed {
            temp,
            config,
            store,
            loader,
        }
    }

    pub fn write_document(&self, name: &str, content: &str) {
        fs::write(self.loader.document_path(name), content).unwrap();
    }
}
