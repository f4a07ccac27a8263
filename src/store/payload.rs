use serde_json::{json, Value};
use std::{
    fs::{create_dir_all, read, write},
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{
    codec::schema_registry::FILE_TYPE,
    document::Specification,
    error::SeedError,
    record::Record,
    store::{PayloadStore, RecordStore},
};

/// Scheme prefix of payload uris, resolved against the public root.
pub const PUBLIC_SCHEME: &str = "public://";

/// Writes payloads beneath a public directory and tracks each one as a `file` record.
///
/// Writing the same destination twice replaces the bytes on disk and reuses the existing record.
pub struct FsPayloadStore {
    public_root: PathBuf,
    store: Arc<dyn RecordStore>,
}

impl FsPayloadStore {
    pub fn new<P: AsRef<Path>>(public_root: P, store: Arc<dyn RecordStore>) -> Self {
        FsPayloadStore {
            public_root: public_root.as_ref().to_path_buf(),
            store,
        }
    }

    pub fn public_root(&self) -> &Path {
        &self.public_root
    }

    /// Local path of a `public://` uri.
    pub fn resolve_uri(&self, uri: &str) -> Option<PathBuf> {
        uri.strip_prefix(PUBLIC_SCHEME)
            .map(|relative| self.public_root.join(relative))
    }
}

fn public_uri(directory: &str, filename: &str) -> String {
    if directory.is_empty() {
        format!("{PUBLIC_SCHEME}{filename}")
    } else {
        format!("{PUBLIC_SCHEME}{directory}/{filename}")
    }
}

impl PayloadStore for FsPayloadStore {
    fn read_bytes(&self, path: &Path) -> Result<Option<Vec<u8>>, SeedError> {
        match read(path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write_blob(
        &self,
        directory: &str,
        filename: &str,
        bytes: &[u8],
    ) -> Result<Record, SeedError> {
        // `filename` may carry its own subdirectories
        let target = self.public_root.join(directory).join(filename);
        if let Some(parent) = target.parent() {
            create_dir_all(parent)?;
        }
        write(&target, bytes)?;

        let uri = public_uri(directory, filename);
        let existing = self
            .store
            .load_by_key(FILE_TYPE, "uri", &Value::String(uri.clone()))?;
        let mut record = match existing.into_iter().next() {
            Some(record) => record,
            None => {
                let mut properties = Specification::new();
                properties.insert("uri".to_string(), json!(uri));
                properties.insert("filename".to_string(), json!(filename));
                self.store.create(FILE_TYPE, &properties)?
            }
        };
        record.set_property("filesize", json!(bytes.len()));
        self.store.save(&mut record)?;
        tracing::debug!("Wrote {} bytes to {}", bytes.len(), uri);
        Ok(record)
    }
}
