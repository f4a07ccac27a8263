use std::{
    fs::read_to_string,
    path::{Path, PathBuf},
    sync::Arc,
};
use walkdir::WalkDir;

use crate::{
    codec::{
        context::{BuildContext, ExistenceMode},
        CodecMap, CODECS,
    },
    document::{record_type, Specification},
    error::SeedError,
    event::{ImportEvent, ImportListener},
    process::ProcessorRegistry,
    record::Record,
    store::{PayloadStore, RecordStore},
};

/// Directory, under the content root, that document paths are resolved against.
pub const CONTENT_DIRECTORY: &str = "content";
/// Parser used for documents without a registered extension.
pub const DEFAULT_EXTENSION: &str = "yml";

/// Top-level driver of a document import.
///
/// ## Overview
///
/// A loader owns the collaborators of an import: the record store, the payload store, the
/// processor registry, the parser map and any subscribed [`ImportListener`]s. Loading a
/// document:
///
/// 1. Reads `<content root>/content/<document>` and parses it with the parser registered for its
///    extension. Empty documents parse to zero items.
/// 2. Builds every item in document order with the
///    [`EntityBuilder`](super::EntityBuilder), emits [`ImportEvent::RecordPreSave`], saves the
///    record and emits [`ImportEvent::RecordPostSave`].
/// 3. Emits [`ImportEvent::PostImport`] with the saved records and the parsed items.
///
/// The first failing item aborts the rest of the document. Records saved before it stay
/// saved, and the failure is reported as [`SeedError::Import`] naming the item's position and
/// type.
///
/// ## Dependencies
///
/// A process instruction may declare a `dependency` document. That document is loaded in full,
/// in the same mode and against the same store, before the instruction's processor runs. The
/// chain of documents being loaded is tracked by the [`BuildContext`], and a document that
/// depends on itself, directly or through others, fails with [`SeedError::DependencyCycle`].
pub struct GraphLoader {
    content_root: PathBuf,
    store: Arc<dyn RecordStore>,
    payloads: Arc<dyn PayloadStore>,
    processors: ProcessorRegistry,
    codecs: CodecMap,
    listeners: Vec<Arc<dyn ImportListener>>,
}

impl GraphLoader {
    pub fn new<P: AsRef<Path>>(
        content_root: P,
        store: Arc<dyn RecordStore>,
        payloads: Arc<dyn PayloadStore>,
    ) -> Self {
        GraphLoader {
            content_root: content_root.as_ref().to_path_buf(),
            store,
            payloads,
            processors: ProcessorRegistry::create(),
            codecs: CODECS.clone(),
            listeners: Vec::new(),
        }
    }

    pub fn with_processors(mut self, processors: ProcessorRegistry) -> Self {
        self.processors = processors;
        self
    }

    pub fn with_codecs(mut self, codecs: CodecMap) -> Self {
        self.codecs = codecs;
        self
    }

    /// Adds a listener. Listeners are notified in subscription order.
    pub fn subscribe(&mut self, listener: Arc<dyn ImportListener>) {
        self.listeners.push(listener);
    }

    pub fn content_root(&self) -> &Path {
        &self.content_root
    }

    pub fn store(&self) -> &dyn RecordStore {
        self.store.as_ref()
    }

    pub fn payloads(&self) -> &dyn PayloadStore {
        self.payloads.as_ref()
    }

    pub fn processors(&self) -> &ProcessorRegistry {
        &self.processors
    }

    pub fn context(&self, mode: ExistenceMode) -> BuildContext<'_> {
        BuildContext::new(self, mode)
    }

    /// Loads `document` (relative to the content directory) and returns its saved records in
    /// document order.
    pub fn load(&self, document: &str, mode: ExistenceMode) -> Result<Vec<Record>, SeedError> {
        let ctx = self.context(mode).descend(document)?;
        self.load_in(&ctx, document)
    }

    /// Path of a document on disk.
    pub fn document_path(&self, document: &str) -> PathBuf {
        self.content_root.join(CONTENT_DIRECTORY).join(document)
    }

    /// Every document under the content directory with a registered extension, as paths
    /// relative to it, sorted.
    pub fn list_documents(&self) -> Result<Vec<String>, SeedError> {
        let content_dir = self.content_root.join(CONTENT_DIRECTORY);
        let extensions = self.codecs.extensions();
        let mut documents = Vec::new();
        for entry in WalkDir::new(&content_dir).sort_by_file_name() {
            let entry = entry.map_err(|e| SeedError::Io(format!("{e}")))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let registered = entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| extensions.iter().any(|known| known == ext));
            if registered {
                let relative = entry.path().strip_prefix(&content_dir)?;
                documents.push(relative.to_string_lossy().replace('\\', "/"));
            }
        }
        Ok(documents)
    }

    /// Reads and parses a document without building anything.
    pub fn parse_document(&self, document: &str) -> Result<Vec<Specification>, SeedError> {
        let path = self.document_path(document);
        let content = read_to_string(&path).map_err(|e| match SeedError::from(e) {
            SeedError::NotFound(_) => SeedError::NotFound(format!("Document {path:?}")),
            other => other,
        })?;
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| self.codecs.get(ext).is_some())
            .unwrap_or(DEFAULT_EXTENSION);
        let parser = self.codecs.get(extension).ok_or_else(|| {
            SeedError::ConfigValue(format!("No parser registered for .{extension}"))
        })?;
        let specs = parser.parse(&content)?;
        if specs.is_empty() {
            tracing::warn!("{} holds no records", document);
        }
        Ok(specs)
    }

    /// Loads a document inside an existing context, whose ancestry already names `document`.
    pub(crate) fn load_in(
        &self,
        ctx: &BuildContext<'_>,
        document: &str,
    ) -> Result<Vec<Record>, SeedError> {
        let specs = self.parse_document(document)?;
        ctx.emit(&ImportEvent::ContentParsed {
            document,
            specs: &specs,
        })?;
        tracing::debug!("Parsed {} items from {}", specs.len(), document);

        let mut records = Vec::with_capacity(specs.len());
        for (position, spec) in specs.iter().enumerate() {
            let item_type = record_type(spec).unwrap_or_default();
            let record = self
                .import_item(ctx, item_type, spec)
                .map_err(|source| SeedError::Import {
                    document: document.to_string(),
                    position,
                    record_type: item_type.to_string(),
                    source: Box::new(source),
                })?;
            records.push(record);
        }

        if let Err(e) = ctx.emit(&ImportEvent::PostImport {
            document,
            records: &records,
            specs: &specs,
        }) {
            tracing::warn!("Post-import processing of {} failed: {}", document, e);
        }
        tracing::info!("Loaded {} records from {}", records.len(), document);
        Ok(records)
    }

    fn import_item(
        &self,
        ctx: &BuildContext<'_>,
        item_type: &str,
        spec: &Specification,
    ) -> Result<Record, SeedError> {
        let mut record = ctx.build(item_type, spec)?;
        ctx.emit(&ImportEvent::RecordPreSave {
            record: &record,
            spec,
        })?;
        self.store.save(&mut record)?;
        tracing::info!("Saved {}", record.label());
        ctx.emit(&ImportEvent::RecordPostSave {
            record: &record,
            spec,
        })?;
        Ok(record)
    }

    /// Notifies every listener. The first listener error stops delivery and is returned.
    pub(crate) fn dispatch(
        &self,
        event: &ImportEvent<'_>,
        ctx: &BuildContext<'_>,
    ) -> Result<(), SeedError> {
        for listener in self.listeners.iter() {
            listener.on_event(event, ctx)?;
        }
        Ok(())
    }
}
