use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{
    codec::{builder::EntityBuilder, loader::GraphLoader},
    document::Specification,
    error::SeedError,
    event::ImportEvent,
    process::ProcessorRegistry,
    record::Record,
    store::{PayloadStore, RecordStore},
};

/// Whether a build may adopt records that already exist in the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExistenceMode {
    /// Every specification creates a new record.
    #[default]
    CreateOnly,
    /// Matching records are adopted and their fields replaced in place.
    CheckAndUpdate,
}

impl From<bool> for ExistenceMode {
    fn from(update: bool) -> Self {
        if update {
            ExistenceMode::CheckAndUpdate
        } else {
            ExistenceMode::CreateOnly
        }
    }
}

/// Read-only state shared by every step of a recursive build.
///
/// Contexts are created by [`GraphLoader::context`] and only ever cloned downward: loading a
/// dependency document runs in a [`BuildContext::descend`]ed copy that records the chain of
/// documents being loaded, which is how circular dependency declarations are detected.
#[derive(Clone)]
pub struct BuildContext<'a> {
    pub mode: ExistenceMode,
    pub content_root: &'a Path,
    pub processors: &'a ProcessorRegistry,
    pub store: &'a dyn RecordStore,
    pub payloads: &'a dyn PayloadStore,
    loader: &'a GraphLoader,
    ancestry: Vec<String>,
}

impl<'a> BuildContext<'a> {
    pub(crate) fn new(loader: &'a GraphLoader, mode: ExistenceMode) -> Self {
        BuildContext {
            mode,
            content_root: loader.content_root(),
            processors: loader.processors(),
            store: loader.store(),
            payloads: loader.payloads(),
            loader,
            ancestry: Vec::new(),
        }
    }

    pub fn is_update(&self) -> bool {
        self.mode == ExistenceMode::CheckAndUpdate
    }

    /// The document currently being loaded, if any.
    pub fn document(&self) -> Option<&str> {
        self.ancestry.last().map(String::as_str)
    }

    /// Documents being loaded, outermost first.
    pub fn ancestry(&self) -> &[String] {
        &self.ancestry
    }

    /// A child context for loading `document`. Fails with [`SeedError::DependencyCycle`] when
    /// the document is already being loaded further up the chain.
    pub fn descend(&self, document: &str) -> Result<BuildContext<'a>, SeedError> {
        if self.ancestry.iter().any(|loading| loading == document) {
            let mut chain = self.ancestry.clone();
            chain.push(document.to_string());
            return Err(SeedError::DependencyCycle(chain));
        }
        let mut child = self.clone();
        child.ancestry.push(document.to_string());
        Ok(child)
    }

    /// Loads a whole dependency document, in this context's mode, before returning.
    pub fn load_dependency(&self, document: &str) -> Result<Vec<Record>, SeedError> {
        tracing::debug!(
            "Loading dependency '{}' for '{}'",
            document,
            self.document().unwrap_or_default()
        );
        let child = self.descend(document)?;
        self.loader.load_in(&child, document)
    }

    /// Builds (without saving) a record from a specification.
    pub fn build(&self, record_type: &str, spec: &Specification) -> Result<Record, SeedError> {
        EntityBuilder::new(self).build(record_type, spec)
    }

    /// Hands an event to every subscribed listener.
    pub fn emit(&self, event: &ImportEvent<'_>) -> Result<(), SeedError> {
        self.loader.dispatch(event, self)
    }
}
