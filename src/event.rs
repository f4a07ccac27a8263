use serde_json::Value;
use std::fmt::{Display, Formatter};

use crate::{
    codec::context::BuildContext, document::Specification, error::SeedError, record::Record,
};

/// Notifications raised while a document is imported.
///
/// Listener errors for every event except [`ImportEvent::PostImport`] abort the current
/// document. Post-import listeners run after all records are saved, so their failures are only
/// logged.
#[derive(Debug, Clone, Copy)]
pub enum ImportEvent<'e> {
    /// A document was read and parsed; nothing has been built yet.
    ContentParsed {
        document: &'e str,
        specs: &'e [Specification],
    },
    /// A record is about to be built from `spec`.
    ImportRecord {
        record_type: &'e str,
        spec: &'e Specification,
    },
    /// A field is about to be populated.
    ImportField {
        record: &'e Record,
        field: &'e str,
        values: &'e [Value],
    },
    /// A top-level record is built and about to be saved.
    RecordPreSave {
        record: &'e Record,
        spec: &'e Specification,
    },
    /// A top-level record was saved.
    RecordPostSave {
        record: &'e Record,
        spec: &'e Specification,
    },
    /// Every item of a document was built and saved.
    PostImport {
        document: &'e str,
        records: &'e [Record],
        specs: &'e [Specification],
    },
}

impl ImportEvent<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            ImportEvent::ContentParsed { .. } => "content_parsed",
            ImportEvent::ImportRecord { .. } => "import_record",
            ImportEvent::ImportField { .. } => "import_field",
            ImportEvent::RecordPreSave { .. } => "record_pre_save",
            ImportEvent::RecordPostSave { .. } => "record_post_save",
            ImportEvent::PostImport { .. } => "post_import",
        }
    }
}

impl Display for ImportEvent<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            ImportEvent::ContentParsed { document, specs } => {
                write!(f, "{}({document}, {} items)", self.name(), specs.len())
            }
            ImportEvent::ImportRecord { record_type, .. } => {
                write!(f, "{}({record_type})", self.name())
            }
            ImportEvent::ImportField { record, field, values } => write!(
                f,
                "{}({}.{field}, {} values)",
                self.name(),
                record.record_type,
                values.len()
            ),
            ImportEvent::RecordPreSave { record, .. }
            | ImportEvent::RecordPostSave { record, .. } => {
                write!(f, "{}({})", self.name(), record.label())
            }
            ImportEvent::PostImport {
                document, records, ..
            } => write!(f, "{}({document}, {} records)", self.name(), records.len()),
        }
    }
}

/// Receives [`ImportEvent`]s from a [`GraphLoader`](crate::codec::GraphLoader).
///
/// The context lets listeners build further records in the same mode and store as the import
/// that raised the event.
pub trait ImportListener: Send + Sync {
    fn on_event(&self, event: &ImportEvent<'_>, ctx: &BuildContext<'_>) -> Result<(), SeedError>;
}
