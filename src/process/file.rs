use chrono::{DateTime, Utc};
use regex::{Captures, Regex};
use serde_json::Value;
use std::ops::RangeInclusive;

use crate::{
    codec::context::BuildContext,
    error::SeedError,
    process::{param_error, set_target_id, typed_args, FieldHandle, Processor},
    record::RecordId,
};

pub const NAME: &str = "file";

/// Source directory, under the content root, of `image` payloads.
pub const IMAGE_DIRECTORY: &str = "images";
/// Source directory, under the content root, of every other payload kind.
pub const DATA_DIRECTORY: &str = "data_files";

/// Ingests a binary payload from the content root and points the value at its `file` record.
///
/// Arguments are `[image, {filename: cat.png}]` or `[{type: image, filename: cat.png}]`. The
/// destination directory comes from the field's `file_directory` template.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileProcessor;

impl Processor for FileProcessor {
    fn arity(&self) -> RangeInclusive<usize> {
        1..=2
    }

    fn process(
        &self,
        ctx: &BuildContext<'_>,
        field: FieldHandle<'_>,
        value: &mut Value,
        args: &[Value],
    ) -> Result<Option<RecordId>, SeedError> {
        let (kind, params) = typed_args(NAME, args, None)?;
        let filename = params
            .get("filename")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                SeedError::ConfigValue(format!("'{NAME}' requires a 'filename' argument"))
            })?;
        let source_dir = if kind == "image" {
            IMAGE_DIRECTORY
        } else {
            DATA_DIRECTORY
        };
        let source = ctx.content_root.join(source_dir).join(filename);
        let bytes = ctx
            .payloads
            .read_bytes(&source)?
            .ok_or_else(|| param_error("Unable to process file content", &kind, &params))?;

        let directory = match field.definition.file_directory.as_deref() {
            Some(template) => render_directory(template, Utc::now())?,
            None => String::new(),
        };
        let record = ctx.payloads.write_blob(&directory, filename, &bytes)?;
        let id = record.id.ok_or_else(|| {
            SeedError::Storage(format!("Payload store returned unsaved {}", record.label()))
        })?;
        tracing::info!(
            "Stored {} for {}.{}",
            record.label(),
            field.record_type,
            field.name
        );
        set_target_id(value, id);
        Ok(Some(id))
    }
}

/// Expands `[date:custom:<format>]` tokens in a `file_directory` template and trims slashes.
///
/// Format letters follow the usual site-builder convention (`Y`, `m`, `d`, ...); other
/// characters are copied through.
pub fn render_directory(template: &str, now: DateTime<Utc>) -> Result<String, SeedError> {
    let token = Regex::new(r"\[date:custom:([^\]]+)\]")?;
    let rendered = token.replace_all(template.trim_matches('/'), |caps: &Captures| {
        caps[1]
            .chars()
            .map(|c| match date_format(c) {
                Some(spec) => now.format(spec).to_string(),
                None => c.to_string(),
            })
            .collect::<String>()
    });
    Ok(rendered.trim_matches('/').to_string())
}

fn date_format(letter: char) -> Option<&'static str> {
    match letter {
        'Y' => Some("%Y"),
        'y' => Some("%y"),
        'm' => Some("%m"),
        'n' => Some("%-m"),
        'd' => Some("%d"),
        'j' => Some("%-d"),
        'H' => Some("%H"),
        'i' => Some("%M"),
        's' => Some("%S"),
        'U' => Some("%s"),
        _ => None,
    }
}
