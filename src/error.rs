use std::{fmt, io, path::StripPrefixError};

use regex::Error as RegexError;
use serde::{Deserialize, Serialize};
use serde_json::Error as JsonError;
use serde_yaml::Error as YamlError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
pub enum SeedError {
    #[error("Unknown record type: {0}")]
    UnknownType(String),
    #[error("Unknown processor specified: {0}")]
    UnknownProcessor(String),
    #[error("Processor '{name}' cannot be invoked: {reason}")]
    UncallableProcessor { name: String, reason: String },
    #[error("'{field}' cannot hold any values.")]
    InvalidCardinality { field: String },
    #[error("'{field}' cannot hold more than {limit} values. {received} values were parsed from the document.")]
    CardinalityExceeded {
        field: String,
        limit: u32,
        received: usize,
    },
    #[error("Missing data: {0}")]
    MissingData(String),
    #[error("Invalid configuration value: {0}")]
    ConfigValue(String),
    #[error("Circular document dependency: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),
    #[error("Document parse error: {0}")]
    Parse(String),
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    #[error("Record validation failed: {0}")]
    Validation(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("File System error: {0}")]
    Io(String),
    #[error("Item Not Found: {0}")]
    NotFound(String),
    #[error("(De)Serialization error: {0}")]
    Serialization(String),
    #[error("Failed to import item {position} ({record_type}) of '{document}': [{}] {source}", .source.kind())]
    Import {
        document: String,
        position: usize,
        record_type: String,
        source: Box<SeedError>,
    },
}

impl SeedError {
    /// Errors that the entity builder recovers from while populating a single field. The field
    /// is left unpopulated and the build continues with the next one.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SeedError::MissingData(_) | SeedError::ConfigValue(_))
    }

    /// Stable name of the error kind, used when reporting failed imports.
    pub fn kind(&self) -> &'static str {
        match self {
            SeedError::UnknownType(_) => "UnknownType",
            SeedError::UnknownProcessor(_) => "UnknownProcessor",
            SeedError::UncallableProcessor { .. } => "UncallableProcessor",
            SeedError::InvalidCardinality { .. } => "InvalidCardinality",
            SeedError::CardinalityExceeded { .. } => "CardinalityExceeded",
            SeedError::MissingData(_) => "MissingData",
            SeedError::ConfigValue(_) => "ConfigValue",
            SeedError::DependencyCycle(_) => "DependencyCycle",
            SeedError::Parse(_) => "Parse",
            SeedError::InvalidDocument(_) => "InvalidDocument",
            SeedError::Validation(_) => "Validation",
            SeedError::Storage(_) => "Storage",
            SeedError::Io(_) => "Io",
            SeedError::NotFound(_) => "NotFound",
            SeedError::Serialization(_) => "Serialization",
            SeedError::Import { .. } => "Import",
        }
    }

    /// The innermost error, looking through import wrappers added by nested document loads.
    pub fn root_cause(&self) -> &SeedError {
        match self {
            SeedError::Import { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

impl From<StripPrefixError> for SeedError {
    fn from(src: StripPrefixError) -> SeedError {
        SeedError::NotFound(format!("Strip prefix failed for path. Error: {src}"))
    }
}

impl From<toml::de::Error> for SeedError {
    fn from(src: toml::de::Error) -> SeedError {
        SeedError::Serialization(format!("Toml deserialization error: {src}"))
    }
}

impl From<toml::ser::Error> for SeedError {
    fn from(src: toml::ser::Error) -> SeedError {
        SeedError::Serialization(format!("Toml serialization error: {src}"))
    }
}

impl From<JsonError> for SeedError {
    fn from(src: JsonError) -> SeedError {
        SeedError::Serialization(format!("JSON (de)serialization error: {src}"))
    }
}

impl From<YamlError> for SeedError {
    fn from(src: YamlError) -> SeedError {
        SeedError::Parse(format!("YAML error: {src}"))
    }
}

impl From<uuid::Error> for SeedError {
    fn from(src: uuid::Error) -> SeedError {
        SeedError::Serialization(format!("UUID conversion failed: {src}"))
    }
}

impl From<io::Error> for SeedError {
    fn from(x: io::Error) -> Self {
        match x.kind() {
            io::ErrorKind::NotFound => SeedError::NotFound(format!("{x}")),
            _ => SeedError::Io(format!("IOError: {}", x.kind())),
        }
    }
}

impl From<fmt::Error> for SeedError {
    fn from(x: fmt::Error) -> Self {
        SeedError::Serialization(format!("{x}"))
    }
}

impl From<RegexError> for SeedError {
    fn from(x: RegexError) -> Self {
        SeedError::ConfigValue(format!("Regex parse failed: {x}"))
    }
}
