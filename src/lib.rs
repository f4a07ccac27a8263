//! # seedgraph
//!
//! A Rust library for materializing declarative seed documents into a graph of stored records.
//!
//! ## Overview
//!
//! seedgraph reads human-authored documents (YAML, JSON, TOML) that describe records, the
//! values of their fields and the references between them, and builds those records in a
//! [`RecordStore`](store::RecordStore). Along the way it resolves cross-references, ingests
//! binary payloads, and decides per record whether to create a new one or update an existing
//! one in place.
//!
//! ### Key Features
//!
//! - **Schema-driven classification**: each key is an identifying property, a field, or ignored
//! - **Create or update**: records are matched by uuid, else by their identifying properties
//! - **Cardinality-aware fields**: limits are enforced before a field is touched
//! - **Nested records**: a field value carrying its own `type` is built and saved first
//! - **Pluggable processors**: `process` instructions rewrite values before they are stored
//! - **Document dependencies**: a processor can require another document to be loaded first
//! - **Import events**: listeners observe parsing, building and saving of each record
//!
//! ## Architecture
//!
//! - **[`codec`]**: Parsers and the build pipeline (`GraphLoader`, `EntityBuilder`,
//!   `FieldPopulator`, `ExistenceResolver`, `classify`)
//! - **[`process`]**: The processor registry and the built-in `reference`, `file` and
//!   `menu_link` processors
//! - **[`store`]**: Store traits plus an in-memory record store and a filesystem payload store
//! - **[`document`]** and **[`record`]**: Specifications, field values and records
//! - **[`event`]** and **[`subscriber`]**: Import events and built-in listeners
//! - **[`config`]**: TOML configuration and record type definitions
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use seedgraph::{
//!     codec::{ExistenceMode, GraphLoader},
//!     config::SeedConfig,
//!     store::{FsPayloadStore, MemoryStore},
//! };
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SeedConfig::from_file("seedgraph.toml")?;
//!     let store = Arc::new(MemoryStore::new(config.schemas()));
//!     let payloads = Arc::new(FsPayloadStore::new(config.public_root(), store.clone()));
//!     let loader = GraphLoader::new(&config.content_root, store.clone(), payloads);
//!
//!     // Reads <content_root>/content/articles.yml
//!     for record in loader.load("articles.yml", ExistenceMode::CreateOnly)? {
//!         println!("{}", record.label());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Document Format
//!
//! ```yaml
//! - type: article
//!   title: Basic Article
//!   status: 1
//!   body:
//!     value: "<p>Lorem ipsum</p>"
//!     format: full_html
//!   tags:
//!     - process:
//!         name: reference
//!         args: [{type: tag, filter: {name: News}}]
//!   sections:
//!     - type: paragraph
//!       text: Nested records are built before the article references them.
//!   image:
//!     - alt: A cat
//!       process:
//!         name: file
//!         args: [image, {filename: cat.png}]
//! ```
//!
//! Each item needs a `type`. Scalar values (like `status` above) are construction properties
//! even when the schema declares them as fields.

pub mod codec;
pub mod config;
pub mod document;
pub mod error;
pub mod event;
pub mod process;
pub mod record;
pub mod store;
pub mod subscriber;
#[cfg(test)]
mod tests;

pub use error::*;
