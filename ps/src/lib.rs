//! PromptStore - local catalog of reusable prompt templates
//!
//! Templates are kept in one JSON file that is loaded whole, edited in memory
//! and written back whole. Every save snapshots the store first, so the
//! `versions/` directory is a full history of the catalog.
//!
//! # Architecture
//!
//! ```text
//! {data_dir}/
//! ├── prompts.json                     # current state
//! ├── versions/
//! │   ├── prompts-20240501-120000.json # one snapshot per save
//! │   └── ...
//! └── imports/
//!     └── import-1714564800.csv        # verbatim imported payloads
//! ```
//!
//! # Concurrency
//!
//! There is no locking. Two processes saving against the same data directory
//! will silently clobber each other (last full write wins). This is meant for a
//! single local user; do not put it behind a multi-writer service as is.
//!
//! # Example
//!
//! ```ignore
//! use promptstore::{PayloadFormat, StoreRepository, import_payload};
//!
//! let repo = StoreRepository::open("data");
//! let mut store = repo.load()?;
//! let report = import_payload(&repo, &mut store, &std::fs::read("prompts.csv")?, PayloadFormat::Csv)?;
//! println!("{}", report);
//! ```

pub mod builder;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod import;
pub mod placeholder;
pub mod repository;
pub mod template;

pub use builder::{build_template, optimize_prompt_text, parse_tags, parse_variables};
pub use catalog::{Filter, RenderedPrompt, Saved, render_template, sync_variables};
pub use error::{Result, StoreError};
pub use import::{
    ImportReport, PayloadFormat, export_store, export_template, import_payload, merge_templates, parse_payload,
};
pub use placeholder::{extract_placeholders, render_with_vars, token_estimate};
pub use repository::{SnapshotInfo, StoreRepository};
pub use template::{Safety, Store, StoreMeta, Template, TemplateStatus, Variable, slugify};
