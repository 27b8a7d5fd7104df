//! Merge CSV and Excel files on their shared columns, then filter and pivot the result.
//!
//! The pipeline is: sources → [`ingest`] → [`merge`] → [`row_id`] → [`filter`] →
//! [`pivot`] → [`export`]. A [`Session`] owns the merged table between steps.

pub mod config;
pub mod error;
pub mod export;
pub mod filter;
pub mod ingest;
pub mod merge;
pub mod options;
pub mod pivot;
pub mod row_id;
pub mod session;
pub mod sniff;
pub mod source;
pub mod table;

pub use config::{AppConfig, ConfigManager};
pub use error::{EngineError, Result};
pub use filter::{FilterOperator, FilterOutcome, FilterSpec};
pub use ingest::{IngestReport, IngestStatus};
pub use merge::MergedDataset;
pub use options::{apply_overrides, RunOptions};
pub use pivot::{Aggregation, PivotSpec, ValueAggregation};
pub use row_id::BaseTable;
pub use session::Session;
pub use source::SourceDescriptor;
pub use table::{ColumnKind, TypedTable};
pub use tabfuse_cli::{Args, SourceFormat};

/// Application name used for the config directory
pub const APP_NAME: &str = "tabfuse";
