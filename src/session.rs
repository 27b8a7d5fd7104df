//! Session context: owns the loaded base table and derives views from it.
//!
//! Loading runs ingest, merge and row-id assignment as one step. A new load replaces
//! the previous base table; a failed load leaves no base table behind.

use std::path::Path;

use tracing::{info, warn};

use crate::config::AppConfig;
use crate::error::{EngineError, Result};
use crate::filter::{filter_table, FilterOutcome};
use crate::ingest::{ingest_all, IngestOptions, IngestReport};
use crate::merge::merge_tables;
use crate::pivot::{pivot, Aggregation, PivotSpec};
use crate::row_id::{assign_row_ids, BaseTable};
use crate::source::{list_folder, SourceDescriptor};
use crate::table::TypedTable;

/// A column name and the raw filter text typed for it.
pub type FilterInput<'a> = (&'a str, &'a str);

#[derive(Debug, Clone, Default)]
pub struct Session {
    config: AppConfig,
    reports: Vec<IngestReport>,
    base: Option<BaseTable>,
}

impl Session {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            reports: Vec::new(),
            base: None,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Per-file results of the last load, in input order.
    pub fn reports(&self) -> &[IngestReport] {
        &self.reports
    }

    pub fn base(&self) -> Option<&BaseTable> {
        self.base.as_ref()
    }

    /// Join key columns of the current base table, sorted by name.
    pub fn common_columns(&self) -> &[String] {
        self.base
            .as_ref()
            .map(BaseTable::common_columns)
            .unwrap_or(&[])
    }

    /// Ingest, merge and number the rows of `sources`.
    ///
    /// Files that cannot be read are skipped and show up in [`reports`](Self::reports).
    /// Empty files load but take no part in the join. Fails with `NoDataset` when no
    /// file has columns and `NoCommonColumns` when the readable files share no column.
    pub fn load(&mut self, sources: &[SourceDescriptor]) -> Result<&BaseTable> {
        self.base = None;
        let options = IngestOptions::from_config(&self.config);
        let (tables, reports) = ingest_all(sources, &options);
        self.reports = reports;

        if tables.is_empty() {
            warn!(sources = sources.len(), "No readable input files");
            return Err(EngineError::NoDataset);
        }
        // A file without a header has no column names to join on.
        let (tables, headerless): (Vec<_>, Vec<_>) =
            tables.into_iter().partition(|t| t.table.width() > 0);
        for t in &headerless {
            info!(file = %t.name, "File has no header; not joined");
        }
        if tables.is_empty() {
            return Err(EngineError::NoDataset);
        }
        let merged = merge_tables(tables.into_iter().map(|t| t.table).collect())?;
        let base = assign_row_ids(merged)?;
        info!(
            rows = base.table().height(),
            columns = base.table().width(),
            keys = ?base.common_columns(),
            "Dataset ready"
        );
        Ok(&*self.base.insert(base))
    }

    /// [`load`](Self::load) every file in `dir` with a configured extension.
    pub fn load_folder(&mut self, dir: &Path) -> Result<&BaseTable> {
        let sources = list_folder(dir, &self.config.file_loading.extensions)?;
        info!(dir = %dir.display(), files = sources.len(), "Listed folder");
        self.load(&sources)
    }

    fn require_base(&self) -> Result<&BaseTable> {
        self.base.as_ref().ok_or(EngineError::NoDataset)
    }

    /// The base table filtered by `filter` (if any), restricted to `columns` (all
    /// when empty). The filter column does not have to be among `columns`.
    pub fn view(&self, columns: &[String], filter: Option<FilterInput<'_>>) -> Result<FilterOutcome> {
        let base = self.require_base()?.table();
        let mut outcome = match filter {
            Some((column, raw)) => filter_table(base, column, raw)?,
            None => FilterOutcome {
                table: base.clone(),
                warning: None,
            },
        };
        if !columns.is_empty() {
            outcome.table = outcome.table.select(columns)?;
        }
        Ok(outcome)
    }

    /// First `display.preview_rows` rows of `table`.
    pub fn preview(&self, table: &TypedTable) -> TypedTable {
        table.head(self.config.display.preview_rows)
    }

    /// Pivot spec using the configured default aggregation for every value column.
    pub fn default_pivot_spec(&self, index: Vec<String>, values: Vec<String>) -> PivotSpec {
        let aggregation: Aggregation = self.config.pivot.default_aggregation;
        PivotSpec::uniform(index, values, aggregation)
    }

    /// Pivot the base table, optionally filtered first. An invalid numeric filter is
    /// ignored and returned as the outcome's warning.
    pub fn pivot(&self, filter: Option<FilterInput<'_>>, spec: &PivotSpec) -> Result<FilterOutcome> {
        let filtered = self.view(&[], filter)?;
        let table = pivot(&filtered.table, spec)?;
        Ok(FilterOutcome {
            table,
            warning: filtered.warning,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn views_require_a_dataset() {
        let session = Session::new(AppConfig::default());
        assert!(matches!(session.view(&[], None), Err(EngineError::NoDataset)));
        assert!(session.common_columns().is_empty());
    }

    #[test]
    fn failed_load_clears_previous_base() {
        let mut session = Session::new(AppConfig::default());
        session
            .load(&[SourceDescriptor::from_bytes("a.csv", b"id,v\n1,2\n".to_vec())])
            .unwrap();
        assert!(session.base().is_some());

        let err = session
            .load(&[
                SourceDescriptor::from_bytes("a.csv", b"id\n1\n".to_vec()),
                SourceDescriptor::from_bytes("b.csv", b"other\n2\n".to_vec()),
            ])
            .unwrap_err();
        assert!(matches!(err, EngineError::NoCommonColumns));
        assert!(session.base().is_none());
        assert_eq!(session.reports().len(), 2);
    }

    #[test]
    fn only_empty_files_is_no_dataset() {
        let mut session = Session::new(AppConfig::default());
        let err = session
            .load(&[SourceDescriptor::from_bytes("empty.csv", Vec::new())])
            .unwrap_err();
        assert!(matches!(err, EngineError::NoDataset));
        assert!(session.reports()[0].is_loaded());
    }
}
