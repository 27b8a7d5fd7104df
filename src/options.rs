//! Per-run options resolved from command-line arguments and configuration.

use std::path::PathBuf;

use tabfuse_cli::{Args, SourceFormat};

use crate::config::AppConfig;
use crate::error::{EngineError, Result};
use crate::pivot::{Aggregation, PivotSpec};
use crate::session::FilterInput;
use crate::source::{list_folder, SourceDescriptor};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSelection {
    Paths(Vec<PathBuf>),
    Folder(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterArg {
    pub column: String,
    pub expression: String,
}

impl FilterArg {
    /// `--filter COLUMN EXPR` arrives as a two-element list.
    fn from_pair(values: &[String]) -> Option<Self> {
        match values {
            [column, expression] => Some(Self {
                column: column.clone(),
                expression: expression.clone(),
            }),
            _ => None,
        }
    }

    pub fn as_input(&self) -> FilterInput<'_> {
        (self.column.as_str(), self.expression.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub input: InputSelection,
    pub format: Option<SourceFormat>,
    pub columns: Vec<String>,
    pub filter: Option<FilterArg>,
    pub pivot: Option<PivotSpec>,
    pub pivot_filter: Option<FilterArg>,
    pub export_preview: Option<PathBuf>,
    pub export_pivot: Option<PathBuf>,
}

impl RunOptions {
    /// CLI values win; `--agg` falls back to `pivot.default_aggregation`.
    pub fn from_args_and_config(args: &Args, config: &AppConfig) -> Result<Self> {
        let input = match &args.dir {
            Some(dir) => InputSelection::Folder(dir.clone()),
            None => InputSelection::Paths(args.paths.clone()),
        };

        let pivot = if args.rows.is_empty() && args.values.is_empty() {
            None
        } else {
            let aggregation = args
                .agg
                .map(Aggregation::from)
                .unwrap_or(config.pivot.default_aggregation);
            let mut spec = PivotSpec::uniform(args.rows.clone(), args.values.clone(), aggregation);
            for entry in &args.agg_for {
                let (column, function) = parse_agg_for(entry)?;
                if !spec.values.iter().any(|v| v.column == column) {
                    return Err(EngineError::PivotConstruction(format!(
                        "--agg-for names '{}', which is not a --values column",
                        column
                    )));
                }
                spec = spec.with_aggregation(column, function);
            }
            Some(spec)
        };

        Ok(Self {
            input,
            format: args.format,
            columns: args.columns.clone(),
            filter: FilterArg::from_pair(&args.filter),
            pivot,
            pivot_filter: FilterArg::from_pair(&args.pivot_filter),
            export_preview: args.export_preview.clone(),
            export_pivot: args.export_pivot.clone(),
        })
    }

    /// Source descriptors for the selected input. A missing folder is `PathNotFound`.
    pub fn sources(&self, config: &AppConfig) -> Result<Vec<SourceDescriptor>> {
        let sources = match &self.input {
            InputSelection::Paths(paths) => paths
                .iter()
                .map(|p| SourceDescriptor::from_path(p.clone()))
                .collect(),
            InputSelection::Folder(dir) => list_folder(dir, &config.file_loading.extensions)?,
        };
        Ok(match self.format {
            Some(format) => sources.into_iter().map(|s| s.with_format(format)).collect(),
            None => sources,
        })
    }
}

/// Apply the flags that override configuration values.
pub fn apply_overrides(config: &mut AppConfig, args: &Args) {
    if let Some(rows) = args.preview_rows {
        config.display.preview_rows = rows;
    }
    if let Some(lines) = args.sniff_lines {
        config.file_loading.sniff_sample_lines = lines;
    }
}

/// `amount=mean` into its column and function.
fn parse_agg_for(entry: &str) -> Result<(&str, Aggregation)> {
    let (column, function) = entry.split_once('=').ok_or_else(|| {
        EngineError::PivotConstruction(format!("expected COLUMN=FUNCTION, got '{}'", entry))
    })?;
    Ok((column.trim(), function.parse()?))
}
