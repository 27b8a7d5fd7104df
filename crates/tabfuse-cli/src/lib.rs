//! Shared CLI definitions for tabfuse.
//!
//! Used by the main application and by the build script (manpage).

use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};

/// Declared format of an input source.
/// When `--format` is not specified, format is detected from the file extension.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum SourceFormat {
    /// Delimited text (comma, semicolon, tab or pipe; detected per file)
    Csv,
    /// Spreadsheet workbook (.xlsx, .xls, .xlsm, .xlsb); the first sheet is read
    Xlsx,
}

impl SourceFormat {
    /// Detect format from path extension. Returns None when extension is missing or unknown.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Parse format from extension string (e.g. "csv", "xlsx").
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "csv" | "tsv" | "txt" => Some(Self::Csv),
            "xlsx" | "xls" | "xlsm" | "xlsb" => Some(Self::Xlsx),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Xlsx => "xlsx",
        }
    }
}

/// Aggregation function applied to pivot value columns
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum AggregationArg {
    Sum,
    Mean,
    Count,
    Max,
    Min,
}

/// Command-line arguments for tabfuse
#[derive(Clone, Parser, Debug)]
#[command(
    name = "tabfuse",
    version,
    about = "Merge CSV/Excel files on shared columns, then filter and pivot",
    long_about = include_str!("../long_about.txt")
)]
pub struct Args {
    /// Path(s) to the data file(s) to merge (not required with --dir or --generate-config)
    #[arg(required_unless_present_any = ["dir", "generate_config"], value_name = "PATH")]
    pub paths: Vec<PathBuf>,

    /// Read every csv/xlsx file in this folder (sorted by file name)
    #[arg(long = "dir", value_name = "DIR", conflicts_with = "paths")]
    pub dir: Option<PathBuf>,

    /// Force the format of every input (csv or xlsx) instead of detecting it from the extension
    #[arg(long = "format", value_enum)]
    pub format: Option<SourceFormat>,

    /// Columns to show in the preview (default: all)
    #[arg(long = "columns", value_name = "COL", num_args = 1.., value_delimiter = ',')]
    pub columns: Vec<String>,

    /// Filter the preview: COLUMN EXPR. Text columns match EXPR as a case-insensitive substring;
    /// numeric columns take a comparison such as ">=10"
    #[arg(long = "filter", num_args = 2, value_names = ["COLUMN", "EXPR"])]
    pub filter: Vec<String>,

    /// Pivot row-key columns
    #[arg(long = "rows", value_name = "COL", num_args = 1.., value_delimiter = ',')]
    pub rows: Vec<String>,

    /// Pivot value columns
    #[arg(long = "values", value_name = "COL", num_args = 1.., value_delimiter = ',')]
    pub values: Vec<String>,

    /// Aggregation for every value column (default from config, normally sum)
    #[arg(long = "agg", value_enum)]
    pub agg: Option<AggregationArg>,

    /// Aggregation for one value column, e.g. --agg-for amount=mean (repeatable)
    #[arg(long = "agg-for", value_name = "COL=FN")]
    pub agg_for: Vec<String>,

    /// Filter applied before pivoting: COLUMN EXPR
    #[arg(long = "pivot-filter", num_args = 2, value_names = ["COLUMN", "EXPR"])]
    pub pivot_filter: Vec<String>,

    /// Number of rows to print in the preview (default from config, normally 20)
    #[arg(long = "preview-rows", value_name = "N")]
    pub preview_rows: Option<usize>,

    /// Write the filtered preview table as CSV to this file
    #[arg(long = "export-preview", value_name = "FILE")]
    pub export_preview: Option<PathBuf>,

    /// Write the pivot result as CSV to this file
    #[arg(long = "export-pivot", value_name = "FILE", requires = "rows")]
    pub export_pivot: Option<PathBuf>,

    /// Number of lines sampled for delimiter detection (overrides config)
    #[arg(long = "sniff-lines", value_name = "N")]
    pub sniff_lines: Option<usize>,

    /// Generate default configuration file at ~/.config/tabfuse/config.toml
    #[arg(long = "generate-config", action)]
    pub generate_config: bool,

    /// Force overwrite existing config file when using --generate-config
    #[arg(long = "force", requires = "generate_config", action)]
    pub force: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_format_from_path() {
        assert_eq!(
            SourceFormat::from_path(Path::new("ventas.csv")),
            Some(SourceFormat::Csv)
        );
        assert_eq!(
            SourceFormat::from_path(Path::new("Report.XLSX")),
            Some(SourceFormat::Xlsx)
        );
        assert_eq!(
            SourceFormat::from_path(Path::new("legacy.xls")),
            Some(SourceFormat::Xlsx)
        );
        assert_eq!(SourceFormat::from_path(Path::new("data.parquet")), None);
        assert_eq!(SourceFormat::from_path(Path::new("noext")), None);
    }

    #[test]
    fn test_args_parse_pivot_options() {
        let args = Args::try_parse_from([
            "tabfuse",
            "a.csv",
            "b.csv",
            "--rows",
            "id,region",
            "--values",
            "amount",
            "--agg",
            "mean",
            "--agg-for",
            "amount=max",
            "--filter",
            "name",
            "x",
        ])
        .unwrap();
        assert_eq!(args.paths.len(), 2);
        assert_eq!(args.rows, vec!["id", "region"]);
        assert_eq!(args.values, vec!["amount"]);
        assert_eq!(args.agg, Some(AggregationArg::Mean));
        assert_eq!(args.agg_for, vec!["amount=max"]);
        assert_eq!(args.filter, vec!["name", "x"]);
    }

    #[test]
    fn test_args_dir_conflicts_with_paths() {
        assert!(Args::try_parse_from(["tabfuse", "a.csv", "--dir", "data"]).is_err());
        let args = Args::try_parse_from(["tabfuse", "--dir", "data"]).unwrap();
        assert_eq!(args.dir, Some(PathBuf::from("data")));
    }

    #[test]
    fn test_command_definition_is_consistent() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
