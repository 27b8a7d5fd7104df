//! Engine errors and user-facing message formatting.
//!
//! Polars and io failures are translated by variant into short sentences about the
//! input files, the join or the pivot, without polars plan dumps.

use polars::prelude::PolarsError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    /// One input could not be read. The file is skipped; other inputs still load.
    #[error("could not read {file}: {message}")]
    FileRead { file: String, message: String },

    #[error("the files share no column names, so they cannot be merged")]
    NoCommonColumns,

    #[error("invalid filter for column '{column}': '{expression}' (expected e.g. >=10, <5, ==3.5)")]
    InvalidFilterSyntax { column: String, expression: String },

    #[error("could not build pivot table: {0}")]
    PivotConstruction(String),

    #[error("folder not found: {}", .0.display())]
    PathNotFound(PathBuf),

    #[error("no data loaded; load at least one readable file first")]
    NoDataset,

    #[error("column not found: {0}")]
    UnknownColumn(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Polars(#[from] PolarsError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    pub(crate) fn file_read(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FileRead {
            file: file.into(),
            message: message.into(),
        }
    }

    /// Message for display to the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Polars(e) => user_message_from_polars(e),
            Self::Io(e) => user_message_from_io(e),
            other => other.to_string(),
        }
    }
}

/// Describe a polars failure in terms of what tabfuse was doing with the data.
pub fn user_message_from_polars(err: &PolarsError) -> String {
    use polars::prelude::PolarsError as PE;

    match err {
        PE::ColumnNotFound(msg) => format!("column not found: {}", first_line(msg)),
        PE::Duplicate(msg) => format!("a column name appears twice: {}", first_line(msg)),
        PE::IO { error, .. } => user_message_from_io(error),
        PE::NoData(msg) => format!("the file has no rows or columns ({})", first_line(msg)),
        PE::SchemaMismatch(msg) => {
            format!("shared columns hold incompatible types: {}", first_line(msg))
        }
        PE::InvalidOperation(msg) => {
            format!("operation not supported for this column type: {}", first_line(msg))
        }
        PE::ComputeError(msg) => compute_message(msg),
        PE::Context { error, msg } => format!("{}: {}", msg, user_message_from_polars(error)),
        #[allow(unreachable_patterns)]
        _ => first_line(&err.to_string()).to_string(),
    }
}

/// Describe an io failure while opening an input or writing an export.
pub fn user_message_from_io(err: &io::Error) -> String {
    use std::io::ErrorKind;

    match err.kind() {
        ErrorKind::NotFound => "file not found".to_string(),
        ErrorKind::PermissionDenied => "permission denied".to_string(),
        ErrorKind::InvalidData => "invalid or corrupted content".to_string(),
        ErrorKind::UnexpectedEof => "file ends unexpectedly (truncated upload?)".to_string(),
        _ => err.to_string(),
    }
}

fn first_line(msg: &str) -> &str {
    msg.lines().next().unwrap_or("").trim()
}

/// Polars appends hints and plan dumps below the first line of a compute error.
/// Type errors from the CSV reader mean a value did not fit its inferred column type.
fn compute_message(msg: &str) -> String {
    let first = first_line(msg);
    if first.contains("could not parse") {
        format!(
            "a CSV value does not match its column's type ({}); \
             scan more rows with file_loading.infer_schema_length",
            first
        )
    } else if first.is_empty() {
        "the data could not be processed".to_string()
    } else {
        first.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_not_found_message() {
        let err = io::Error::new(io::ErrorKind::NotFound, "gone");
        assert_eq!(user_message_from_io(&err), "file not found");
        assert_eq!(EngineError::Io(err).user_message(), "file not found");
    }

    #[test]
    fn polars_column_not_found_message() {
        let err = PolarsError::ColumnNotFound("amount".into());
        let msg = EngineError::from(err).user_message();
        assert_eq!(msg, "column not found: amount");
    }

    #[test]
    fn csv_type_error_suggests_wider_inference() {
        let err = PolarsError::ComputeError(
            "could not parse `abc` as dtype `i64` at column 'amount'\n\nYou might want to..."
                .into(),
        );
        let msg = user_message_from_polars(&err);
        assert!(msg.starts_with("a CSV value does not match its column's type"));
        assert!(msg.contains("infer_schema_length"));
        assert!(!msg.contains("You might want"));
    }

    #[test]
    fn compute_message_keeps_first_line() {
        assert_eq!(compute_message("boom\n\nResolved plan: ..."), "boom");
        assert_eq!(compute_message(""), "the data could not be processed");
    }
}
