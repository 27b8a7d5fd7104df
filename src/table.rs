//! Tables with an explicit per-column type tag.
//!
//! A table is a polars `DataFrame`. The [`ColumnKind`] of every column is decided
//! once, when the table is produced, and filtering and pivoting branch on that tag.

use polars::prelude::*;

use crate::error::{EngineError, Result};

/// Type tag for a column. Every kind can hold missing values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    Numeric,
    Text,
    Boolean,
    /// Dates and datetimes (spreadsheet cells).
    Temporal,
    /// No values at all and no inferred type.
    Missing,
}

impl ColumnKind {
    pub fn from_dtype(dtype: &DataType) -> Self {
        match dtype {
            d if d.is_numeric() => Self::Numeric,
            DataType::Boolean => Self::Boolean,
            DataType::Date | DataType::Datetime(_, _) => Self::Temporal,
            DataType::Null => Self::Missing,
            _ => Self::Text,
        }
    }

    pub fn is_numeric(self) -> bool {
        self == Self::Numeric
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Numeric => "numeric",
            Self::Text => "text",
            Self::Boolean => "boolean",
            Self::Temporal => "temporal",
            Self::Missing => "missing",
        }
    }
}

/// A frame plus the type tag of each of its columns, in column order.
#[derive(Debug, Clone)]
pub struct TypedTable {
    frame: DataFrame,
    kinds: Vec<ColumnKind>,
}

impl TypedTable {
    /// Tag every column of `frame` from its dtype.
    pub fn new(frame: DataFrame) -> Self {
        let kinds = frame
            .dtypes()
            .iter()
            .map(ColumnKind::from_dtype)
            .collect();
        Self { frame, kinds }
    }

    /// Row subset of `self` (same columns, same tags).
    pub(crate) fn with_rows(&self, frame: DataFrame) -> Self {
        debug_assert_eq!(frame.width(), self.frame.width());
        Self {
            frame,
            kinds: self.kinds.clone(),
        }
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn into_frame(self) -> DataFrame {
        self.frame
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn width(&self) -> usize {
        self.frame.width()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.frame.get_column_index(name).is_some()
    }

    pub fn kind(&self, column: &str) -> Option<ColumnKind> {
        self.frame
            .get_column_index(column)
            .and_then(|idx| self.kinds.get(idx).copied())
    }

    /// Like [`kind`](Self::kind) but an unknown column is an error.
    pub fn require_kind(&self, column: &str) -> Result<ColumnKind> {
        self.kind(column)
            .ok_or_else(|| EngineError::UnknownColumn(column.to_string()))
    }

    /// First `n` rows.
    pub fn head(&self, n: usize) -> Self {
        self.with_rows(self.frame.head(Some(n)))
    }

    /// Keep only `columns`, in the given order.
    pub fn select(&self, columns: &[String]) -> Result<Self> {
        let mut kinds = Vec::with_capacity(columns.len());
        for name in columns {
            kinds.push(self.require_kind(name)?);
        }
        let frame = self.frame.select(columns.iter().map(|s| s.as_str()))?;
        Ok(Self { frame, kinds })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TypedTable {
        let df = df!(
            "id" => &[1i64, 2, 3],
            "name" => &["x", "y", "z"],
            "ok" => &[true, false, true],
            "score" => &[Some(1.5f64), None, Some(2.0)]
        )
        .unwrap();
        TypedTable::new(df)
    }

    #[test]
    fn tags_follow_dtypes() {
        let t = sample();
        assert_eq!(t.kind("id"), Some(ColumnKind::Numeric));
        assert_eq!(t.kind("name"), Some(ColumnKind::Text));
        assert_eq!(t.kind("ok"), Some(ColumnKind::Boolean));
        assert_eq!(t.kind("score"), Some(ColumnKind::Numeric));
        assert_eq!(t.kind("nope"), None);
        assert!(matches!(
            t.require_kind("nope"),
            Err(EngineError::UnknownColumn(c)) if c == "nope"
        ));
    }

    #[test]
    fn select_reorders_columns_and_tags() {
        let t = sample();
        let s = t
            .select(&["name".to_string(), "id".to_string()])
            .unwrap();
        assert_eq!(s.column_names(), vec!["name", "id"]);
        assert_eq!(s.kind("name"), Some(ColumnKind::Text));
        assert_eq!(s.height(), 3);
        assert!(t.select(&["missing".to_string()]).is_err());
    }

    #[test]
    fn head_keeps_tags() {
        let t = sample().head(2);
        assert_eq!(t.height(), 2);
        assert_eq!(t.kind("ok"), Some(ColumnKind::Boolean));
    }
}
