//! Single-predicate row filtering.
//!
//! Numeric columns take a comparison such as `>=10` or `< 2.5`; every other column
//! is matched by case-insensitive substring on its string form. Missing values never
//! pass a filter.

use std::fmt;
use std::sync::LazyLock;

use polars::prelude::*;
use regex::Regex;
use tracing::{debug, warn};

use crate::error::{EngineError, Result};
use crate::table::TypedTable;

static NUMERIC_FILTER: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^\s*(>=|<=|==|>|<)\s*([+-]?(\d+(\.\d*)?|\.\d+)([eE][+-]?\d+)?)\s*$").ok()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    Contains,
    Gt,
    Lt,
    GtEq,
    LtEq,
    Eq,
}

impl FilterOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Contains => "contains",
            FilterOperator::Gt => ">",
            FilterOperator::Lt => "<",
            FilterOperator::GtEq => ">=",
            FilterOperator::LtEq => "<=",
            FilterOperator::Eq => "==",
        }
    }

    fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            ">" => Some(FilterOperator::Gt),
            "<" => Some(FilterOperator::Lt),
            ">=" => Some(FilterOperator::GtEq),
            "<=" => Some(FilterOperator::LtEq),
            "==" => Some(FilterOperator::Eq),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Text(String),
    Number(f64),
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::Text(s) => write!(f, "{}", s),
            FilterValue::Number(n) => write!(f, "{}", n),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterSpec {
    pub column: String,
    pub operator: FilterOperator,
    pub value: FilterValue,
}

impl FilterSpec {
    pub fn contains(column: impl Into<String>, needle: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            operator: FilterOperator::Contains,
            value: FilterValue::Text(needle.into()),
        }
    }

    /// Numeric comparison. `Contains` is not a comparison and is turned into `Eq`.
    pub fn compare(column: impl Into<String>, operator: FilterOperator, value: f64) -> Self {
        let operator = match operator {
            FilterOperator::Contains => FilterOperator::Eq,
            op => op,
        };
        Self {
            column: column.into(),
            operator,
            value: FilterValue::Number(value),
        }
    }

    /// Build a filter from user input, choosing the form by the column's type.
    ///
    /// Returns `Ok(None)` for blank input. A numeric column with input that is not a
    /// comparison is `InvalidFilterSyntax`.
    pub fn parse(table: &TypedTable, column: &str, raw: &str) -> Result<Option<Self>> {
        let kind = table.require_kind(column)?;
        if raw.trim().is_empty() {
            return Ok(None);
        }
        if kind.is_numeric() {
            let (operator, value) =
                parse_numeric_expression(raw).ok_or_else(|| EngineError::InvalidFilterSyntax {
                    column: column.to_string(),
                    expression: raw.to_string(),
                })?;
            Ok(Some(Self::compare(column, operator, value)))
        } else {
            Ok(Some(Self::contains(column, raw)))
        }
    }

    fn expr(&self) -> Expr {
        let column = col(self.column.as_str());
        match (&self.operator, &self.value) {
            (FilterOperator::Contains, value) => column
                .cast(DataType::String)
                .str()
                .to_lowercase()
                .str()
                .contains_literal(lit(value.to_string().to_lowercase())),
            (op, value) => {
                let number = match value {
                    FilterValue::Number(n) => *n,
                    FilterValue::Text(s) => s.trim().parse::<f64>().unwrap_or(f64::NAN),
                };
                let column = column.cast(DataType::Float64);
                let val_lit = lit(number);
                match op {
                    FilterOperator::Gt => column.gt(val_lit),
                    FilterOperator::Lt => column.lt(val_lit),
                    FilterOperator::GtEq => column.gt_eq(val_lit),
                    FilterOperator::LtEq => column.lt_eq(val_lit),
                    _ => column.eq(val_lit),
                }
            }
        }
    }
}

impl fmt::Display for FilterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operator {
            FilterOperator::Contains => write!(f, "{} contains '{}'", self.column, self.value),
            op => write!(f, "{} {} {}", self.column, op.as_str(), self.value),
        }
    }
}

/// Parse `>=10`, `< 2.5`, `==-3e2` and the like.
pub fn parse_numeric_expression(raw: &str) -> Option<(FilterOperator, f64)> {
    let caps = NUMERIC_FILTER.as_ref()?.captures(raw)?;
    let operator = FilterOperator::from_symbol(caps.get(1)?.as_str())?;
    let value = caps.get(2)?.as_str().parse::<f64>().ok()?;
    Some((operator, value))
}

/// Rows of `table` for which `spec` holds, in their original order.
pub fn apply_filter(table: &TypedTable, spec: &FilterSpec) -> Result<TypedTable> {
    let kind = table.require_kind(&spec.column)?;
    if spec.operator != FilterOperator::Contains && !kind.is_numeric() {
        return Err(EngineError::InvalidFilterSyntax {
            column: spec.column.clone(),
            expression: format!("{}{}", spec.operator.as_str(), spec.value),
        });
    }
    let frame = table.frame().clone().lazy().filter(spec.expr()).collect()?;
    debug!(filter = %spec, before = table.height(), after = frame.height(), "Applied filter");
    Ok(table.with_rows(frame))
}

/// A filtered view, or the input unchanged with the reason the filter was ignored.
#[derive(Debug)]
pub struct FilterOutcome {
    pub table: TypedTable,
    pub warning: Option<EngineError>,
}

/// Filter by raw user input, degrading to the unfiltered table when a numeric
/// expression is malformed. Unknown columns are still an error.
pub fn filter_table(table: &TypedTable, column: &str, raw: &str) -> Result<FilterOutcome> {
    match FilterSpec::parse(table, column, raw) {
        Ok(Some(spec)) => Ok(FilterOutcome {
            table: apply_filter(table, &spec)?,
            warning: None,
        }),
        Ok(None) => Ok(FilterOutcome {
            table: table.clone(),
            warning: None,
        }),
        Err(e @ EngineError::InvalidFilterSyntax { .. }) => {
            warn!(column, expression = raw, "Ignoring invalid filter");
            Ok(FilterOutcome {
                table: table.clone(),
                warning: Some(e),
            })
        }
        Err(e) => Err(e),
    }
}
