//! Pivot engine: group by row keys and aggregate each value column with its own function.
//!
//! Output rows are sorted ascending by the key tuple with nulls last; rows with a null
//! key form their own group. Columns are the keys followed by the value columns, each
//! keeping its source name. An aggregate over no values is 0 (or "0" for text results).

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tabfuse_cli::AggregationArg;
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::table::{ColumnKind, TypedTable};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    #[default]
    Sum,
    Mean,
    Count,
    Max,
    Min,
}

impl Aggregation {
    pub const ALL: [Self; 5] = [Self::Sum, Self::Mean, Self::Count, Self::Max, Self::Min];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Mean => "mean",
            Self::Count => "count",
            Self::Max => "max",
            Self::Min => "min",
        }
    }

    /// Whether this function can be applied to a column of `kind`.
    pub fn accepts(self, kind: ColumnKind) -> bool {
        match self {
            Self::Count | Self::Max | Self::Min => true,
            Self::Sum | Self::Mean => matches!(
                kind,
                ColumnKind::Numeric | ColumnKind::Boolean | ColumnKind::Missing
            ),
        }
    }

    fn expr(self, column: &str, kind: ColumnKind) -> Expr {
        let c = col(column);
        let expr = match (self, kind) {
            (Self::Count, _) => c.count().cast(DataType::Int64),
            (Self::Mean, _) => c.cast(DataType::Float64).mean().fill_null(lit(0.0)),
            (Self::Sum, ColumnKind::Numeric) => c.sum().fill_null(lit(0)),
            (Self::Sum, _) => c.cast(DataType::Int64).sum().fill_null(lit(0)),
            (Self::Max | Self::Min, ColumnKind::Text | ColumnKind::Temporal) => {
                let c = c.cast(DataType::String);
                self.extreme(c).fill_null(lit("0"))
            }
            (Self::Max | Self::Min, ColumnKind::Numeric) => self.extreme(c).fill_null(lit(0)),
            (Self::Max | Self::Min, _) => self.extreme(c.cast(DataType::Int64)).fill_null(lit(0)),
        };
        expr.alias(column)
    }

    fn extreme(self, c: Expr) -> Expr {
        if self == Self::Min {
            c.min()
        } else {
            c.max()
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Aggregation {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "sum" => Ok(Self::Sum),
            "mean" | "avg" | "average" => Ok(Self::Mean),
            "count" => Ok(Self::Count),
            "max" => Ok(Self::Max),
            "min" => Ok(Self::Min),
            other => Err(EngineError::PivotConstruction(format!(
                "unknown aggregation '{}' (expected sum, mean, count, max or min)",
                other
            ))),
        }
    }
}

impl From<AggregationArg> for Aggregation {
    fn from(arg: AggregationArg) -> Self {
        match arg {
            AggregationArg::Sum => Self::Sum,
            AggregationArg::Mean => Self::Mean,
            AggregationArg::Count => Self::Count,
            AggregationArg::Max => Self::Max,
            AggregationArg::Min => Self::Min,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueAggregation {
    pub column: String,
    pub aggregation: Aggregation,
}

/// Row keys plus one aggregation per value column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PivotSpec {
    pub index: Vec<String>,
    pub values: Vec<ValueAggregation>,
}

impl PivotSpec {
    pub fn new(index: Vec<String>, values: Vec<ValueAggregation>) -> Self {
        Self { index, values }
    }

    /// Every value column uses `aggregation`.
    pub fn uniform(index: Vec<String>, values: Vec<String>, aggregation: Aggregation) -> Self {
        let values = values
            .into_iter()
            .map(|column| ValueAggregation {
                column,
                aggregation,
            })
            .collect();
        Self { index, values }
    }

    /// Change the function of one value column. Unlisted columns are left alone.
    pub fn with_aggregation(mut self, column: &str, aggregation: Aggregation) -> Self {
        for v in self.values.iter_mut().filter(|v| v.column == column) {
            v.aggregation = aggregation;
        }
        self
    }

    /// Check the spec against `table`; every problem is `PivotConstruction`.
    pub fn validate(&self, table: &TypedTable) -> Result<()> {
        let fail = |msg: String| Err(EngineError::PivotConstruction(msg));
        if self.index.is_empty() {
            return fail("choose at least one row column".into());
        }
        if self.values.is_empty() {
            return fail("choose at least one value column".into());
        }
        let mut seen = HashSet::new();
        for key in &self.index {
            if !table.has_column(key) {
                return fail(format!("row column '{}' not found", key));
            }
            if !seen.insert(key.as_str()) {
                return fail(format!("row column '{}' listed twice", key));
            }
        }
        for v in &self.values {
            let Some(kind) = table.kind(&v.column) else {
                return fail(format!("value column '{}' not found", v.column));
            };
            if self.index.contains(&v.column) {
                return fail(format!(
                    "'{}' cannot be both a row column and a value column",
                    v.column
                ));
            }
            if !seen.insert(v.column.as_str()) {
                return fail(format!("value column '{}' listed twice", v.column));
            }
            if !v.aggregation.accepts(kind) {
                return fail(format!(
                    "{} cannot be applied to {} column '{}'",
                    v.aggregation,
                    kind.as_str(),
                    v.column
                ));
            }
        }
        Ok(())
    }
}

/// Group `table` by the spec's row keys and aggregate its value columns.
pub fn pivot(table: &TypedTable, spec: &PivotSpec) -> Result<TypedTable> {
    spec.validate(table)?;

    let keys: Vec<Expr> = spec.index.iter().map(|k| col(k.as_str())).collect();
    let mut aggs = Vec::with_capacity(spec.values.len());
    for v in &spec.values {
        let kind = table.require_kind(&v.column)?;
        aggs.push(v.aggregation.expr(&v.column, kind));
    }

    let frame = table
        .frame()
        .clone()
        .lazy()
        .group_by(keys.clone())
        .agg(aggs)
        .sort_by_exprs(
            keys,
            SortMultipleOptions::default()
                .with_maintain_order(true)
                .with_nulls_last(true),
        )
        .collect()
        .map_err(|e| EngineError::PivotConstruction(crate::error::user_message_from_polars(&e)))?;

    debug!(
        index = ?spec.index,
        values = spec.values.len(),
        groups = frame.height(),
        "Built pivot"
    );
    Ok(TypedTable::new(frame))
}
