//! Dataset merger: full outer join of every input on the columns they all share.

use std::collections::HashSet;

use polars::prelude::*;
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::table::TypedTable;

/// Result of merging one or more tables.
#[derive(Debug, Clone)]
pub struct MergedDataset {
    table: TypedTable,
    common_columns: Vec<String>,
}

impl MergedDataset {
    pub fn table(&self) -> &TypedTable {
        &self.table
    }

    pub fn into_table(self) -> TypedTable {
        self.table
    }

    /// Join key columns, sorted by name.
    pub fn common_columns(&self) -> &[String] {
        &self.common_columns
    }
}

/// Columns present in every table, in the column order of the first table.
pub fn shared_columns(tables: &[TypedTable]) -> Vec<String> {
    let Some((first, rest)) = tables.split_first() else {
        return Vec::new();
    };
    first
        .column_names()
        .into_iter()
        .filter(|name| rest.iter().all(|t| t.has_column(name)))
        .collect()
}

/// Merge tables left to right with a full outer join on all shared columns.
///
/// A single table is returned unchanged. Rows are ordered by the key columns
/// (nulls last) after each join step. Unmatched rows keep nulls in the other
/// side's columns. A null key matches a null key.
pub fn merge_tables(tables: Vec<TypedTable>) -> Result<MergedDataset> {
    let keys = shared_columns(&tables);
    let mut common_columns = keys.clone();
    common_columns.sort();

    match tables.len() {
        0 => Err(PolarsError::NoData("no tables to merge".into()).into()),
        1 => {
            let table = tables.into_iter().next().ok_or(EngineError::NoCommonColumns)?;
            Ok(MergedDataset {
                table,
                common_columns,
            })
        }
        _ if keys.is_empty() => Err(EngineError::NoCommonColumns),
        _ => {
            let mut frames: Vec<DataFrame> = tables.into_iter().map(TypedTable::into_frame).collect();
            reconcile_key_types(&mut frames, &keys)?;
            disambiguate_columns(&mut frames, &keys)?;

            let on: Vec<Expr> = keys.iter().map(|k| col(k.as_str())).collect();
            let sort_options = SortMultipleOptions::default()
                .with_maintain_order(true)
                .with_nulls_last(true);

            let mut join_args =
                JoinArgs::new(JoinType::Full).with_coalesce(JoinCoalesce::CoalesceColumns);
            join_args.nulls_equal = true;

            let mut frames = frames.into_iter();
            let mut acc = frames
                .next()
                .ok_or(EngineError::NoCommonColumns)?
                .lazy();
            for (step, right) in frames.enumerate() {
                debug!(step = step + 1, keys = ?keys, rows = right.height(), "Outer join");
                acc = acc
                    .join(
                        right.lazy(),
                        on.clone(),
                        on.clone(),
                        join_args.clone(),
                    )
                    .sort_by_exprs(on.clone(), sort_options.clone());
            }
            let frame = acc.collect()?;
            debug!(rows = frame.height(), columns = frame.width(), "Merged");
            Ok(MergedDataset {
                table: TypedTable::new(frame),
                common_columns,
            })
        }
    }
}

/// Cast each key column to one type across all frames when they disagree.
///
/// Zero-row frames and all-null columns do not vote, so a header-only file does not
/// turn numeric keys into text.
fn reconcile_key_types(frames: &mut [DataFrame], keys: &[String]) -> Result<()> {
    for key in keys {
        let mut voting = Vec::new();
        let mut all = Vec::new();
        for frame in frames.iter() {
            let dtype = frame.column(key)?.dtype().clone();
            if frame.height() > 0 && dtype != DataType::Null {
                voting.push(dtype.clone());
            }
            all.push(dtype);
        }
        let Some(target) = common_key_dtype(&voting).or_else(|| all.first().cloned()) else {
            continue;
        };
        if all.iter().all(|d| *d == target) {
            continue;
        }
        debug!(key = %key, dtype = %target, "Reconciling join key type");
        for frame in frames.iter_mut() {
            let column = frame.column(key)?;
            if column.dtype() != &target {
                let cast = column.cast(&target)?;
                frame.with_column(cast)?;
            }
        }
    }
    Ok(())
}

fn common_key_dtype(dtypes: &[DataType]) -> Option<DataType> {
    let first = dtypes.first()?;
    if dtypes.iter().all(|d| d == first) {
        Some(first.clone())
    } else if dtypes.iter().all(|d| d.is_numeric()) {
        if dtypes.iter().any(|d| d.is_float()) {
            Some(DataType::Float64)
        } else {
            Some(DataType::Int64)
        }
    } else {
        Some(DataType::String)
    }
}

/// Rename repeated non-key columns to `<name>_<n>`, n being the 1-based input position.
/// The first input to use a name keeps it.
fn disambiguate_columns(frames: &mut [DataFrame], keys: &[String]) -> Result<()> {
    let mut taken: HashSet<String> = frames
        .iter()
        .flat_map(|f| f.get_column_names().into_iter().map(|s| s.to_string()))
        .collect();
    let mut claimed: HashSet<String> = keys.iter().cloned().collect();

    for (idx, frame) in frames.iter_mut().enumerate() {
        let names: Vec<String> = frame
            .get_column_names()
            .into_iter()
            .map(|s| s.to_string())
            .collect();
        for name in names {
            if keys.contains(&name) || claimed.insert(name.clone()) {
                continue;
            }
            let suffix = format!("_{}", idx + 1);
            let mut renamed = format!("{}{}", name, suffix);
            while taken.contains(&renamed) {
                renamed.push_str(&suffix);
            }
            debug!(input = idx + 1, from = %name, to = %renamed, "Renaming colliding column");
            frame.rename(&name, renamed.as_str().into())?;
            taken.insert(renamed.clone());
            claimed.insert(renamed);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(df: &DataFrame) -> Vec<String> {
        df.get_column_names().iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn key_dtype_widening() {
        assert_eq!(
            common_key_dtype(&[DataType::Int64, DataType::Int32]),
            Some(DataType::Int64)
        );
        assert_eq!(
            common_key_dtype(&[DataType::Int64, DataType::Float64]),
            Some(DataType::Float64)
        );
        assert_eq!(
            common_key_dtype(&[DataType::Int64, DataType::String]),
            Some(DataType::String)
        );
        assert_eq!(common_key_dtype(&[]), None);
    }

    #[test]
    fn colliding_columns_get_position_suffix() {
        let mut frames = vec![
            df!("id" => &[1i64], "v" => &[1i64]).unwrap(),
            df!("id" => &[1i64], "w" => &[2i64]).unwrap(),
            df!("id" => &[1i64], "v" => &[3i64]).unwrap(),
        ];
        disambiguate_columns(&mut frames, &["id".to_string()]).unwrap();
        assert_eq!(names(&frames[0]), vec!["id", "v"]);
        assert_eq!(names(&frames[1]), vec!["id", "w"]);
        assert_eq!(names(&frames[2]), vec!["id", "v_3"]);
    }

    #[test]
    fn header_only_frame_does_not_vote() {
        let mut frames = vec![
            df!("id" => &[1i64, 2]).unwrap(),
            DataFrame::new(vec![Series::new("id".into(), Vec::<String>::new()).into()]).unwrap(),
        ];
        reconcile_key_types(&mut frames, &["id".to_string()]).unwrap();
        assert_eq!(frames[0].column("id").unwrap().dtype(), &DataType::Int64);
        assert_eq!(frames[1].column("id").unwrap().dtype(), &DataType::Int64);
    }
}
