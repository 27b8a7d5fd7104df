//! Row identifier assignment.
//!
//! [`assign_row_ids`] consumes a [`MergedDataset`] and yields a [`BaseTable`]. A
//! base table cannot be turned back into a merged dataset, so the identifier
//! column is added exactly once per merge.

use polars::prelude::*;

use crate::error::Result;
use crate::merge::MergedDataset;
use crate::table::TypedTable;

pub const ROW_ID_COLUMN: &str = "row_id";

/// Merged data with its 1-based identifier column at position 0.
#[derive(Debug, Clone)]
pub struct BaseTable {
    table: TypedTable,
    id_column: String,
    common_columns: Vec<String>,
}

impl BaseTable {
    pub fn table(&self) -> &TypedTable {
        &self.table
    }

    pub fn id_column(&self) -> &str {
        &self.id_column
    }

    /// Join key columns of the merge that produced this table, sorted by name.
    pub fn common_columns(&self) -> &[String] {
        &self.common_columns
    }
}

pub fn assign_row_ids(merged: MergedDataset) -> Result<BaseTable> {
    let common_columns = merged.common_columns().to_vec();
    let table = merged.into_table();
    let id_column = unique_id_name(&table);

    let ids: Vec<i64> = (1..=table.height() as i64).collect();
    let mut frame = table.into_frame();
    frame.insert_column(0, Series::new(id_column.as_str().into(), ids))?;

    Ok(BaseTable {
        table: TypedTable::new(frame),
        id_column,
        common_columns,
    })
}

/// `row_id`, or `row_id_<k>` with the smallest k that is free.
fn unique_id_name(table: &TypedTable) -> String {
    if !table.has_column(ROW_ID_COLUMN) {
        return ROW_ID_COLUMN.to_string();
    }
    (1..)
        .map(|k| format!("{}_{}", ROW_ID_COLUMN, k))
        .find(|name| !table.has_column(name))
        .unwrap_or_else(|| ROW_ID_COLUMN.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::merge_tables;

    fn single(df: DataFrame) -> MergedDataset {
        merge_tables(vec![TypedTable::new(df)]).unwrap()
    }

    #[test]
    fn ids_are_one_based_at_front() {
        let base = assign_row_ids(single(df!("a" => &["x", "y", "z"]).unwrap())).unwrap();
        assert_eq!(base.id_column(), "row_id");
        assert_eq!(base.table().column_names(), vec!["row_id", "a"]);
        let ids: Vec<Option<i64>> = base
            .table()
            .frame()
            .column("row_id")
            .unwrap()
            .i64()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(ids, vec![Some(1), Some(2), Some(3)]);
    }

    #[test]
    fn existing_name_is_not_reused() {
        let df = df!("row_id" => &[7i64], "row_id_1" => &[8i64]).unwrap();
        let base = assign_row_ids(single(df)).unwrap();
        assert_eq!(base.id_column(), "row_id_2");
        assert_eq!(base.table().width(), 3);
    }

    #[test]
    fn empty_table_gets_empty_id_column() {
        let df = df!("a" => Vec::<i64>::new()).unwrap();
        let base = assign_row_ids(single(df)).unwrap();
        assert_eq!(base.table().height(), 0);
        assert!(base.table().has_column("row_id"));
    }
}
