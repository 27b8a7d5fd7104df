//! CSV export of previews and pivot results: UTF-8, comma separated, one header row,
//! no index column, every row ending in `\n`. Missing values are empty fields.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use polars::prelude::*;
use tracing::info;

use crate::error::Result;
use crate::table::TypedTable;

/// Serialize `table` into `writer`.
pub fn write_csv_to<W: Write>(table: &TypedTable, writer: W) -> Result<()> {
    let mut df = table.frame().clone();
    // Valueless columns are written as empty text fields.
    let untyped: Vec<PlSmallStr> = df
        .get_columns()
        .iter()
        .filter(|c| c.dtype() == &DataType::Null)
        .map(|c| c.name().clone())
        .collect();
    for name in untyped {
        let height = df.height();
        df.with_column(Column::full_null(name, height, &DataType::String))?;
    }
    CsvWriter::new(writer)
        .with_separator(b',')
        .include_header(true)
        .with_line_terminator("\n".into())
        .finish(&mut df)?;
    Ok(())
}

/// The CSV bytes of `table`, for a download.
pub fn to_csv_bytes(table: &TypedTable) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    write_csv_to(table, &mut buf)?;
    Ok(buf)
}

/// Write `table` to a file, replacing any existing file.
pub fn write_csv(table: &TypedTable, path: &Path) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_csv_to(table, &mut writer)?;
    writer.flush()?;
    info!(path = %path.display(), rows = table.height(), "Exported CSV");
    Ok(())
}
