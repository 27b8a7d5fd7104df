//! File ingestion: one source in, one typed table out.
//!
//! CSV content is decoded leniently (invalid UTF-8 is replaced), the delimiter is
//! sniffed, rows whose field count differs from the header are dropped, and column
//! types are inferred by the polars CSV reader. Spreadsheets are read from their
//! first sheet with calamine and typed per column.
//!
//! Every failure is turned into [`EngineError::FileRead`] for that one source;
//! [`ingest_all`] never stops at a bad file.

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use polars::prelude::*;
use tabfuse_cli::SourceFormat;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::error::{EngineError, Result};
use crate::sniff::{Sniffed, Sniffer};
use crate::source::SourceDescriptor;
use crate::table::TypedTable;

#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    pub sniffer: Sniffer,
    /// Rows used for CSV type inference; None scans every row.
    pub infer_schema_length: Option<usize>,
}

impl IngestOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            sniffer: config.sniffer(),
            infer_schema_length: config.file_loading.infer_schema_length,
        }
    }
}

/// A successfully read source.
#[derive(Debug, Clone)]
pub struct IngestedTable {
    pub name: String,
    pub table: TypedTable,
    /// Delimiter used for CSV sources.
    pub delimiter: Option<u8>,
    /// CSV rows dropped because their field count did not match the header.
    pub skipped_rows: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestStatus {
    Loaded {
        rows: usize,
        /// Sniffed delimiter, for CSV sources.
        delimiter: Option<u8>,
        /// Rows dropped for a mismatched field count.
        skipped_rows: usize,
    },
    Failed {
        message: String,
    },
}

/// Per-file outcome, in input order, for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub file: String,
    pub status: IngestStatus,
}

impl IngestReport {
    pub fn is_loaded(&self) -> bool {
        matches!(self.status, IngestStatus::Loaded { .. })
    }
}

/// Ingest every source, skipping the ones that fail. Returned tables keep input order.
pub fn ingest_all(
    sources: &[SourceDescriptor],
    options: &IngestOptions,
) -> (Vec<IngestedTable>, Vec<IngestReport>) {
    let mut tables = Vec::with_capacity(sources.len());
    let mut reports = Vec::with_capacity(sources.len());
    for source in sources {
        match ingest(source, options) {
            Ok(table) => {
                info!(file = %table.name, rows = table.table.height(), "Loaded file");
                reports.push(IngestReport {
                    file: table.name.clone(),
                    status: IngestStatus::Loaded {
                        rows: table.table.height(),
                        delimiter: table.delimiter,
                        skipped_rows: table.skipped_rows,
                    },
                });
                tables.push(table);
            }
            Err(e) => {
                warn!(file = %source.name(), error = %e, "Skipping file");
                reports.push(IngestReport {
                    file: source.name().to_string(),
                    status: IngestStatus::Failed {
                        message: e.to_string(),
                    },
                });
            }
        }
    }
    (tables, reports)
}

/// Read one source. Any failure is reported as `FileRead` naming the source.
pub fn ingest(source: &SourceDescriptor, options: &IngestOptions) -> Result<IngestedTable> {
    let name = source.name().to_string();
    let as_file_error = |e: EngineError| match e {
        EngineError::FileRead { message, .. } => EngineError::file_read(&name, message),
        other => EngineError::file_read(&name, other.user_message()),
    };

    let format = source.format().ok_or_else(|| {
        EngineError::file_read(&name, "unsupported file type (expected .csv or .xlsx)")
    })?;
    let bytes = source
        .read_bytes()
        .map_err(|e| as_file_error(EngineError::Io(e)))?;

    match format {
        SourceFormat::Csv => {
            let parsed = read_csv_bytes(&bytes, options).map_err(as_file_error)?;
            let frame = type_empty_columns(parsed.frame).map_err(as_file_error)?;
            Ok(IngestedTable {
                name,
                table: TypedTable::new(frame),
                delimiter: Some(parsed.sniffed.delimiter),
                skipped_rows: parsed.skipped_rows,
            })
        }
        SourceFormat::Xlsx => {
            let frame = read_excel_bytes(bytes.into_owned())
                .and_then(type_empty_columns)
                .map_err(as_file_error)?;
            Ok(IngestedTable {
                name,
                table: TypedTable::new(frame),
                delimiter: None,
                skipped_rows: 0,
            })
        }
    }
}

#[derive(Debug)]
pub struct CsvParse {
    pub frame: DataFrame,
    pub sniffed: Sniffed,
    pub skipped_rows: usize,
}

/// Parse delimited text with a sniffed delimiter.
pub fn read_csv_bytes(bytes: &[u8], options: &IngestOptions) -> Result<CsvParse> {
    let decoded = String::from_utf8_lossy(bytes);
    let text = decoded.trim_start_matches('\u{feff}');
    let sniffed = options.sniffer.sniff(text);
    if !sniffed.detected {
        warn!(
            fallback = %(sniffed.delimiter as char).escape_default(),
            "No consistent delimiter found; using fallback"
        );
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(sniffed.delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut records = reader.records();
    let header = match records.next() {
        Some(Ok(record)) => normalize_headers(record.iter().map(str::to_string)),
        Some(Err(e)) => return Err(EngineError::file_read("", e.to_string())),
        None => {
            return Ok(CsvParse {
                frame: DataFrame::empty(),
                sniffed,
                skipped_rows: 0,
            })
        }
    };

    let mut writer = csv::WriterBuilder::new()
        .delimiter(b',')
        .from_writer(Vec::with_capacity(bytes.len()));
    writer
        .write_record(&header)
        .map_err(|e| EngineError::file_read("", e.to_string()))?;

    let mut skipped_rows = 0;
    for record in records {
        match record {
            Ok(r) if r.len() == header.len() => writer
                .write_record(&r)
                .map_err(|e| EngineError::file_read("", e.to_string()))?,
            _ => skipped_rows += 1,
        }
    }
    if skipped_rows > 0 {
        warn!(skipped_rows, "Skipped rows with a mismatched field count");
    }
    let normalized = writer
        .into_inner()
        .map_err(|e| EngineError::file_read("", e.to_string()))?;

    let frame = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(options.infer_schema_length)
        .with_ignore_errors(options.infer_schema_length.is_some())
        .with_parse_options(CsvParseOptions::default().with_separator(b','))
        .into_reader_with_file_handle(Cursor::new(normalized))
        .finish()?;

    debug!(
        delimiter = %(sniffed.delimiter as char).escape_default(),
        rows = frame.height(),
        columns = frame.width(),
        "Parsed CSV"
    );
    Ok(CsvParse {
        frame,
        sniffed,
        skipped_rows,
    })
}

/// Columns with rows but no values come out of the readers as all-null text.
/// Retype them as `Null` so they are tagged missing rather than text.
fn type_empty_columns(mut frame: DataFrame) -> Result<DataFrame> {
    let height = frame.height();
    if height == 0 {
        return Ok(frame);
    }
    let empty: Vec<PlSmallStr> = frame
        .get_columns()
        .iter()
        .filter(|c| c.dtype() == &DataType::String && c.null_count() == height)
        .map(|c| c.name().clone())
        .collect();
    for name in empty {
        debug!(column = %name, "Column has no values");
        frame.with_column(Column::full_null(name, height, &DataType::Null))?;
    }
    Ok(frame)
}

/// Trim header names, name blank ones `column_<n>` and make duplicates unique.
fn normalize_headers(raw: impl Iterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for (idx, name) in raw.enumerate() {
        let trimmed = name.trim();
        let base = if trimmed.is_empty() {
            format!("column_{}", idx + 1)
        } else {
            trimmed.to_string()
        };
        let mut candidate = base.clone();
        let mut k = 1;
        while out.contains(&candidate) {
            candidate = format!("{}_{}", base, k);
            k += 1;
        }
        out.push(candidate);
    }
    out
}

/// Inferred type for an Excel column (preserves numbers, bools, dates; avoids stringifying).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ExcelColType {
    Int64,
    Float64,
    Boolean,
    Utf8,
    Date,
    Datetime,
}

/// Read the first sheet of a workbook (xlsx, xls, xlsm, xlsb). The first row is the header.
pub fn read_excel_bytes(bytes: Vec<u8>) -> Result<DataFrame> {
    let excel_err =
        |e: calamine::Error| EngineError::file_read("", format!("not a readable workbook ({})", e));

    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes)).map_err(excel_err)?;
    if workbook.sheet_names().is_empty() {
        return Err(EngineError::file_read("", "workbook has no worksheets"));
    }
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| EngineError::file_read("", "first worksheet could not be opened"))?
        .map_err(excel_err)?;

    let rows: Vec<Vec<Data>> = range.rows().map(|r| r.to_vec()).collect();
    excel_rows_to_frame(&rows)
}

fn excel_rows_to_frame(rows: &[Vec<Data>]) -> Result<DataFrame> {
    let Some(header_row) = rows.first() else {
        return Ok(DataFrame::empty());
    };
    let headers = normalize_headers(
        header_row
            .iter()
            .map(|c| calamine::DataType::as_string(c).unwrap_or_else(|| c.to_string())),
    );
    let mut columns = Vec::with_capacity(headers.len());
    for (col_idx, name) in headers.iter().enumerate() {
        let cells: Vec<Option<&Data>> = rows[1..].iter().map(|row| row.get(col_idx)).collect();
        let inferred = excel_infer_column_type(&cells);
        columns.push(excel_column_to_series(name, &cells, inferred)?.into());
    }
    Ok(DataFrame::new(columns)?)
}

/// Prefers Int64 for whole-number floats; infers Date/Datetime for calamine
/// DateTime/DateTimeIso or for string columns that all parse as ISO date/datetime.
fn excel_infer_column_type(cells: &[Option<&Data>]) -> ExcelColType {
    use calamine::DataType as CalamineTrait;
    let mut has_string = false;
    let mut has_float = false;
    let mut has_int = false;
    let mut has_bool = false;
    let mut has_datetime = false;
    for cell in cells.iter().flatten() {
        if CalamineTrait::is_string(*cell) {
            has_string = true;
            break;
        }
        if CalamineTrait::is_float(*cell) {
            has_float = true;
        }
        if CalamineTrait::is_int(*cell) {
            has_int = true;
        }
        if CalamineTrait::is_bool(*cell) {
            has_bool = true;
        }
        if CalamineTrait::is_datetime(*cell) || CalamineTrait::is_datetime_iso(*cell) {
            has_datetime = true;
        }
    }
    if has_string {
        let non_empty: Vec<&Data> = cells
            .iter()
            .flatten()
            .copied()
            .filter(|c| !CalamineTrait::is_empty(*c))
            .collect();
        let all_dates = !non_empty.is_empty()
            && non_empty
                .iter()
                .all(|c| excel_cell_to_naive_datetime(c).is_some());
        if !all_dates {
            ExcelColType::Utf8
        } else if excel_parsed_cells_all_midnight(cells) {
            ExcelColType::Date
        } else {
            ExcelColType::Datetime
        }
    } else if has_datetime && !has_float && !has_int {
        if excel_parsed_cells_all_midnight(cells) {
            ExcelColType::Date
        } else {
            ExcelColType::Datetime
        }
    } else if has_float {
        let all_whole = cells.iter().flatten().all(|cell| {
            cell.as_f64()
                .is_none_or(|f| f.is_finite() && (f - f.trunc()).abs() < 1e-10)
        });
        if all_whole {
            ExcelColType::Int64
        } else {
            ExcelColType::Float64
        }
    } else if has_int {
        ExcelColType::Int64
    } else if has_bool {
        ExcelColType::Boolean
    } else {
        ExcelColType::Utf8
    }
}

/// True if every cell that parses as datetime has time 00:00:00.
fn excel_parsed_cells_all_midnight(cells: &[Option<&Data>]) -> bool {
    cells
        .iter()
        .flatten()
        .filter_map(|c| excel_cell_to_naive_datetime(c))
        .all(|dt| dt.time() == NaiveTime::MIN)
}

/// Converts a calamine cell to NaiveDateTime (Excel serial, DateTimeIso, or parseable string).
fn excel_cell_to_naive_datetime(cell: &Data) -> Option<NaiveDateTime> {
    use calamine::DataType;
    if let Some(dt) = cell.as_datetime() {
        return Some(dt);
    }
    let s = cell.get_datetime_iso().or_else(|| cell.get_string())?;
    parse_naive_datetime_str(s)
}

/// Parses an ISO-style date/datetime string; tries FORMATS in order.
fn parse_naive_datetime_str(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    const FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
    ];
    for fmt in FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN))
}

/// Build a Polars Series from a column of calamine cells using the inferred type.
fn excel_column_to_series(
    name: &str,
    cells: &[Option<&Data>],
    col_type: ExcelColType,
) -> Result<Series> {
    use calamine::DataType as CalamineTrait;
    let series = match col_type {
        ExcelColType::Int64 => {
            let v: Vec<Option<i64>> = cells
                .iter()
                .map(|c| c.and_then(|cell| cell.as_i64()))
                .collect();
            Series::new(name.into(), v)
        }
        ExcelColType::Float64 => {
            let v: Vec<Option<f64>> = cells
                .iter()
                .map(|c| c.and_then(|cell| cell.as_f64()))
                .collect();
            Series::new(name.into(), v)
        }
        ExcelColType::Boolean => {
            let v: Vec<Option<bool>> = cells
                .iter()
                .map(|c| c.and_then(|cell| cell.get_bool()))
                .collect();
            Series::new(name.into(), v)
        }
        ExcelColType::Utf8 => {
            let v: Vec<Option<String>> = cells
                .iter()
                .map(|c| {
                    c.filter(|cell| !CalamineTrait::is_empty(*cell))
                        .and_then(|cell| cell.as_string())
                })
                .collect();
            Series::new(name.into(), v)
        }
        ExcelColType::Date => {
            let v: Vec<Option<i32>> = cells
                .iter()
                .map(|c| {
                    c.and_then(excel_cell_to_naive_datetime)
                        .map(|dt| (dt.date() - NaiveDate::default()).num_days() as i32)
                })
                .collect();
            Series::new(name.into(), v).cast(&DataType::Date)?
        }
        ExcelColType::Datetime => {
            let v: Vec<Option<i64>> = cells
                .iter()
                .map(|c| {
                    c.and_then(excel_cell_to_naive_datetime)
                        .map(|dt| dt.and_utc().timestamp_micros())
                })
                .collect();
            Series::new(name.into(), v).cast(&DataType::Datetime(TimeUnit::Microseconds, None))?
        }
    };
    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_are_trimmed_and_unique() {
        let h = normalize_headers(
            [" id", "name ", "", "name"]
                .into_iter()
                .map(str::to_string),
        );
        assert_eq!(h, vec!["id", "name", "column_3", "name_1"]);
    }

    #[test]
    fn excel_whole_floats_become_integers() {
        let cells = [Data::Float(1.0), Data::Float(2.0), Data::Empty];
        let refs: Vec<Option<&Data>> = cells.iter().map(Some).collect();
        assert_eq!(excel_infer_column_type(&refs), ExcelColType::Int64);

        let cells = [Data::Float(1.5), Data::Int(2)];
        let refs: Vec<Option<&Data>> = cells.iter().map(Some).collect();
        assert_eq!(excel_infer_column_type(&refs), ExcelColType::Float64);
    }

    #[test]
    fn excel_mixed_text_stays_text() {
        let cells = [Data::Int(1), Data::String("n/a".into())];
        let refs: Vec<Option<&Data>> = cells.iter().map(Some).collect();
        assert_eq!(excel_infer_column_type(&refs), ExcelColType::Utf8);
    }

    #[test]
    fn excel_iso_strings_become_dates() {
        let cells = [
            Data::String("2024-01-05".into()),
            Data::String("2024-02-10".into()),
        ];
        let refs: Vec<Option<&Data>> = cells.iter().map(Some).collect();
        assert_eq!(excel_infer_column_type(&refs), ExcelColType::Date);
    }

    #[test]
    fn excel_rows_build_typed_frame() {
        let rows = vec![
            vec![
                Data::String("id".into()),
                Data::String("name".into()),
                Data::Empty,
            ],
            vec![Data::Float(1.0), Data::String("x".into()), Data::Bool(true)],
            vec![Data::Float(2.0), Data::Empty, Data::Bool(false)],
        ];
        let df = excel_rows_to_frame(&rows).unwrap();
        assert_eq!(
            TypedTable::new(df.clone()).column_names(),
            vec!["id", "name", "column_3"]
        );
        assert_eq!(df.column("id").unwrap().dtype(), &DataType::Int64);
        assert_eq!(df.column("name").unwrap().null_count(), 1);
        assert_eq!(df.column("column_3").unwrap().dtype(), &DataType::Boolean);
    }

    #[test]
    fn valueless_columns_become_null() {
        let frame = df!(
            "id" => &[1i64, 2],
            "amount" => &[None::<&str>, None],
            "name" => &[Some("x"), None]
        )
        .unwrap();
        let frame = type_empty_columns(frame).unwrap();
        assert_eq!(frame.column("amount").unwrap().dtype(), &DataType::Null);
        assert_eq!(frame.column("name").unwrap().dtype(), &DataType::String);
        assert_eq!(frame.height(), 2);
    }

    #[test]
    fn garbage_is_not_a_workbook() {
        assert!(read_excel_bytes(b"definitely not a spreadsheet".to_vec()).is_err());
    }
}
