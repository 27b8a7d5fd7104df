#![allow(dead_code)]

use polars::prelude::*;
use std::fs;
use std::path::PathBuf;
use tabfuse::{SourceDescriptor, TypedTable};
use tempfile::TempDir;

/// `A.csv`: id,name with rows (1,x), (2,y).
pub const A_CSV: &str = "id,name\n1,x\n2,y\n";
/// `B.csv`: id,amount with rows (1,10), (3,5).
pub const B_CSV: &str = "id,amount\n1,10\n3,5\n";

pub fn temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp dir")
}

/// Write `content` to `dir/name` and return the path.
pub fn write_file(dir: &TempDir, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).expect("Failed to write test file");
    path
}

/// Write `df` as comma-separated CSV to `dir/name`.
pub fn write_frame(dir: &TempDir, name: &str, mut df: DataFrame) -> PathBuf {
    let path = dir.path().join(name);
    let mut file = fs::File::create(&path).expect("Failed to create test file");
    CsvWriter::new(&mut file).finish(&mut df).unwrap();
    path
}

pub fn bytes_source(name: &str, content: &str) -> SourceDescriptor {
    SourceDescriptor::from_bytes(name, content.as_bytes().to_vec())
}

pub fn scenario_sources() -> Vec<SourceDescriptor> {
    vec![bytes_source("A.csv", A_CSV), bytes_source("B.csv", B_CSV)]
}

pub fn names(table: &TypedTable) -> Vec<String> {
    table.column_names()
}

pub fn i64_column(table: &TypedTable, column: &str) -> Vec<Option<i64>> {
    table
        .frame()
        .column(column)
        .unwrap()
        .cast(&DataType::Int64)
        .unwrap()
        .i64()
        .unwrap()
        .into_iter()
        .collect()
}

pub fn str_column(table: &TypedTable, column: &str) -> Vec<Option<String>> {
    table
        .frame()
        .column(column)
        .unwrap()
        .str()
        .unwrap()
        .into_iter()
        .map(|v| v.map(|s| s.to_string()))
        .collect()
}
