use std::path::Path;

use tabfuse::{AppConfig, EngineError, IngestStatus, Session, SourceDescriptor};

mod common;

#[test]
fn test_folder_pipeline_end_to_end() {
    let dir = common::temp_dir();
    common::write_file(&dir, "A.csv", common::A_CSV.as_bytes());
    common::write_file(&dir, "B.csv", b"id;amount\n1;10\n3;5\n");
    common::write_file(&dir, "readme.md", b"# not data\n");

    let mut session = Session::new(AppConfig::default());
    let base = session.load_folder(dir.path()).unwrap();
    assert_eq!(base.id_column(), "row_id");
    assert_eq!(
        common::names(base.table()),
        vec!["row_id", "id", "name", "amount"]
    );

    let files: Vec<&str> = session.reports().iter().map(|r| r.file.as_str()).collect();
    assert_eq!(files, vec!["A.csv", "B.csv"]);
    assert_eq!(session.common_columns(), &["id".to_string()]);
}

#[test]
fn test_row_ids_are_one_to_n() {
    let mut session = Session::new(AppConfig::default());
    let base = session.load(&common::scenario_sources()).unwrap();
    let ids = common::i64_column(base.table(), "row_id");
    let expected: Vec<Option<i64>> = (1..=base.table().height() as i64).map(Some).collect();
    assert_eq!(ids, expected);
}

#[test]
fn test_reload_does_not_add_second_identifier() {
    let mut session = Session::new(AppConfig::default());
    session.load(&common::scenario_sources()).unwrap();
    let base = session.load(&common::scenario_sources()).unwrap();
    let id_columns = common::names(base.table())
        .into_iter()
        .filter(|c| c.starts_with("row_id"))
        .count();
    assert_eq!(id_columns, 1);
}

#[test]
fn test_partial_failure_keeps_going() {
    let mut session = Session::new(AppConfig::default());
    let sources = vec![
        common::bytes_source("A.csv", common::A_CSV),
        SourceDescriptor::from_bytes("bad.xlsx", b"garbage".to_vec()),
        common::bytes_source("B.csv", common::B_CSV),
    ];
    let base = session.load(&sources).unwrap();
    assert_eq!(base.table().height(), 3);
    assert!(matches!(
        session.reports()[1].status,
        IngestStatus::Failed { .. }
    ));
}

#[test]
fn test_empty_file_is_left_out_of_the_join() {
    let mut session = Session::new(AppConfig::default());
    let sources = vec![
        common::bytes_source("A.csv", common::A_CSV),
        SourceDescriptor::from_bytes("empty.csv", Vec::new()),
        common::bytes_source("B.csv", common::B_CSV),
    ];
    let base = session.load(&sources).unwrap();
    assert_eq!(
        common::names(base.table()),
        vec!["row_id", "id", "name", "amount"]
    );
    assert_eq!(base.table().height(), 3);
    assert_eq!(session.common_columns(), &["id".to_string()]);
    assert_eq!(session.reports().len(), 3);
    assert!(session.reports().iter().all(|r| r.is_loaded()));
}

#[test]
fn test_nothing_readable_is_no_dataset() {
    let mut session = Session::new(AppConfig::default());
    let sources = vec![SourceDescriptor::from_bytes("bad.xlsx", b"garbage".to_vec())];
    assert!(matches!(session.load(&sources), Err(EngineError::NoDataset)));
    assert_eq!(session.reports().len(), 1);
}

#[test]
fn test_missing_folder_is_path_not_found() {
    let mut session = Session::new(AppConfig::default());
    let err = session
        .load_folder(Path::new("/definitely/not/a/folder"))
        .unwrap_err();
    assert!(matches!(err, EngineError::PathNotFound(_)));
    assert!(session.reports().is_empty());
}

#[test]
fn test_view_projects_and_filters() {
    let mut session = Session::new(AppConfig::default());
    session.load(&common::scenario_sources()).unwrap();

    let view = session
        .view(&["row_id".to_string(), "name".to_string()], Some(("amount", ">4")))
        .unwrap();
    assert_eq!(common::names(&view.table), vec!["row_id", "name"]);
    assert_eq!(common::i64_column(&view.table, "row_id"), vec![Some(1), Some(3)]);

    assert!(matches!(
        session.view(&["nope".to_string()], None),
        Err(EngineError::UnknownColumn(_))
    ));
}

#[test]
fn test_preview_uses_configured_rows() {
    let mut config = AppConfig::default();
    config.display.preview_rows = 2;
    let mut session = Session::new(config);
    session.load(&common::scenario_sources()).unwrap();
    let view = session.view(&[], None).unwrap();
    assert_eq!(session.preview(&view.table).height(), 2);
    assert_eq!(view.table.height(), 3);
}
