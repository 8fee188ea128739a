//! Merging real workbooks written with `rust_xlsxwriter`.

use std::fs;
use std::path::Path;

use rust_xlsxwriter::{Format, Workbook, XlsxError};
use sheetmerge::{Error, MergeConfig, Merger, SortOutcome};
use tempfile::TempDir;

// 2024-01-01 as a spreadsheet serial date.
const JAN_1_2024: f64 = 45_292.0;

fn serial(hour: u32) -> f64 {
    JAN_1_2024 + f64::from(hour) / 24.0
}

/// Writes a workbook whose first sheet has `Timestamp` text cells.
fn text_workbook(path: &Path, rows: &[(&str, f64)]) -> Result<(), XlsxError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 0, "Timestamp")?;
    sheet.write_string(0, 1, "Value")?;
    for (i, (ts, value)) in rows.iter().enumerate() {
        let row = u32::try_from(i).expect("few rows") + 1;
        sheet.write_string(row, 0, *ts)?;
        sheet.write_number(row, 1, *value)?;
    }
    workbook.save(path)
}

/// Writes a workbook whose `Timestamp` cells are date-formatted serials.
fn date_workbook(path: &Path, rows: &[(u32, f64)]) -> Result<(), XlsxError> {
    let mut workbook = Workbook::new();
    let date = Format::new().set_num_format("yyyy-mm-dd hh:mm:ss");
    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 0, "Timestamp")?;
    sheet.write_string(0, 1, "Value")?;
    for (i, (hour, value)) in rows.iter().enumerate() {
        let row = u32::try_from(i).expect("few rows") + 1;
        sheet.write_number_with_format(row, 0, serial(*hour), &date)?;
        sheet.write_number(row, 1, *value)?;
    }
    workbook.save(path)
}

fn setup() -> (TempDir, MergeConfig) {
    let temp = tempfile::tempdir().unwrap();
    let files = temp.path().join("files");
    fs::create_dir(&files).unwrap();
    let config = MergeConfig::new(files, temp.path().join("report.csv"));
    (temp, config)
}

#[test]
fn merges_text_and_date_cells() {
    let (temp, config) = setup();
    let files = temp.path().join("files");
    text_workbook(
        &files.join("a.xlsx"),
        &[("2024-01-01 09:00:00", 1.0), ("2024-01-01 10:00:00", 2.5)],
    )
    .unwrap();
    date_workbook(&files.join("b.xlsx"), &[(8, 3.0), (11, 4.0)]).unwrap();

    let report = Merger::new(config).run().unwrap();
    assert_eq!(report.files_found, 2);
    assert_eq!(report.files_loaded, 2);
    assert_eq!(report.rows_written, 4);
    assert!(matches!(report.sort, SortOutcome::Sorted { empty: 0, .. }));
    assert_eq!(
        fs::read_to_string(temp.path().join("report.csv")).unwrap(),
        "Timestamp,Value\n\
         2024-01-01 08:00:00,3\n\
         2024-01-01 09:00:00,1\n\
         2024-01-01 10:00:00,2.5\n\
         2024-01-01 11:00:00,4\n"
    );
}

#[test]
fn corrupt_workbooks_are_skipped() {
    let (temp, config) = setup();
    let files = temp.path().join("files");
    text_workbook(&files.join("good.xlsx"), &[("2024-01-01 09:00:00", 1.0)]).unwrap();
    fs::write(files.join("bad.xlsx"), b"PK\x03\x04 truncated").unwrap();
    fs::write(files.join("~$good.xlsx"), b"owner lock").unwrap();
    fs::write(files.join("ignored.csv"), "Timestamp\n2020-01-01\n").unwrap();

    let report = Merger::new(config).run().unwrap();
    assert_eq!(report.files_found, 3);
    assert_eq!(report.files_loaded, 1);
    assert_eq!(report.skipped.len(), 2);
    assert_eq!(
        fs::read_to_string(temp.path().join("report.csv")).unwrap(),
        "Timestamp,Value\n2024-01-01 09:00:00,1\n"
    );
}

#[test]
fn all_corrupt_means_no_output() {
    let (temp, config) = setup();
    fs::write(temp.path().join("files").join("bad.xlsx"), b"garbage").unwrap();

    let err = Merger::new(config).run().unwrap_err();
    assert!(matches!(err, Error::NoInput { .. }));
    assert!(!temp.path().join("report.csv").exists());
}

#[test]
fn named_worksheet() {
    let (temp, config) = setup();
    let path = temp.path().join("files").join("book.xlsx");
    let mut workbook = Workbook::new();
    let summary = workbook.add_worksheet();
    summary.set_name("Summary").unwrap();
    summary.write_string(0, 0, "note").unwrap();
    let data = workbook.add_worksheet();
    data.set_name("Data").unwrap();
    data.write_string(0, 0, "Timestamp").unwrap();
    data.write_string(1, 0, "2024-01-02 00:00:00").unwrap();
    data.write_string(2, 0, "2024-01-01 00:00:00").unwrap();
    workbook.save(&path).unwrap();

    let merger = Merger::new(config.clone().with_sheet(Some("Data".to_string())));
    let table = merger.load(&path).unwrap();
    assert_eq!(table.num_rows(), 2);
    merger.run().unwrap();
    assert_eq!(
        fs::read_to_string(temp.path().join("report.csv")).unwrap(),
        "Timestamp\n2024-01-01 00:00:00\n2024-01-02 00:00:00\n"
    );

    let first = Merger::new(config.clone()).load(&path).unwrap();
    assert_eq!(first.column_names().collect::<Vec<_>>(), ["note"]);

    let missing = Merger::new(config.with_sheet(Some("Nope".to_string())));
    assert!(matches!(
        missing.load(&path),
        Err(Error::SheetNotFound { .. })
    ));
}
