//! Reading worksheets of spreadsheet workbooks (xlsx, xlsm, xlsb, xls, ods).

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use num_traits::ToPrimitive;

use crate::error::{Error, Result};
use crate::header;
use crate::table::Table;
use crate::timestamp;

/// Integral floats up to this magnitude are rendered without a fraction.
const MAX_EXACT_FLOAT: f64 = 9_007_199_254_740_992.0;

/// Loads one worksheet; its first row is the header.
///
/// `sheet` names the worksheet to read; the first worksheet is used when it
/// is `None`. Rows in which every cell is empty are skipped.
///
/// # Errors
///
/// Returns an error if the workbook cannot be opened or decoded, the
/// worksheet does not exist, or it has no header row.
pub fn load(path: &Path, sheet: Option<&str>) -> Result<Table> {
    let workbook_error = |source| Error::Workbook {
        path: path.to_path_buf(),
        source,
    };
    let mut workbook = open_workbook_auto(path).map_err(workbook_error)?;
    let range = if let Some(name) = sheet {
        if !workbook.sheet_names().iter().any(|n| n == name) {
            return Err(Error::SheetNotFound {
                path: path.to_path_buf(),
                sheet: name.to_string(),
            });
        }
        workbook.worksheet_range(name).map_err(workbook_error)?
    } else {
        workbook
            .worksheet_range_at(0)
            .ok_or_else(|| Error::EmptyWorkbook {
                path: path.to_path_buf(),
            })?
            .map_err(workbook_error)?
    };

    let mut rows = range.rows();
    let header = rows.next().ok_or_else(|| Error::EmptyFile {
        path: path.to_path_buf(),
    })?;
    let names = header::normalize(header.iter().map(cell_to_string).collect());
    let width = names.len();
    let data: Vec<Vec<Option<String>>> = rows
        .map(|row| row.iter().take(width).map(cell_to_string).collect::<Vec<_>>())
        .filter(|cells| cells.iter().any(Option::is_some))
        .collect();
    Ok(Table::from_rows(&names, &data))
}

/// Renders a workbook cell as text; empty and error cells are `None`.
pub(crate) fn cell_to_string(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) => {
            if s.is_empty() {
                None
            } else {
                Some(s.clone())
            }
        }
        Data::Int(v) => Some(v.to_string()),
        Data::Float(v) => Some(format_float(*v)),
        Data::Bool(v) => Some(if *v { "True" } else { "False" }.to_string()),
        Data::DateTime(v) => Some(v.as_datetime().map_or_else(
            || format_float(v.as_f64()),
            |dt| timestamp::format_naive(&timestamp::round_to_millis(dt)),
        )),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(s.clone()),
    }
}

fn format_float(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < MAX_EXACT_FLOAT {
        if let Some(i) = v.to_i64() {
            return i.to_string();
        }
    }
    v.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn cells() {
        assert_eq!(cell_to_string(&Data::Empty), None);
        assert_eq!(cell_to_string(&Data::String(String::new())), None);
        assert_eq!(
            cell_to_string(&Data::String("2024-01-01 09:00".to_string())).as_deref(),
            Some("2024-01-01 09:00")
        );
        assert_eq!(cell_to_string(&Data::Int(-4)).as_deref(), Some("-4"));
        assert_eq!(cell_to_string(&Data::Float(3.0)).as_deref(), Some("3"));
        assert_eq!(cell_to_string(&Data::Float(21.25)).as_deref(), Some("21.25"));
        assert_eq!(cell_to_string(&Data::Float(1e20)).as_deref(), Some("100000000000000000000"));
        assert_eq!(cell_to_string(&Data::Bool(true)).as_deref(), Some("True"));
        assert_eq!(
            cell_to_string(&Data::DateTimeIso("2024-01-01T09:00:00".to_string())).as_deref(),
            Some("2024-01-01T09:00:00")
        );
    }

    #[test]
    fn not_a_workbook() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.xlsx");
        fs::write(&path, b"definitely not a zip archive").unwrap();
        assert!(matches!(load(&path, None), Err(Error::Workbook { .. })));
    }

    #[test]
    fn missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.xlsx");
        assert!(matches!(load(&path, None), Err(Error::Workbook { .. })));
    }
}
