//! The merger that discovers, loads, combines, sorts and writes tables.

use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

use arrow::array::UInt64Array;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use wax::{CandidatePath, Glob, Pattern};

use crate::config::{delimiter_byte, InputFormat, MergeConfig};
use crate::error::{Error, Result};
use crate::table::{Column, Table};
use crate::timestamp::{BadTimestamp, TimestampParser};
use crate::{csv, excel};

/// A discovered file that could not be loaded.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// What `normalize_and_sort` did to the combined table.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum SortOutcome {
    /// The timestamp column was converted and the rows sorted by it.
    Sorted {
        /// Empty timestamp cells, placed after all valid ones.
        empty: usize,
        /// Unparseable values replaced by an empty timestamp.
        nulled: usize,
        /// Rows removed because of an unparseable value.
        dropped: usize,
    },
    /// The timestamp column does not exist; rows keep their load order.
    MissingColumn,
}

/// Summary of a complete merge run.
#[derive(Debug, Clone, Serialize)]
pub struct MergeReport {
    pub files_found: usize,
    pub files_loaded: usize,
    pub skipped: Vec<SkippedFile>,
    pub rows_loaded: usize,
    pub rows_written: usize,
    pub sort: SortOutcome,
    pub output: PathBuf,
}

/// Merges the tables of all files matching a pattern into one sorted file.
pub struct Merger {
    config: MergeConfig,
}

impl Merger {
    #[must_use]
    pub fn new(config: MergeConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    /// Lists the regular files in the configured directory whose names match
    /// the pattern, sorted by path.
    ///
    /// Names starting with `.` are only listed when the pattern starts with
    /// `.` too.
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern is invalid or the directory cannot be
    /// read.
    pub fn discover(&self) -> Result<Vec<PathBuf>> {
        let glob = Glob::new(&self.config.pattern).map_err(|e| Error::Pattern {
            pattern: self.config.pattern.clone(),
            message: e.to_string(),
        })?;
        let dir = &self.config.dir;
        let io_error = |source| Error::Io {
            path: dir.clone(),
            source,
        };

        let include_hidden = self.config.pattern.starts_with('.');
        let mut files = Vec::new();
        for entry in fs::read_dir(dir).map_err(io_error)? {
            let entry = entry.map_err(io_error)?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with('.') && !include_hidden {
                continue;
            }
            if glob.matched(&CandidatePath::from(&*name)).is_some() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Loads one file into a table.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or decoded.
    pub fn load(&self, path: &Path) -> Result<Table> {
        match self.config.input_format.for_path(path) {
            InputFormat::Csv => csv::load(path, delimiter_byte(self.config.input_delimiter)?),
            _ => excel::load(path, self.config.sheet.as_deref()),
        }
    }

    /// Concatenates `tables` in order into one table.
    ///
    /// # Errors
    ///
    /// Returns `Error::NoInput` if `tables` is empty.
    pub fn combine(&self, tables: Vec<Table>) -> Result<Table> {
        if tables.is_empty() {
            return Err(Error::NoInput {
                dir: self.config.dir.clone(),
                pattern: self.config.pattern.clone(),
            });
        }
        let mut combined = Table::empty();
        for mut table in tables {
            combined.append(&mut table);
        }
        Ok(combined)
    }

    /// Converts the timestamp column and sorts all rows by it.
    ///
    /// The sort is stable and places empty timestamps last. Without the
    /// timestamp column, `table` is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if a value cannot be parsed and the policy is
    /// `BadTimestamp::Abort`.
    pub fn normalize_and_sort(&self, mut table: Table) -> Result<(Table, SortOutcome)> {
        let name = &self.config.timestamp_column;
        let Some(index) = table.column_index(name) else {
            warn!(column = %name, "timestamp column not found; output will not be sorted");
            return Ok((table, SortOutcome::MissingColumn));
        };
        let Some(column) = table.column(index) else {
            return Err(Error::Table("column index out of range"));
        };

        info!(column = %name, "converting column to timestamps");
        let mut keep = vec![true; column.len()];
        let (mut nulled, mut dropped) = (0, 0);
        let cells = column
            .string_iter()
            .map_err(|_| Error::Table("timestamp column is not text"))?;
        let parser = TimestampParser::new(self.config.epoch_unit);
        let mut values = Vec::with_capacity(column.len());
        for (row, cell) in cells.enumerate() {
            let value = match cell.map(|s| (s, parser.parse_millis(s))) {
                None => None,
                Some((_, Ok(millis))) => Some(millis),
                Some((s, Err(_))) => match self.config.bad_timestamp {
                    BadTimestamp::Abort => {
                        return Err(Error::Timestamp {
                            column: name.clone(),
                            row: row + 1,
                            value: s.to_string(),
                        })
                    }
                    BadTimestamp::Null => {
                        debug!(row = row + 1, value = %s, "unparseable timestamp cleared");
                        nulled += 1;
                        None
                    }
                    BadTimestamp::Drop => {
                        debug!(row = row + 1, value = %s, "row with unparseable timestamp dropped");
                        keep[row] = false;
                        dropped += 1;
                        None
                    }
                },
            };
            values.push(value);
        }

        let mut order: Vec<usize> = (0..values.len()).filter(|&row| keep[row]).collect();
        let descending = self.config.descending;
        order.sort_by(|&a, &b| compare_timestamps(values[a], values[b], descending));
        let empty = order.iter().filter(|&&row| values[row].is_none()).count() - nulled;

        table
            .replace_column(index, Column::timestamps(values))
            .map_err(Error::Table)?;
        let indices: UInt64Array = order.into_iter().map(|row| row as u64).collect();
        let sorted = table.take(&indices)?;
        if nulled > 0 || dropped > 0 {
            warn!(nulled, dropped, "column held values that are not timestamps");
        }
        info!("sorting completed");
        Ok((
            sorted,
            SortOutcome::Sorted {
                empty,
                nulled,
                dropped,
            },
        ))
    }

    /// Writes `table` to the configured output path.
    ///
    /// The data goes to a temporary file next to the output first and is
    /// renamed into place only once complete. An existing output keeps its
    /// permissions; a new one is readable by everyone.
    ///
    /// # Errors
    ///
    /// Returns an error if the output cannot be written.
    pub fn write(&self, table: &Table) -> Result<()> {
        let output = &self.config.output;
        let delimiter = delimiter_byte(self.config.output_delimiter)?;
        let io_error = |source| Error::Io {
            path: output.clone(),
            source,
        };
        let dir = match output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut file = NamedTempFile::new_in(dir).map_err(io_error)?;
        let mut writer = csv::Writer::new(file.as_file_mut(), delimiter);
        csv::write_table(&mut writer, table).map_err(io_error)?;
        writer.finish().map_err(io_error)?;
        let permissions = match fs::metadata(output) {
            Ok(metadata) => Some(metadata.permissions()),
            Err(_) => default_permissions(),
        };
        if let Some(permissions) = permissions {
            file.as_file()
                .set_permissions(permissions)
                .map_err(io_error)?;
        }
        file.persist(output).map_err(|e| io_error(e.error))?;
        Ok(())
    }

    /// Runs discovery, loading, combining, sorting and writing in order.
    ///
    /// Files that fail to load are skipped and listed in the report.
    ///
    /// # Errors
    ///
    /// Returns an error if discovery fails, no file could be loaded, a
    /// timestamp is invalid under the `abort` policy, or writing fails. No
    /// output file is created in any of these cases.
    pub fn run(&self) -> Result<MergeReport> {
        let files = self.discover()?;
        info!(
            dir = %self.config.dir.display(),
            pattern = %self.config.pattern,
            "found {} files to merge",
            files.len()
        );

        let mut tables = Vec::with_capacity(files.len());
        let mut skipped = Vec::new();
        for path in &files {
            match self.load(path) {
                Ok(table) => {
                    info!(
                        file = %path.display(),
                        rows = table.num_rows(),
                        columns = table.num_columns(),
                        "loaded"
                    );
                    tables.push(table);
                }
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "skipping unreadable file");
                    skipped.push(SkippedFile {
                        path: path.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        let files_loaded = tables.len();

        let combined = self.combine(tables)?;
        let rows_loaded = combined.num_rows();
        info!("{rows_loaded} rows after merging");

        let (table, sort) = self.normalize_and_sort(combined)?;
        self.write(&table)?;
        info!(
            output = %self.config.output.display(),
            rows = table.num_rows(),
            "merged file written"
        );

        Ok(MergeReport {
            files_found: files.len(),
            files_loaded,
            skipped,
            rows_loaded,
            rows_written: table.num_rows(),
            sort,
            output: self.config.output.clone(),
        })
    }
}

#[cfg(unix)]
fn default_permissions() -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn default_permissions() -> Option<fs::Permissions> {
    None
}

/// Orders valid timestamps ascending (or descending), then empty ones.
fn compare_timestamps(a: Option<i64>, b: Option<i64>, descending: bool) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) if descending => b.cmp(&a),
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
