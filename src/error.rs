use std::path::PathBuf;

use arrow::error::ArrowError;
use thiserror::Error;

use crate::csv::ReadError;

/// Errors that can occur while merging tables.
#[derive(Debug, Error)]
pub enum Error {
    /// A file system operation failed.
    #[error("cannot access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file name pattern is not a valid glob.
    #[error("invalid file pattern \"{pattern}\": {message}")]
    Pattern { pattern: String, message: String },

    /// A delimiter is not a single-byte character.
    #[error("delimiter {0:?} is not an ASCII character")]
    Delimiter(char),

    /// The workbook could not be opened or decoded.
    #[error("cannot read workbook {}: {source}", path.display())]
    Workbook {
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },

    /// The requested worksheet does not exist in the workbook.
    #[error("worksheet \"{sheet}\" not found in {}", path.display())]
    SheetNotFound { path: PathBuf, sheet: String },

    /// The workbook has no worksheet at all.
    #[error("no worksheet in {}", path.display())]
    EmptyWorkbook { path: PathBuf },

    /// The file has no header row.
    #[error("no header row in {}", path.display())]
    EmptyFile { path: PathBuf },

    /// Delimited text input is malformed.
    #[error("cannot read {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: ReadError,
    },

    #[error(transparent)]
    Arrow(#[from] ArrowError),

    #[error("invalid table: {0}")]
    Table(&'static str),

    /// None of the discovered files could be loaded.
    #[error("no file matching \"{pattern}\" in {} was read successfully", dir.display())]
    NoInput { dir: PathBuf, pattern: String },

    /// A timestamp value could not be parsed.
    #[error("cannot convert \"{value}\" in column \"{column}\" (row {row}) to a timestamp")]
    Timestamp {
        column: String,
        row: usize,
        value: String,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
