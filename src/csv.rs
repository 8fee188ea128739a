//! An interface to CSV (comma-separated values).

pub(crate) mod reader;
pub(crate) mod writer;

use std::fs::File;
use std::path::Path;

use crate::error::{Error, Result};
use crate::table::Table;

pub use reader::{read_table, ReadError, Record};
pub use writer::{write_table, Writer};

/// Loads a delimited text file whose first record is the header.
///
/// # Errors
///
/// Returns an error if the file cannot be opened, is empty, or holds
/// malformed text.
pub fn load(path: &Path, delimiter: u8) -> Result<Table> {
    let file = File::open(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read_table(file, delimiter).map_err(|source| match source {
        ReadError::NoHeader => Error::EmptyFile {
            path: path.to_path_buf(),
        },
        ReadError::Io(source) => Error::Io {
            path: path.to_path_buf(),
            source,
        },
        source @ ReadError::Utf8 { .. } => Error::Csv {
            path: path.to_path_buf(),
            source,
        },
    })
}
