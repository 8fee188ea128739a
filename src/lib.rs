//! Merges spreadsheet exports into one chronologically sorted table.
//!
//! The files of a directory that match a glob pattern are loaded as tables,
//! concatenated, sorted by a timestamp column and written as delimited text.
//!
//! ```no_run
//! use sheetmerge::{MergeConfig, Merger};
//!
//! let config = MergeConfig::new("files", "report.csv").with_pattern("*.xlsx");
//! let report = Merger::new(config).run()?;
//! println!("{} rows written", report.rows_written);
//! # Ok::<(), sheetmerge::Error>(())
//! ```

pub mod config;
pub mod csv;
mod error;
pub mod excel;
mod header;
mod merge;
mod table;
pub mod timestamp;

pub use arrow;
pub use config::{InputFormat, MergeConfig};
pub use error::{Error, Result};
pub use merge::{MergeReport, Merger, SkippedFile, SortOutcome};
pub use table::{Column, StringIter, Table, TypeError};
pub use timestamp::{BadTimestamp, EpochUnit};
