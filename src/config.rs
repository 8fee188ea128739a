//! Configuration for the merge process.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::error::{Error, Result};
use crate::timestamp::{BadTimestamp, EpochUnit};

pub const DEFAULT_DIR: &str = "files";
pub const DEFAULT_PATTERN: &str = "*.xlsx";
pub const DEFAULT_TIMESTAMP_COLUMN: &str = "Timestamp";
pub const DEFAULT_OUTPUT: &str = "report_unito_ordinato.csv";

/// File extensions read as delimited text when the format is `auto`.
const TEXT_EXTENSIONS: [&str; 3] = ["csv", "tsv", "txt"];

/// How input files are decoded.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Display, EnumString, Eq, PartialEq, Serialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum InputFormat {
    /// Chosen per file from its extension.
    #[default]
    Auto,
    Excel,
    Csv,
}

impl InputFormat {
    /// Resolves `Auto` to a concrete format for `path`.
    #[must_use]
    pub fn for_path(self, path: &Path) -> Self {
        match self {
            Self::Auto => {
                let is_text = path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| {
                        TEXT_EXTENSIONS
                            .iter()
                            .any(|known| ext.eq_ignore_ascii_case(known))
                    });
                if is_text {
                    Self::Csv
                } else {
                    Self::Excel
                }
            }
            other => other,
        }
    }
}

/// Configuration for the merge process.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Directory searched for input files.
    pub dir: PathBuf,

    /// Glob pattern matched against file names in `dir`.
    pub pattern: String,

    /// Column parsed as time and used as the sort key.
    pub timestamp_column: String,

    /// Path of the merged file.
    pub output: PathBuf,

    pub input_format: InputFormat,

    /// Worksheet to read from workbooks. If None, reads the first one.
    pub sheet: Option<String>,

    /// Field delimiter of delimited-text inputs.
    pub input_delimiter: char,

    pub output_delimiter: char,

    pub bad_timestamp: BadTimestamp,

    /// Unit of plain numbers in the timestamp column.
    pub epoch_unit: EpochUnit,

    /// Sorts newest first when set.
    pub descending: bool,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_DIR),
            pattern: DEFAULT_PATTERN.to_string(),
            timestamp_column: DEFAULT_TIMESTAMP_COLUMN.to_string(),
            output: PathBuf::from(DEFAULT_OUTPUT),
            input_format: InputFormat::default(),
            sheet: None,
            input_delimiter: ',',
            output_delimiter: ',',
            bad_timestamp: BadTimestamp::default(),
            epoch_unit: EpochUnit::default(),
            descending: false,
        }
    }
}

impl MergeConfig {
    /// Creates a configuration reading `dir` and writing `output`.
    pub fn new(dir: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            output: output.into(),
            ..Default::default()
        }
    }

    /// Sets the file name pattern.
    #[must_use]
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    /// Sets the timestamp column name.
    #[must_use]
    pub fn with_timestamp_column(mut self, column: impl Into<String>) -> Self {
        self.timestamp_column = column.into();
        self
    }

    #[must_use]
    pub fn with_input_format(mut self, format: InputFormat) -> Self {
        self.input_format = format;
        self
    }

    #[must_use]
    pub fn with_sheet(mut self, sheet: Option<String>) -> Self {
        self.sheet = sheet;
        self
    }

    #[must_use]
    pub fn with_input_delimiter(mut self, delimiter: char) -> Self {
        self.input_delimiter = delimiter;
        self
    }

    #[must_use]
    pub fn with_output_delimiter(mut self, delimiter: char) -> Self {
        self.output_delimiter = delimiter;
        self
    }

    #[must_use]
    pub fn with_bad_timestamp(mut self, policy: BadTimestamp) -> Self {
        self.bad_timestamp = policy;
        self
    }

    #[must_use]
    pub fn with_epoch_unit(mut self, unit: EpochUnit) -> Self {
        self.epoch_unit = unit;
        self
    }

    #[must_use]
    pub fn with_descending(mut self, descending: bool) -> Self {
        self.descending = descending;
        self
    }
}

/// Converts a delimiter to the single byte the CSV machinery works with.
pub(crate) fn delimiter_byte(delimiter: char) -> Result<u8> {
    u8::try_from(delimiter)
        .ok()
        .filter(u8::is_ascii)
        .ok_or(Error::Delimiter(delimiter))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn defaults() {
        let config = MergeConfig::default();
        assert_eq!(config.dir, Path::new("files"));
        assert_eq!(config.pattern, "*.xlsx");
        assert_eq!(config.timestamp_column, "Timestamp");
        assert_eq!(config.output, Path::new("report_unito_ordinato.csv"));
        assert_eq!(config.bad_timestamp, BadTimestamp::Abort);
        assert!(!config.descending);
    }

    #[test]
    fn deserialize_partial() {
        let config: MergeConfig = serde_json::from_str(
            r#"{"dir": "exports", "input_format": "csv", "bad_timestamp": "drop", "epoch_unit": "ms"}"#,
        )
        .unwrap();
        assert_eq!(config.dir, Path::new("exports"));
        assert_eq!(config.input_format, InputFormat::Csv);
        assert_eq!(config.bad_timestamp, BadTimestamp::Drop);
        assert_eq!(config.epoch_unit, EpochUnit::Milliseconds);
        assert_eq!(config.pattern, DEFAULT_PATTERN);
    }

    #[test]
    fn format_by_extension() {
        let auto = InputFormat::Auto;
        assert_eq!(auto.for_path(Path::new("a/b.CSV")), InputFormat::Csv);
        assert_eq!(auto.for_path(Path::new("b.tsv")), InputFormat::Csv);
        assert_eq!(auto.for_path(Path::new("b.xlsx")), InputFormat::Excel);
        assert_eq!(auto.for_path(Path::new("b")), InputFormat::Excel);
        assert_eq!(
            InputFormat::Csv.for_path(Path::new("b.xlsx")),
            InputFormat::Csv
        );
        assert_eq!(InputFormat::from_str("excel"), Ok(InputFormat::Excel));
    }

    #[test]
    fn delimiters() {
        assert_eq!(delimiter_byte(';').unwrap(), b';');
        assert_eq!(delimiter_byte('\t').unwrap(), b'\t');
        assert!(matches!(delimiter_byte('é'), Err(Error::Delimiter('é'))));
        assert!(matches!(delimiter_byte('€'), Err(Error::Delimiter('€'))));
    }
}
