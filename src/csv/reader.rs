use crate::header;
use crate::table::Table;
use csv_core::ReadRecordResult;
use std::io::{self, BufRead, BufReader, Read};
use std::str;
use thiserror::Error;

const INITIAL_FIELDS_CAPACITY: usize = 1024;
const INITIAL_ENDS_CAPACITY: usize = 64;

/// A single record of delimited text.
pub struct Record {
    fields: Vec<u8>,
    ends: Vec<usize>,
}

impl Record {
    /// Reads the next record from `input`, or `None` at the end of input.
    ///
    /// # Errors
    ///
    /// Returns an error if reading from `input` fails.
    pub fn from_buf(
        reader: &mut csv_core::Reader,
        input: &mut dyn BufRead,
    ) -> io::Result<Option<Self>> {
        let mut fields = vec![0; INITIAL_FIELDS_CAPACITY];
        let mut ends = vec![0; INITIAL_ENDS_CAPACITY];
        let (mut outlen, mut endlen) = (0, 0);
        loop {
            let (res, nin, nout, nend) = {
                let buf = input.fill_buf()?;
                reader.read_record(buf, &mut fields[outlen..], &mut ends[endlen..])
            };
            input.consume(nin);
            outlen += nout;
            endlen += nend;
            match res {
                ReadRecordResult::InputEmpty => continue,
                ReadRecordResult::OutputFull => {
                    fields.resize(std::cmp::max(4, fields.len().saturating_mul(2)), 0);
                }
                ReadRecordResult::OutputEndsFull => {
                    ends.resize(std::cmp::max(4, ends.len().saturating_mul(2)), 0);
                }
                ReadRecordResult::Record => {
                    fields.truncate(outlen);
                    ends.truncate(endlen);
                    return Ok(Some(Self { fields, ends }));
                }
                ReadRecordResult::End => return Ok(None),
            }
        }
    }

    /// Returns the number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ends.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ends.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn get(&self, i: usize) -> Option<&[u8]> {
        let end = match self.ends.get(i) {
            None => return None,
            Some(&end) => end,
        };
        let start = match i.checked_sub(1).and_then(|i| self.ends.get(i)) {
            None => 0,
            Some(&start) => start,
        };
        Some(&self.fields[start..end])
    }

    /// Decodes the first `width` fields as text; missing and empty fields
    /// are `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if a field is not valid UTF-8.
    pub fn cells(&self, width: usize) -> Result<Vec<Option<String>>, str::Utf8Error> {
        (0..width)
            .map(|i| match self.get(i) {
                Some(field) if !field.is_empty() => str::from_utf8(field).map(|s| Some(s.to_string())),
                _ => Ok(None),
            })
            .collect()
    }
}

/// Failure to read delimited text.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("no header row")]
    NoHeader,
    /// The 1-based record number, header included.
    #[error("record {record} is not valid UTF-8: {source}")]
    Utf8 {
        record: usize,
        #[source]
        source: str::Utf8Error,
    },
}

/// Reads delimited text whose first record is the header.
///
/// Records in which every field is empty are skipped.
///
/// # Errors
///
/// Returns an error if reading fails, there is no header, or a field is not
/// valid UTF-8.
pub fn read_table<R: Read>(input: R, delimiter: u8) -> Result<Table, ReadError> {
    let mut input = BufReader::new(input);
    let mut reader = csv_core::ReaderBuilder::new().delimiter(delimiter).build();
    let header = Record::from_buf(&mut reader, &mut input)?.ok_or(ReadError::NoHeader)?;
    let raw_names = header
        .cells(header.len())
        .map_err(|source| ReadError::Utf8 { record: 1, source })?;
    let names = header::normalize(raw_names);

    let mut rows = Vec::new();
    let mut record_no = 1;
    while let Some(record) = Record::from_buf(&mut reader, &mut input)? {
        record_no += 1;
        let cells = record.cells(names.len()).map_err(|source| ReadError::Utf8 {
            record: record_no,
            source,
        })?;
        if cells.iter().any(Option::is_some) {
            rows.push(cells);
        }
    }
    Ok(Table::from_rows(&names, &rows))
}
