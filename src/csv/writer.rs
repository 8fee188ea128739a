use crate::table::Table;
use csv_core::WriteResult;
use std::io::{self, Write};

const BUFFER_SIZE: usize = 8 * 1024;

/// Writes records of delimited text, quoting fields only where needed.
pub struct Writer<W: Write> {
    inner: W,
    core: csv_core::Writer,
    buf: Vec<u8>,
    pos: usize,
}

impl<W: Write> Writer<W> {
    pub fn new(inner: W, delimiter: u8) -> Self {
        Self {
            inner,
            core: csv_core::WriterBuilder::new().delimiter(delimiter).build(),
            buf: vec![0; BUFFER_SIZE],
            pos: 0,
        }
    }

    /// Writes one record followed by a line terminator.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to the underlying writer fails.
    pub fn write_record<I, F>(&mut self, fields: I) -> io::Result<()>
    where
        I: IntoIterator<Item = F>,
        F: AsRef<[u8]>,
    {
        for (i, field) in fields.into_iter().enumerate() {
            if i > 0 {
                self.delimiter()?;
            }
            self.field(field.as_ref())?;
        }
        self.terminator()
    }

    fn field(&mut self, mut input: &[u8]) -> io::Result<()> {
        loop {
            let (res, nin, nout) = self.core.field(input, &mut self.buf[self.pos..]);
            input = &input[nin..];
            self.pos += nout;
            match res {
                WriteResult::InputEmpty => return Ok(()),
                WriteResult::OutputFull => self.flush_buf()?,
            }
        }
    }

    fn delimiter(&mut self) -> io::Result<()> {
        loop {
            let (res, nout) = self.core.delimiter(&mut self.buf[self.pos..]);
            self.pos += nout;
            match res {
                WriteResult::InputEmpty => return Ok(()),
                WriteResult::OutputFull => self.flush_buf()?,
            }
        }
    }

    fn terminator(&mut self) -> io::Result<()> {
        loop {
            let (res, nout) = self.core.terminator(&mut self.buf[self.pos..]);
            self.pos += nout;
            match res {
                WriteResult::InputEmpty => return Ok(()),
                WriteResult::OutputFull => self.flush_buf()?,
            }
        }
    }

    fn flush_buf(&mut self) -> io::Result<()> {
        self.inner.write_all(&self.buf[..self.pos])?;
        self.pos = 0;
        Ok(())
    }

    /// Flushes everything written so far and returns the underlying writer.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to the underlying writer fails.
    pub fn finish(mut self) -> io::Result<W> {
        loop {
            let (res, nout) = self.core.finish(&mut self.buf[self.pos..]);
            self.pos += nout;
            match res {
                WriteResult::InputEmpty => break,
                WriteResult::OutputFull => self.flush_buf()?,
            }
        }
        self.flush_buf()?;
        self.inner.flush()?;
        Ok(self.inner)
    }
}

/// Writes `table` as a header record followed by one record per row. Null
/// cells become empty fields.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_table<W: Write>(writer: &mut Writer<W>, table: &Table) -> io::Result<()> {
    writer.write_record(table.column_names())?;
    let mut cells = Vec::with_capacity(table.num_columns());
    for row in 0..table.num_rows() {
        cells.clear();
        cells.extend(table.columns().map(|c| c.display_value(row).unwrap_or_default()));
        writer.write_record(&cells)?;
    }
    Ok(())
}
