//! Output sink: a two-column Markdown table.
//!
//! ```text
//! |TLD|WHOIS SERVER|
//! |---|---|
//! |COM|whois.verisign-grs.com|
//! ```
//!
//! The sink has a single writer (the collector), so it does no locking.

use crate::error::TldWhoisError;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Column separator of the output table.
pub const SEPARATOR: char = '|';

/// Markdown table writer over any `Write`.
pub struct TableSink<W: Write> {
    writer: W,
    /// Location used in error messages
    path: String,
    rows: usize,
}

impl TableSink<BufWriter<File>> {
    /// Create (or replace) the output file at `path`.
    ///
    /// # Errors
    ///
    /// Returns `TldWhoisError::SinkError` if an existing file cannot be
    /// removed or the new one cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, TldWhoisError> {
        let path = path.as_ref();
        let display = path.display().to_string();

        if path.exists() {
            fs::remove_file(path).map_err(|e| {
                TldWhoisError::sink(&display, format!("Failed to remove existing file: {}", e))
            })?;
        }

        let file = File::create(path)
            .map_err(|e| TldWhoisError::sink(&display, format!("Failed to create file: {}", e)))?;

        Ok(Self {
            writer: BufWriter::new(file),
            path: display,
            rows: 0,
        })
    }
}

impl<W: Write> TableSink<W> {
    /// Wrap an arbitrary writer.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            path: "<writer>".to_string(),
            rows: 0,
        }
    }

    /// Write the header row and the Markdown alignment row.
    pub fn write_header(
        &mut self,
        identifier_column: &str,
        attribute_column: &str,
    ) -> Result<(), TldWhoisError> {
        self.write_line(identifier_column, attribute_column)?;
        self.write_line("---", "---")
    }

    /// Append one data row.
    pub fn write_row(&mut self, identifier: &str, attribute: &str) -> Result<(), TldWhoisError> {
        self.write_line(identifier, attribute)?;
        self.rows += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), TldWhoisError> {
        self.writer
            .flush()
            .map_err(|e| TldWhoisError::sink(&self.path, format!("Failed to flush: {}", e)))
    }

    /// Number of data rows written so far (header excluded).
    pub fn rows_written(&self) -> usize {
        self.rows
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_line(&mut self, left: &str, right: &str) -> Result<(), TldWhoisError> {
        writeln!(
            self.writer,
            "{sep}{}{sep}{}{sep}",
            escape_cell(left),
            escape_cell(right),
            sep = SEPARATOR
        )
        .map_err(|e| TldWhoisError::sink(&self.path, format!("Failed to write row: {}", e)))
    }
}

/// Keep a cell from breaking the table layout.
fn escape_cell(cell: &str) -> String {
    cell.replace(SEPARATOR, "\\|").replace(['\r', '\n'], " ")
}
