//! CSV and JSON output writers
//!
//! CSV output: a lazily written header (no records means no header), an
//! optional unquoted `*` marker column when subtables are present (the
//! marker cell is set only on the first physical row of each record),
//! double-quoted cells with embedded quotes doubled, absent cells emitted
//! as nothing at all, CRLF row endings.
//!
//! JSON output: `{"records": [...]}` streamed record by record, using each
//! record's unmodified wire JSON; flattening does not apply.

use crate::export::flatten::FlatRow;
use crate::export::schema::Column;
use std::io::Write;

/// Double embedded quotes; the caller wraps the result in quotes
pub(crate) fn escape_cell(s: &str) -> String {
    s.replace('"', "\"\"")
}

/// Writes flattened rows as CSV
pub(crate) struct CsvWriter<W: Write> {
    out: W,
    /// Whether the `*` marker column is present
    marker: bool,
    header_written: bool,
}

impl<W: Write> CsvWriter<W> {
    pub(crate) fn new(out: W, marker: bool) -> Self {
        Self {
            out,
            marker,
            header_written: false,
        }
    }

    /// Write the header line once; later calls are no-ops
    pub(crate) fn write_header(&mut self, columns: &[Column]) -> std::io::Result<()> {
        if self.header_written {
            return Ok(());
        }
        self.header_written = true;

        let mut cell_count = 0;
        if self.marker {
            self.out.write_all(b"*")?;
            cell_count += 1;
        }
        for column in columns {
            if cell_count > 0 {
                self.out.write_all(b",")?;
            }
            write!(self.out, "\"{}\"", escape_cell(&column.code))?;
            cell_count += 1;
        }
        self.out.write_all(b"\r\n")
    }

    /// Write one physical row
    pub(crate) fn write_row(&mut self, row: &FlatRow) -> std::io::Result<()> {
        let mut cell_count = 0;
        if self.marker {
            if row.first {
                self.out.write_all(b"*")?;
            }
            cell_count += 1;
        }
        for cell in &row.cells {
            if cell_count > 0 {
                self.out.write_all(b",")?;
            }
            // absent cells produce nothing between the separators
            if let Some(value) = cell {
                write!(self.out, "\"{}\"", escape_cell(value))?;
            }
            cell_count += 1;
        }
        self.out.write_all(b"\r\n")
    }

    pub(crate) fn finish(mut self) -> std::io::Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}

/// Writes raw record JSON as a streaming `{"records": [...]}` document
pub(crate) struct JsonWriter<W: Write> {
    out: W,
    written: u64,
}

impl<W: Write> JsonWriter<W> {
    pub(crate) fn new(mut out: W) -> std::io::Result<Self> {
        out.write_all(b"{\"records\": [\n")?;
        Ok(Self { out, written: 0 })
    }

    /// Append one record's wire JSON, unmodified
    pub(crate) fn write_record(&mut self, source: &serde_json::Value) -> std::io::Result<()> {
        if self.written > 0 {
            self.out.write_all(b",\n")?;
        }
        serde_json::to_writer(&mut self.out, source)?;
        self.written += 1;
        Ok(())
    }

    pub(crate) fn finish(mut self) -> std::io::Result<W> {
        self.out.write_all(b"\n]}")?;
        self.out.flush()?;
        Ok(self.out)
    }
}
