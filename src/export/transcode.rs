//! Output character-set transcoding
//!
//! The writers produce UTF-8; this wrapper re-encodes the byte stream for
//! the configured output encoding. UTF-8 passes through untouched. The
//! Japanese encodings go through `encoding_rs`. UTF-16 is encoded directly
//! (two bytes per code unit, surrogate pairs from `encode_utf16`) because
//! `encoding_rs` only encodes to legacy encodings, and the `with-signature`
//! variants emit a byte-order mark before the first data byte.
//!
//! Callers may split multi-byte UTF-8 sequences across `write` calls; the
//! wrapper carries the incomplete tail to the next call.

use crate::config::OutputEncoding;
use std::io::Write;

#[derive(Clone, Copy)]
enum Mode {
    Passthrough,
    Utf16 { big_endian: bool, bom: bool },
    Legacy(&'static encoding_rs::Encoding),
}

/// `Write` adapter that re-encodes a UTF-8 byte stream
pub(crate) struct TranscodingWriter<W: Write> {
    inner: W,
    mode: Mode,
    /// Incomplete UTF-8 sequence carried between write calls (at most 3
    /// bytes)
    carry: Vec<u8>,
    bom_written: bool,
}

impl<W: Write> TranscodingWriter<W> {
    pub(crate) fn new(inner: W, encoding: OutputEncoding) -> Self {
        let mode = match encoding {
            OutputEncoding::Utf8 => Mode::Passthrough,
            OutputEncoding::Utf16 => Mode::Utf16 {
                big_endian: false,
                bom: false,
            },
            OutputEncoding::Utf16BeWithSignature => Mode::Utf16 {
                big_endian: true,
                bom: true,
            },
            OutputEncoding::Utf16LeWithSignature => Mode::Utf16 {
                big_endian: false,
                bom: true,
            },
            OutputEncoding::Sjis => Mode::Legacy(encoding_rs::SHIFT_JIS),
            OutputEncoding::EucJp => Mode::Legacy(encoding_rs::EUC_JP),
        };
        Self {
            inner,
            mode,
            carry: Vec::new(),
            bom_written: false,
        }
    }

    fn encode_str(&mut self, text: &str) -> std::io::Result<()> {
        match self.mode {
            Mode::Passthrough => self.inner.write_all(text.as_bytes()),
            Mode::Utf16 { big_endian, bom } => {
                if bom && !self.bom_written {
                    self.bom_written = true;
                    self.write_code_unit(0xFEFF, big_endian)?;
                }
                for unit in text.encode_utf16() {
                    self.write_code_unit(unit, big_endian)?;
                }
                Ok(())
            }
            Mode::Legacy(encoding) => {
                let (bytes, _, _) = encoding.encode(text);
                self.inner.write_all(&bytes)
            }
        }
    }

    fn write_code_unit(&mut self, unit: u16, big_endian: bool) -> std::io::Result<()> {
        let bytes = if big_endian {
            unit.to_be_bytes()
        } else {
            unit.to_le_bytes()
        };
        self.inner.write_all(&bytes)
    }

    /// Unwrap the inner writer; fails if an incomplete UTF-8 sequence is
    /// still pending
    pub(crate) fn finish(mut self) -> std::io::Result<W> {
        self.flush()?;
        if !self.carry.is_empty() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "output ended inside a UTF-8 sequence",
            ));
        }
        Ok(self.inner)
    }
}

impl<W: Write> Write for TranscodingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if matches!(self.mode, Mode::Passthrough) {
            self.inner.write_all(buf)?;
            return Ok(buf.len());
        }

        let mut pending = std::mem::take(&mut self.carry);
        pending.extend_from_slice(buf);

        let valid_len = match std::str::from_utf8(&pending) {
            Ok(_) => pending.len(),
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(_) => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "output is not valid UTF-8",
                ));
            }
        };

        // always succeeds: valid_len bounds the checked prefix
        if let Ok(text) = std::str::from_utf8(&pending[..valid_len]) {
            self.encode_str(text)?;
        }
        self.carry = pending[valid_len..].to_vec();
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}
