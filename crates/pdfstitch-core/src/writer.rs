//! Position-tracking byte writer for PDF output
//!
//! Every write primitive advances `position` by the exact number of bytes
//! emitted, so callers can record cross-reference offsets as they go.

use std::io::Write;

use crate::error::PdfStitchError;

/// Append-only writer that counts every byte it emits.
pub struct CountingWriter<W: Write> {
    inner: W,
    position: u64,
}

impl<W: Write> CountingWriter<W> {
    pub fn new(inner: W) -> Self {
        CountingWriter { inner, position: 0 }
    }

    /// Byte offset of the next write.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Append raw bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), PdfStitchError> {
        self.inner.write_all(bytes)?;
        self.position += bytes.len() as u64;
        Ok(())
    }

    /// Append the ASCII decimal representation of `n`.
    pub fn write_int(&mut self, n: u64) -> Result<(), PdfStitchError> {
        self.write_bytes(n.to_string().as_bytes())
    }

    /// Append `n` left-padded with ASCII `'0'` to exactly `width` characters.
    ///
    /// Used for 10-digit xref offsets.
    pub fn write_long_padded(&mut self, n: u64, width: usize) -> Result<(), PdfStitchError> {
        self.write_bytes(format!("{n:0width$}").as_bytes())
    }

    /// Append `s` as a PDF hexadecimal string literal: `<FEFF` followed by
    /// the uppercase hex of the UTF-16BE encoding, closed with `>`.
    pub fn write_hex_string(&mut self, s: &str) -> Result<(), PdfStitchError> {
        let mut literal = String::with_capacity(6 + s.len() * 4);
        literal.push_str("<FEFF");
        for unit in s.encode_utf16() {
            literal.push_str(&format!("{unit:04X}"));
        }
        literal.push('>');
        self.write_bytes(literal.as_bytes())
    }

    /// Append the ASCII bytes of `s` with no escaping.
    ///
    /// The caller must not pass strings containing unbalanced parentheses
    /// or backslashes.
    pub fn write_ascii_string(&mut self, s: &str) -> Result<(), PdfStitchError> {
        self.write_bytes(s.as_bytes())
    }

    pub fn flush(&mut self) -> Result<(), PdfStitchError> {
        self.inner.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(f: impl FnOnce(&mut CountingWriter<&mut Vec<u8>>)) -> Vec<u8> {
        let mut out = Vec::new();
        let mut writer = CountingWriter::new(&mut out);
        f(&mut writer);
        out
    }

    #[test]
    fn test_position_counts_every_byte() {
        let mut out = Vec::new();
        let mut writer = CountingWriter::new(&mut out);
        writer.write_bytes(b"%PDF-1.4\n").unwrap();
        writer.write_int(1234).unwrap();
        assert_eq!(writer.position(), 13);
        assert_eq!(writer.position(), out.len() as u64);
    }

    #[test]
    fn test_write_int_decimal() {
        let out = collect(|w| w.write_int(0).unwrap());
        assert_eq!(out, b"0");
        let out = collect(|w| w.write_int(1000002).unwrap());
        assert_eq!(out, b"1000002");
    }

    #[test]
    fn test_write_long_padded_xref_width() {
        let out = collect(|w| w.write_long_padded(15, 10).unwrap());
        assert_eq!(out, b"0000000015");
        let out = collect(|w| w.write_long_padded(9_999_999_999, 10).unwrap());
        assert_eq!(out, b"9999999999");
    }

    #[test]
    fn test_write_hex_string_ascii() {
        let out = collect(|w| w.write_hex_string("A").unwrap());
        assert_eq!(out, b"<FEFF0041>");
    }

    #[test]
    fn test_write_hex_string_non_ascii() {
        // U+00E9 is a single UTF-16 unit; U+1F600 encodes as a surrogate pair.
        let out = collect(|w| w.write_hex_string("é").unwrap());
        assert_eq!(out, b"<FEFF00E9>");
        let out = collect(|w| w.write_hex_string("😀").unwrap());
        assert_eq!(out, b"<FEFFD83DDE00>");
    }

    #[test]
    fn test_write_ascii_string_verbatim() {
        let out = collect(|w| w.write_ascii_string("http://example.com/a?b=1").unwrap());
        assert_eq!(out, b"http://example.com/a?b=1");
    }
}
