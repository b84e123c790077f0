//! Buffered line output for the harness.
//!
//! Uses itoa for line-number formatting to avoid allocation in the hot path.

use std::io::{self, BufWriter, Write};

/// Buffer size for LineWriter (2MB default).
const DEFAULT_BUFFER_SIZE: usize = 2 * 1024 * 1024;

/// Writes lines exactly as read, optionally prefixed with a line number.
///
/// Lines are written byte-for-byte; a final line without `\n` stays without
/// one, so `cat` output reproduces the input stream.
pub struct LineWriter<W: Write> {
    writer: BufWriter<W>,
    itoa_buf: itoa::Buffer,
    number: bool,
    written: u64,
}

impl<W: Write> LineWriter<W> {
    /// Create a new LineWriter with the default 2MB buffer.
    pub fn new(output: W) -> Self {
        Self::with_capacity(DEFAULT_BUFFER_SIZE, output)
    }

    /// Create a new LineWriter with the given buffer size.
    pub fn with_capacity(capacity: usize, output: W) -> Self {
        Self {
            writer: BufWriter::with_capacity(capacity, output),
            itoa_buf: itoa::Buffer::new(),
            number: false,
            written: 0,
        }
    }

    /// Prefix each line with its 1-based number and a tab.
    pub fn numbered(mut self, number: bool) -> Self {
        self.number = number;
        self
    }

    #[inline]
    pub fn write_line(&mut self, line: &[u8]) -> io::Result<()> {
        self.written += 1;
        if self.number {
            self.writer
                .write_all(self.itoa_buf.format(self.written).as_bytes())?;
            self.writer.write_all(b"\t")?;
        }
        self.writer.write_all(line)
    }

    /// Number of lines written so far.
    pub fn lines_written(&self) -> u64 {
        self.written
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    /// Flush and return the inner writer.
    pub fn into_inner(self) -> io::Result<W> {
        self.writer.into_inner().map_err(|e| e.into_error())
    }
}
