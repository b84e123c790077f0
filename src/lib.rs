// Clippy allows for the whole crate
#![allow(clippy::should_implement_trait)]

//! fdline: incremental line reading from file descriptors
//!
//! Each call to [`LineReader::next_line`] returns the next newline-terminated
//! (or end-of-stream-terminated) line of a descriptor, buffering any bytes
//! read past that line for the next call.
//!
//! # Features
//!
//! - **Per-descriptor sessions**: interleave reads across descriptors freely
//! - **Configurable chunk size**: set at build time via `FDLINE_BUFFER_SIZE`
//! - **Raw bytes**: no encoding or line-ending translation
//!
//! # Example
//!
//! ```rust,no_run
//! use fdline::{LineReader, SysSource};
//!
//! let mut reader = LineReader::new(SysSource::new());
//! while let Some(line) = reader.line(0) {
//!     print!("{}", String::from_utf8_lossy(&line));
//! }
//! ```

pub mod config;
pub mod generate;
pub mod output;
pub mod reader;
pub mod session;
pub mod source;

// Re-export commonly used types
pub use output::LineWriter;
pub use reader::{LineError, LineReader, Lines, ReaderStats, Result};
pub use session::SessionState;
#[cfg(unix)]
pub use source::SysSource;
pub use source::{Fd, MemorySource, ReadSource};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::reader::{LineError, LineReader, ReaderStats};
    pub use crate::session::SessionState;
    #[cfg(unix)]
    pub use crate::source::SysSource;
    pub use crate::source::{Fd, MemorySource, ReadSource};
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_basic_workflow() {
        use crate::{LineReader, MemorySource};

        let source = MemorySource::new()
            .with_stream(3, &b"a1\na2\n"[..])
            .with_stream(4, &b"b1\nb2"[..]);
        let mut reader = LineReader::with_chunk_size(source, 2);

        assert_eq!(reader.line(3), Some(b"a1\n".to_vec()));
        assert_eq!(reader.line(4), Some(b"b1\n".to_vec()));
        assert_eq!(reader.line(3), Some(b"a2\n".to_vec()));
        assert_eq!(reader.line(4), Some(b"b2".to_vec()));
        assert_eq!(reader.line(3), None);
        assert_eq!(reader.line(4), None);
        assert_eq!(reader.session_count(), 0);
    }
}
