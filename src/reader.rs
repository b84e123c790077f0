//! Per-descriptor line reader.
//!
//! [`LineReader`] keeps one [`Session`] per descriptor in a map it owns, so
//! callers can interleave reads from any number of descriptors without their
//! buffers bleeding into each other. A session is destroyed as soon as its
//! descriptor reaches end-of-stream, so a closed and reopened descriptor
//! number starts over cleanly. Dropping the reader frees every session.

use crate::config;
use crate::session::{FillError, Session, SessionState};
use crate::source::{Fd, ReadSource};
use log::{debug, trace};
use rustc_hash::FxHashMap;
use std::collections::TryReserveError;
use std::io;
use std::iter::FusedIterator;
use thiserror::Error;

/// Errors that can occur while reading lines.
#[derive(Error, Debug)]
pub enum LineError {
    #[error("Invalid descriptor: {0}")]
    InvalidDescriptor(Fd),

    #[error("Invalid chunk size: {0} (must be positive)")]
    InvalidChunkSize(isize),

    #[error("Read error on descriptor {fd}: {source}")]
    Read {
        fd: Fd,
        #[source]
        source: io::Error,
    },

    #[error("Cannot buffer {requested} more bytes for descriptor {fd}: {source}")]
    Alloc {
        fd: Fd,
        requested: usize,
        #[source]
        source: TryReserveError,
    },
}

impl LineError {
    /// True for errors raised before any read was attempted.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidDescriptor(_) | Self::InvalidChunkSize(_))
    }
}

pub type Result<T> = std::result::Result<T, LineError>;

/// Counters kept across all descriptors of a reader.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReaderStats {
    /// Read calls issued to the source (failed calls included)
    pub reads: usize,
    /// Bytes returned by the source
    pub bytes_read: u64,
    /// Lines returned to callers
    pub lines: usize,
    /// Final lines returned without a trailing newline
    pub partial_lines: usize,
    /// Sessions created
    pub sessions_opened: usize,
    /// Sessions destroyed at end-of-stream
    pub sessions_closed: usize,
    /// Calls that ended in a read error
    pub read_errors: usize,
}

impl ReaderStats {
    /// Average bytes delivered per read call.
    pub fn bytes_per_read(&self) -> f64 {
        if self.reads == 0 {
            0.0
        } else {
            self.bytes_read as f64 / self.reads as f64
        }
    }
}

impl std::fmt::Display for ReaderStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "reads={}, bytes={}, lines={}, partial={}, sessions={}/{}, errors={}, bytes/read={:.1}",
            self.reads,
            self.bytes_read,
            self.lines,
            self.partial_lines,
            self.sessions_closed,
            self.sessions_opened,
            self.read_errors,
            self.bytes_per_read()
        )
    }
}

/// Incremental newline-delimited reader over a [`ReadSource`].
///
/// # Example
///
/// ```
/// use fdline::{LineReader, MemorySource};
///
/// let source = MemorySource::new().with_stream(0, &b"first\nsecond"[..]);
/// let mut reader = LineReader::with_chunk_size(source, 4);
///
/// assert_eq!(reader.next_line(0).unwrap(), Some(b"first\n".to_vec()));
/// assert_eq!(reader.next_line(0).unwrap(), Some(b"second".to_vec()));
/// assert_eq!(reader.next_line(0).unwrap(), None);
/// ```
#[derive(Debug)]
pub struct LineReader<S> {
    source: S,
    chunk_size: isize,
    sessions: FxHashMap<Fd, Session>,
    stats: ReaderStats,
}

impl<S: ReadSource> LineReader<S> {
    /// Create a reader using the configured chunk size (see [`config::chunk_size`]).
    pub fn new(source: S) -> Self {
        Self::with_chunk_size(source, config::chunk_size())
    }

    /// Create a reader with an explicit chunk size.
    ///
    /// A non-positive `chunk_size` is accepted here and rejected by every
    /// subsequent [`next_line`](Self::next_line) call.
    pub fn with_chunk_size(source: S, chunk_size: isize) -> Self {
        Self {
            source,
            chunk_size,
            sessions: FxHashMap::default(),
            stats: ReaderStats::default(),
        }
    }

    /// Return the next line from `fd`.
    ///
    /// A returned line includes its trailing `\n`, except for a final line
    /// that ends at end-of-stream. `Ok(None)` means the descriptor is
    /// exhausted; its session is destroyed, and a later call for the same
    /// descriptor number reads again from a fresh session.
    ///
    /// Each read asks for `min(chunk size, MAX_READ_SIZE)` bytes (see
    /// [`config::MAX_READ_SIZE`]). Invalid input (negative `fd`,
    /// non-positive chunk size) is rejected before any session is created or
    /// any read is issued. A read error leaves already-buffered bytes in
    /// place.
    pub fn next_line(&mut self, fd: Fd) -> Result<Option<Vec<u8>>> {
        if fd < 0 {
            return Err(LineError::InvalidDescriptor(fd));
        }
        if self.chunk_size <= 0 {
            return Err(LineError::InvalidChunkSize(self.chunk_size));
        }
        let region = (self.chunk_size as usize).min(config::MAX_READ_SIZE);

        let Self {
            source,
            sessions,
            stats,
            ..
        } = self;

        let session = sessions.entry(fd).or_insert_with(|| {
            debug!("fd {}: opening session ({} bytes per read)", fd, region);
            stats.sessions_opened += 1;
            Session::new()
        });

        let result = session.next_line(region, |buf| {
            stats.reads += 1;
            let result = source.read_fd(fd, buf);
            if let Ok(n) = result {
                trace!("fd {}: read {} of {} bytes", fd, n, buf.len());
                stats.bytes_read += n as u64;
            }
            result
        });

        match result {
            Ok(line) => {
                if let Some(ref line) = line {
                    stats.lines += 1;
                    if line.last() != Some(&b'\n') {
                        stats.partial_lines += 1;
                    }
                }
                if session.is_exhausted() {
                    sessions.remove(&fd);
                    stats.sessions_closed += 1;
                    debug!("fd {}: end of stream, session destroyed", fd);
                }
                Ok(line)
            }
            Err(FillError::Read(source)) => {
                stats.read_errors += 1;
                debug!(
                    "fd {}: read failed with {} bytes pending: {}",
                    fd,
                    session.pending().len(),
                    source
                );
                Err(LineError::Read { fd, source })
            }
            Err(FillError::Alloc(source)) => {
                debug!("fd {}: cannot reserve {} bytes: {}", fd, region, source);
                Err(LineError::Alloc {
                    fd,
                    requested: region,
                    source,
                })
            }
        }
    }

    /// Sentinel form of [`next_line`](Self::next_line): every outcome that
    /// produces no line collapses into `None`.
    pub fn line(&mut self, fd: Fd) -> Option<Vec<u8>> {
        self.next_line(fd).ok().flatten()
    }

    /// Iterate over the remaining lines of `fd`.
    ///
    /// The iterator ends at end-of-stream or after yielding the first error.
    pub fn lines(&mut self, fd: Fd) -> Lines<'_, S> {
        Lines {
            reader: self,
            fd,
            done: false,
        }
    }
}

impl<S> LineReader<S> {
    /// Drop the session for `fd`, returning its unreturned bytes.
    ///
    /// Returns `None` if the descriptor had no session. A later call for the
    /// same descriptor starts from a fresh, empty session.
    pub fn discard(&mut self, fd: Fd) -> Option<Vec<u8>> {
        let mut session = self.sessions.remove(&fd)?;
        let pending = session.take_pending();
        debug!("fd {}: session discarded with {} bytes pending", fd, pending.len());
        Some(pending)
    }

    /// Bytes read from `fd` but not yet returned.
    pub fn pending(&self, fd: Fd) -> &[u8] {
        self.sessions.get(&fd).map(Session::pending).unwrap_or(&[])
    }

    /// Current state of the session for `fd`. Descriptors without a session,
    /// including drained ones, report [`SessionState::Empty`].
    pub fn state(&self, fd: Fd) -> SessionState {
        self.sessions
            .get(&fd)
            .map_or(SessionState::Empty, Session::state)
    }

    /// Number of descriptors with a live session.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn chunk_size(&self) -> isize {
        self.chunk_size
    }

    pub fn stats(&self) -> &ReaderStats {
        &self.stats
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Consume the reader, dropping all sessions, and return the source.
    pub fn into_source(self) -> S {
        self.source
    }
}

/// Iterator over the lines of one descriptor.
pub struct Lines<'a, S> {
    reader: &'a mut LineReader<S>,
    fd: Fd,
    done: bool,
}

impl<S: ReadSource> Iterator for Lines<'_, S> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.next_line(self.fd) {
            Ok(Some(line)) => Some(Ok(line)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl<S: ReadSource> FusedIterator for Lines<'_, S> {}
