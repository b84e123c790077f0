//! Per-descriptor pending buffer.
//!
//! A session owns the bytes read from one descriptor that have not been
//! handed to the caller yet. Each call runs three steps against it:
//!
//! 1. **Fill**: read chunks until the buffer holds a newline or the stream ends
//! 2. **Extract**: copy out everything up to and including the first newline
//! 3. **Retain**: keep only the bytes after that newline
//!
//! Only bytes appended since the last scan are searched for a newline, and
//! returned lines are skipped with a consumed offset rather than shifted out.
//! The unreturned fragment is moved to the front only when another read is
//! needed, so a call costs O(line length) regardless of how many lines a
//! single read brought in.

use memchr::memchr;
use std::collections::TryReserveError;
use std::io;

/// Observable state of a descriptor's session.
///
/// A drained descriptor has no session, so it reports [`SessionState::Empty`]
/// again; the next call re-reads and sees end-of-stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No pending bytes.
    Empty,
    /// Pending bytes without a newline, stream not exhausted.
    Buffering,
    /// Pending bytes contain at least one newline.
    HasLine,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Empty => "empty",
            Self::Buffering => "buffering",
            Self::HasLine => "has-line",
        };
        f.write_str(name)
    }
}

/// Why a fill stopped short of a line.
#[derive(Debug)]
pub(crate) enum FillError {
    Read(io::Error),
    Alloc(TryReserveError),
}

#[derive(Debug, Default)]
pub(crate) struct Session {
    pending: Vec<u8>,
    /// Leading bytes of `pending` already returned to the caller.
    consumed: usize,
    /// Bytes of `pending` already searched without finding a newline.
    scanned: usize,
    /// Offset of the first unreturned newline in `pending`, once found.
    newline: Option<usize>,
    /// End-of-stream seen and every byte returned.
    exhausted: bool,
}

impl Session {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Bytes read but not yet returned.
    pub(crate) fn pending(&self) -> &[u8] {
        &self.pending[self.consumed..]
    }

    pub(crate) fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub(crate) fn state(&self) -> SessionState {
        let pending = self.pending();
        if self.newline.is_some() || memchr(b'\n', pending).is_some() {
            SessionState::HasLine
        } else if pending.is_empty() {
            SessionState::Empty
        } else {
            SessionState::Buffering
        }
    }

    /// Hand back the unreturned bytes, leaving the session empty.
    pub(crate) fn take_pending(&mut self) -> Vec<u8> {
        let mut pending = std::mem::take(&mut self.pending);
        pending.drain(..self.consumed);
        self.consumed = 0;
        self.scanned = 0;
        self.newline = None;
        pending
    }

    /// Produce the next line, reading through `read` as needed.
    ///
    /// `read` has the contract of [`ReadSource::read_fd`](crate::source::ReadSource::read_fd)
    /// for a fixed descriptor. Each call offers it a region of exactly
    /// `region` bytes, which must be non-zero.
    ///
    /// Returns `Ok(None)` once the stream is exhausted; the session is then
    /// spent and should be dropped. On error the pending bytes are left as
    /// they were before the failing read.
    pub(crate) fn next_line<F>(
        &mut self,
        region: usize,
        mut read: F,
    ) -> Result<Option<Vec<u8>>, FillError>
    where
        F: FnMut(&mut [u8]) -> io::Result<usize>,
    {
        if self.exhausted {
            return Ok(None);
        }

        let at_eof = self.fill(region, &mut read)?;

        match self.newline {
            Some(i) => Ok(Some(self.extract_through(i))),
            None => {
                debug_assert!(at_eof);
                let rest = self.take_pending();
                self.exhausted = true;
                if rest.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(rest))
                }
            }
        }
    }

    /// Read until a newline is buffered or the stream ends.
    ///
    /// Returns `true` if end-of-stream was observed.
    fn fill<F>(&mut self, region: usize, read: &mut F) -> Result<bool, FillError>
    where
        F: FnMut(&mut [u8]) -> io::Result<usize>,
    {
        self.scan();

        while self.newline.is_none() {
            self.compact();

            let start = self.pending.len();
            self.pending.try_reserve(region).map_err(FillError::Alloc)?;
            self.pending.resize(start + region, 0);

            let result = loop {
                match read(&mut self.pending[start..]) {
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    other => break other,
                }
            };

            match result {
                Ok(0) => {
                    self.pending.truncate(start);
                    return Ok(true);
                }
                Ok(n) => {
                    self.pending.truncate(start + n.min(region));
                    self.scan();
                }
                Err(e) => {
                    self.pending.truncate(start);
                    return Err(FillError::Read(e));
                }
            }
        }

        Ok(false)
    }

    fn scan(&mut self) {
        if self.newline.is_some() {
            return;
        }
        if let Some(i) = memchr(b'\n', &self.pending[self.scanned..]) {
            self.newline = Some(self.scanned + i);
        }
        self.scanned = self.pending.len();
    }

    /// Move the unreturned fragment to the front of the buffer.
    fn compact(&mut self) {
        if self.consumed == 0 {
            return;
        }
        self.pending.drain(..self.consumed);
        self.scanned -= self.consumed;
        self.consumed = 0;
    }

    /// Copy out `pending[consumed..=i]` as an owned line and skip past it.
    fn extract_through(&mut self, i: usize) -> Vec<u8> {
        let line = self.pending[self.consumed..=i].to_vec();
        self.newline = None;

        if i + 1 == self.pending.len() {
            self.pending.clear();
            self.consumed = 0;
            self.scanned = 0;
        } else {
            self.consumed = i + 1;
            self.scanned = i + 1;
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Feed `chunks` one per read call, then EOF. A chunk larger than the
    /// offered buffer is served over several calls.
    fn feeder(chunks: &[&[u8]]) -> impl FnMut(&mut [u8]) -> io::Result<usize> {
        let mut queue: Vec<Vec<u8>> = chunks.iter().rev().map(|c| c.to_vec()).collect();
        move |buf: &mut [u8]| match queue.pop() {
            Some(mut chunk) => {
                let n = chunk.len().min(buf.len());
                buf[..n].copy_from_slice(&chunk[..n]);
                if n < chunk.len() {
                    queue.push(chunk.split_off(n));
                }
                Ok(n)
            }
            None => Ok(0),
        }
    }

    fn line(
        session: &mut Session,
        region: usize,
        read: impl FnMut(&mut [u8]) -> io::Result<usize>,
    ) -> Option<Vec<u8>> {
        match session.next_line(region, read) {
            Ok(line) => line,
            Err(e) => panic!("unexpected fill error: {:?}", e),
        }
    }

    #[test]
    fn test_line_split_across_chunks() {
        let mut session = Session::new();
        let mut read = feeder(&[b"ab", b"c\nd", b"e\n"]);

        assert_eq!(line(&mut session, 8, &mut read), Some(b"abc\n".to_vec()));
        assert_eq!(session.pending(), b"d");
        assert_eq!(session.state(), SessionState::Buffering);

        assert_eq!(line(&mut session, 8, &mut read), Some(b"de\n".to_vec()));
        assert_eq!(session.state(), SessionState::Empty);

        assert_eq!(line(&mut session, 8, &mut read), None);
        assert!(session.is_exhausted());
    }

    #[test]
    fn test_buffered_lines_need_no_read() {
        let mut session = Session::new();
        let mut read = feeder(&[b"a\nb\nc"]);

        assert_eq!(line(&mut session, 16, &mut read), Some(b"a\n".to_vec()));
        assert_eq!(session.state(), SessionState::HasLine);

        let mut calls = 0;
        let next = line(&mut session, 16, |_| {
            calls += 1;
            Ok(0)
        });
        assert_eq!(next, Some(b"b\n".to_vec()));
        assert_eq!(calls, 0);
        assert_eq!(session.pending(), b"c");
    }

    #[test]
    fn test_consumed_lines_are_not_shifted() {
        let mut session = Session::new();
        let mut read = feeder(&[b"one\ntwo\nthree\nfour"]);

        assert_eq!(line(&mut session, 64, &mut read), Some(b"one\n".to_vec()));
        let base = session.pending.as_ptr();
        assert_eq!(line(&mut session, 64, &mut read), Some(b"two\n".to_vec()));
        assert_eq!(line(&mut session, 64, &mut read), Some(b"three\n".to_vec()));

        // Still the same allocation with the returned prefix skipped in place
        assert_eq!(session.pending.as_ptr(), base);
        assert_eq!(session.consumed, 14);
        assert_eq!(session.pending(), b"four");

        // The next read compacts the fragment to the front first
        assert_eq!(line(&mut session, 64, &mut read), Some(b"four".to_vec()));
        assert!(session.is_exhausted());
    }

    #[test]
    fn test_compaction_keeps_fragment() {
        let mut session = Session::new();
        let mut read = feeder(&[b"a\nbc", b"d\n"]);

        assert_eq!(line(&mut session, 4, &mut read), Some(b"a\n".to_vec()));
        assert_eq!(line(&mut session, 4, &mut read), Some(b"bcd\n".to_vec()));
        assert_eq!(session.consumed, 0);
        assert_eq!(line(&mut session, 4, &mut read), None);
    }

    #[test]
    fn test_partial_final_line_then_exhausted() {
        let mut session = Session::new();
        let mut read = feeder(&[b"tail"]);

        assert_eq!(line(&mut session, 2, &mut read), Some(b"tail".to_vec()));
        assert!(session.is_exhausted());
        assert_eq!(session.pending().len(), 0);
        assert_eq!(line(&mut session, 2, &mut read), None);
    }

    #[test]
    fn test_padding_never_leaks() {
        let mut session = Session::new();
        // Offer 64 bytes per read, source fills only 3.
        let mut read = feeder(&[b"xyz"]);

        assert_eq!(line(&mut session, 64, &mut read), Some(b"xyz".to_vec()));
    }

    #[test]
    fn test_error_keeps_pending() {
        let mut session = Session::new();
        let mut step = 0;
        let err = session
            .next_line(4, |buf: &mut [u8]| {
                step += 1;
                if step == 1 {
                    buf[..3].copy_from_slice(b"abc");
                    Ok(3)
                } else {
                    Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
                }
            })
            .unwrap_err();

        match err {
            FillError::Read(e) => assert_eq!(e.kind(), io::ErrorKind::BrokenPipe),
            other => panic!("expected read error, got {:?}", other),
        }
        assert_eq!(session.pending(), b"abc");
        assert_eq!(session.state(), SessionState::Buffering);

        let mut read = feeder(&[b"d\n"]);
        assert_eq!(line(&mut session, 4, &mut read), Some(b"abcd\n".to_vec()));
    }

    #[test]
    fn test_interrupted_is_retried() {
        let mut session = Session::new();
        let mut step = 0;
        let next = line(&mut session, 8, |buf: &mut [u8]| {
            step += 1;
            match step {
                1 => Err(io::Error::from(io::ErrorKind::Interrupted)),
                2 => {
                    buf[..2].copy_from_slice(b"x\n");
                    Ok(2)
                }
                _ => Ok(0),
            }
        });
        assert_eq!(next, Some(b"x\n".to_vec()));
        assert_eq!(step, 2);
    }

    #[test]
    fn test_unreservable_region_is_an_error() {
        let mut session = Session::new();
        let mut read = feeder(&[b"never\n"]);

        let err = session.next_line(usize::MAX, &mut read).unwrap_err();
        assert!(matches!(err, FillError::Alloc(_)));
        assert!(session.pending().is_empty());
        assert!(!session.is_exhausted());
    }

    #[test]
    fn test_take_pending() {
        let mut session = Session::new();
        let mut read = feeder(&[b"one\ntwo"]);
        line(&mut session, 32, &mut read);

        assert_eq!(session.take_pending(), b"two".to_vec());
        assert_eq!(session.state(), SessionState::Empty);
    }
}
