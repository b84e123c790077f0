//! Byte-oriented read primitives consumed by the line reader.
//!
//! A [`ReadSource`] reads at most `buf.len()` bytes from a descriptor.
//! `Ok(0)` signals end-of-stream and `Err` signals a failed read.

use rustc_hash::FxHashMap;
use std::io;

/// Descriptor identifier. Negative values are never valid.
pub type Fd = i32;

/// Read primitive keyed by descriptor.
pub trait ReadSource {
    /// Read up to `buf.len()` bytes from `fd` into the front of `buf`.
    ///
    /// Returns the number of bytes written, `0` at end-of-stream.
    fn read_fd(&mut self, fd: Fd, buf: &mut [u8]) -> io::Result<usize>;
}

impl<S: ReadSource + ?Sized> ReadSource for &mut S {
    #[inline]
    fn read_fd(&mut self, fd: Fd, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read_fd(fd, buf)
    }
}

/// Reads from raw OS descriptors with `read(2)`.
///
/// The source does not own the descriptors; opening and closing them is the
/// caller's job.
#[cfg(unix)]
#[derive(Debug, Default, Clone, Copy)]
pub struct SysSource;

#[cfg(unix)]
impl SysSource {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(unix)]
impl ReadSource for SysSource {
    fn read_fd(&mut self, fd: Fd, buf: &mut [u8]) -> io::Result<usize> {
        // SAFETY: `buf` is a valid, writable region of exactly `buf.len()` bytes.
        let n = unsafe { libc::read(fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
        if n < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(n as usize)
        }
    }
}

/// Scripted failure for [`MemorySource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fault {
    /// Zero-based index of the read call on this descriptor that fails.
    at_read: usize,
    kind: io::ErrorKind,
}

#[derive(Debug, Default)]
struct MemoryStream {
    data: Vec<u8>,
    pos: usize,
    reads: usize,
    largest_request: usize,
    max_per_read: Option<usize>,
    faults: Vec<Fault>,
}

/// In-memory descriptor table.
///
/// Each registered descriptor serves its bytes in order. Reads can be capped
/// to simulate short reads from pipes and sockets, and individual read calls
/// can be scripted to fail. Every call is counted, including calls for
/// unknown descriptors, which fail with [`io::ErrorKind::NotFound`].
#[derive(Debug, Default)]
pub struct MemorySource {
    streams: FxHashMap<Fd, MemoryStream>,
    calls: usize,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `data` as the full contents of `fd`, replacing any stream
    /// previously registered under that descriptor.
    pub fn insert(&mut self, fd: Fd, data: impl Into<Vec<u8>>) -> &mut Self {
        self.streams.insert(
            fd,
            MemoryStream {
                data: data.into(),
                ..MemoryStream::default()
            },
        );
        self
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with_stream(mut self, fd: Fd, data: impl Into<Vec<u8>>) -> Self {
        self.insert(fd, data);
        self
    }

    /// Cap every read on `fd` to at most `max` bytes, regardless of the
    /// buffer the caller offers.
    pub fn limit_reads(&mut self, fd: Fd, max: usize) -> &mut Self {
        if let Some(stream) = self.streams.get_mut(&fd) {
            stream.max_per_read = Some(max.max(1));
        }
        self
    }

    /// Make the read call with zero-based index `at_read` on `fd` fail with
    /// `kind`. The stream position is not advanced by a failed call.
    pub fn fail_read(&mut self, fd: Fd, at_read: usize, kind: io::ErrorKind) -> &mut Self {
        if let Some(stream) = self.streams.get_mut(&fd) {
            stream.faults.push(Fault { at_read, kind });
        }
        self
    }

    /// Total read calls served across all descriptors.
    pub fn calls(&self) -> usize {
        self.calls
    }

    /// Read calls served for `fd`.
    pub fn calls_for(&self, fd: Fd) -> usize {
        self.streams.get(&fd).map_or(0, |s| s.reads)
    }

    /// Largest buffer any read call on `fd` was offered.
    pub fn largest_request(&self, fd: Fd) -> usize {
        self.streams.get(&fd).map_or(0, |s| s.largest_request)
    }

    /// Bytes of `fd` not yet handed out.
    pub fn remaining(&self, fd: Fd) -> usize {
        self.streams
            .get(&fd)
            .map_or(0, |s| s.data.len().saturating_sub(s.pos))
    }
}

impl ReadSource for MemorySource {
    fn read_fd(&mut self, fd: Fd, buf: &mut [u8]) -> io::Result<usize> {
        self.calls += 1;

        let stream = self.streams.get_mut(&fd).ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("unknown descriptor {}", fd))
        })?;

        let index = stream.reads;
        stream.reads += 1;
        stream.largest_request = stream.largest_request.max(buf.len());

        if let Some(fault) = stream.faults.iter().find(|f| f.at_read == index) {
            return Err(io::Error::new(
                fault.kind,
                format!("injected failure on read {} of descriptor {}", index, fd),
            ));
        }

        let available = &stream.data[stream.pos..];
        let mut n = available.len().min(buf.len());
        if let Some(max) = stream.max_per_read {
            n = n.min(max);
        }
        buf[..n].copy_from_slice(&available[..n]);
        stream.pos += n;
        Ok(n)
    }
}
