//! Global configuration for fdline runtime behavior.
//!
//! The chunk size K caps the number of bytes requested from the descriptor
//! per underlying read call. It never changes which lines are produced, only
//! how many reads it takes to produce them.
//!
//! K is fixed at build time through the `FDLINE_BUFFER_SIZE` environment
//! variable and can be overridden once at startup with [`set_chunk_size`].

use std::sync::atomic::{AtomicIsize, Ordering};

/// Chunk size used when `FDLINE_BUFFER_SIZE` is unset or unparsable.
pub const DEFAULT_CHUNK_SIZE: isize = 4096;

/// Largest region offered to a single read call (8 MB).
///
/// A chunk size above this still reads correctly; each read just asks for
/// at most this many bytes, so memory reserved per read stays bounded.
pub const MAX_READ_SIZE: usize = 8 * 1024 * 1024;

/// Raw value of `FDLINE_BUFFER_SIZE` captured when the crate was compiled.
const BUILD_CHUNK_SIZE: Option<&str> = option_env!("FDLINE_BUFFER_SIZE");

/// Sentinel meaning "no runtime override, use the build-time value".
const UNSET: isize = isize::MIN;

static CHUNK_SIZE_OVERRIDE: AtomicIsize = AtomicIsize::new(UNSET);

/// Chunk size baked in at build time.
///
/// Non-positive values are passed through untouched so that a bad build
/// flag surfaces as an invalid-input error on the first read instead of
/// being silently replaced.
pub fn build_chunk_size() -> isize {
    parse_chunk_size(BUILD_CHUNK_SIZE).unwrap_or(DEFAULT_CHUNK_SIZE)
}

fn parse_chunk_size(raw: Option<&str>) -> Option<isize> {
    raw?.trim().parse().ok()
}

/// Override the chunk size for readers constructed after this call.
///
/// # Example
///
/// ```
/// use fdline::config;
///
/// // Set at startup before building any reader
/// config::set_chunk_size(1);
/// assert_eq!(config::chunk_size(), 1);
/// config::reset_chunk_size();
/// ```
#[inline]
pub fn set_chunk_size(size: isize) {
    // isize::MIN is reserved as the unset marker; clamp it to another
    // equally invalid value.
    let size = if size == UNSET { UNSET + 1 } else { size };
    CHUNK_SIZE_OVERRIDE.store(size, Ordering::Release);
}

/// Drop any runtime override and fall back to the build-time value.
#[inline]
pub fn reset_chunk_size() {
    CHUNK_SIZE_OVERRIDE.store(UNSET, Ordering::Release);
}

/// Effective chunk size: the runtime override if set, otherwise the
/// build-time value.
#[inline]
pub fn chunk_size() -> isize {
    match CHUNK_SIZE_OVERRIDE.load(Ordering::Acquire) {
        UNSET => build_chunk_size(),
        size => size,
    }
}
