//! Generate synthetic line files for exercising the reader.
//!
//! Output is deterministic for a given seed, which makes it suitable for
//! comparing runs with different chunk sizes byte-for-byte.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::io::{self, BufWriter, Write};

/// Buffer size for generated output (1MB).
const BUF_SIZE: usize = 1024 * 1024;

/// Line count with an optional K or M suffix (1K, 1M).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeSpec {
    pub count: u64,
}

impl SizeSpec {
    /// Parse size from string (e.g., "1K", "5M", "100").
    pub fn from_str(s: &str) -> Option<Self> {
        let s = s.trim().to_uppercase();
        if s.is_empty() {
            return None;
        }

        let (num_part, multiplier) = if let Some(n) = s.strip_suffix('K') {
            (n, 1_000u64)
        } else if let Some(n) = s.strip_suffix('M') {
            (n, 1_000_000u64)
        } else if let Some(n) = s.strip_suffix('G') {
            (n, 1_000_000_000u64)
        } else {
            (s.as_str(), 1u64)
        };

        num_part
            .parse::<u64>()
            .ok()
            .and_then(|n| n.checked_mul(multiplier))
            .map(|count| Self { count })
    }
}

/// Configuration for synthetic line generation.
#[derive(Debug, Clone)]
pub struct GenerateConfig {
    /// Number of lines to write
    pub lines: u64,
    /// Minimum content bytes per line (newline excluded)
    pub min_len: usize,
    /// Maximum content bytes per line (newline excluded)
    pub max_len: usize,
    /// Random seed for reproducibility
    pub seed: u64,
    /// Terminate the last line with `\n`
    pub trailing_newline: bool,
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self {
            lines: 1000,
            min_len: 0,
            max_len: 120,
            seed: 42,
            trailing_newline: true,
        }
    }
}

/// Summary of a generation run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GenerateStats {
    pub lines: u64,
    pub bytes: u64,
    pub longest_line: usize,
}

impl std::fmt::Display for GenerateStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "lines={}, bytes={}, longest={}",
            self.lines, self.bytes, self.longest_line
        )
    }
}

/// Write `config.lines` lines of printable ASCII to `output`.
pub fn generate_lines<W: Write>(config: &GenerateConfig, output: W) -> io::Result<GenerateStats> {
    if config.min_len > config.max_len {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "min length {} exceeds max length {}",
                config.min_len, config.max_len
            ),
        ));
    }

    let mut rng = SmallRng::seed_from_u64(config.seed);
    let mut writer = BufWriter::with_capacity(BUF_SIZE, output);
    let mut stats = GenerateStats::default();
    let mut line = Vec::with_capacity(config.max_len + 1);

    for i in 0..config.lines {
        line.clear();
        let len = rng.gen_range(config.min_len..=config.max_len);
        line.extend((0..len).map(|_| rng.gen_range(b' '..=b'~')));

        let last = i + 1 == config.lines;
        if !last || config.trailing_newline {
            line.push(b'\n');
        }

        writer.write_all(&line)?;
        stats.lines += 1;
        stats.bytes += line.len() as u64;
        stats.longest_line = stats.longest_line.max(len);
    }

    writer.flush()?;
    Ok(stats)
}
