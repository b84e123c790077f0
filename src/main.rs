//! fdline: line-at-a-time reader harness
//!
//! Usage: fdline <COMMAND> [OPTIONS]

use clap::{Parser, Subcommand};
use std::fs::File;
use std::io;
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};
use std::process;
use thiserror::Error;

use fdline::generate::{generate_lines, GenerateConfig, SizeSpec};
use fdline::{config, Fd, LineError, LineReader, LineWriter, SysSource};

#[derive(Parser)]
#[command(name = "fdline")]
#[command(author = "Manish Kumar Bobbili")]
#[command(version)]
#[command(about = "fdline: read files one line at a time through per-descriptor buffers", long_about = None)]
struct Cli {
    /// Bytes requested per read call. Overrides the build-time
    /// FDLINE_BUFFER_SIZE value; non-positive values are rejected on the
    /// first read.
    #[arg(long, short = 'b', global = true, allow_negative_numbers = true)]
    buffer_size: Option<isize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print files line by line (use - for stdin)
    Cat {
        /// Input files (default: stdin)
        files: Vec<PathBuf>,

        /// Read one line from each input in turn instead of one input at a time
        #[arg(long)]
        interleave: bool,

        /// Prefix each line with its output line number
        #[arg(short = 'n', long)]
        number: bool,

        /// Print reader statistics to stderr
        #[arg(long)]
        stats: bool,
    },

    /// Generate a synthetic line file
    Generate {
        /// Output file
        #[arg(short, long)]
        output: PathBuf,

        /// Number of lines (e.g., 100, 10K, 1M)
        #[arg(short, long, default_value = "1K")]
        lines: String,

        /// Minimum bytes per line, newline excluded
        #[arg(long, default_value = "0")]
        min_len: usize,

        /// Maximum bytes per line, newline excluded
        #[arg(long, default_value = "120")]
        max_len: usize,

        /// Random seed for reproducibility
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Leave the last line without a trailing newline
        #[arg(long)]
        no_trailing_newline: bool,

        /// Print generation statistics to stderr
        #[arg(long)]
        stats: bool,
    },
}

#[derive(Error, Debug)]
enum HarnessError {
    #[error(transparent)]
    Line(#[from] LineError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Cannot open '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    // Must be set before any reader is constructed
    if let Some(size) = cli.buffer_size {
        config::set_chunk_size(size);
    }

    let result = match cli.command {
        Commands::Cat {
            files,
            interleave,
            number,
            stats,
        } => run_cat(files, interleave, number, stats),

        Commands::Generate {
            output,
            lines,
            min_len,
            max_len,
            seed,
            no_trailing_newline,
            stats,
        } => run_generate(
            output,
            lines,
            min_len,
            max_len,
            seed,
            no_trailing_newline,
            stats,
        ),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// An input opened for reading. Files stay open until the run finishes.
enum Input {
    Stdin,
    File(File),
}

impl Input {
    fn open(path: &Path) -> Result<Self, HarnessError> {
        if path.to_string_lossy() == "-" {
            return Ok(Self::Stdin);
        }
        File::open(path)
            .map(Self::File)
            .map_err(|source| HarnessError::Open {
                path: path.to_path_buf(),
                source,
            })
    }

    fn fd(&self) -> Fd {
        match self {
            Self::Stdin => io::stdin().as_raw_fd(),
            Self::File(file) => file.as_raw_fd(),
        }
    }
}

fn run_cat(
    files: Vec<PathBuf>,
    interleave: bool,
    number: bool,
    stats: bool,
) -> Result<(), HarnessError> {
    let inputs = if files.is_empty() {
        vec![Input::Stdin]
    } else {
        files.iter().map(|path| Input::open(path)).collect::<Result<Vec<_>, _>>()?
    };
    let fds: Vec<Fd> = inputs.iter().map(Input::fd).collect();

    let mut reader = LineReader::new(SysSource::new());
    let stdout = io::stdout();
    let mut writer = LineWriter::new(stdout.lock()).numbered(number);

    if interleave {
        let mut active = fds;
        while !active.is_empty() {
            let mut still_open = Vec::with_capacity(active.len());
            for fd in active {
                if let Some(line) = reader.next_line(fd)? {
                    writer.write_line(&line)?;
                    still_open.push(fd);
                }
            }
            active = still_open;
        }
    } else {
        for fd in fds {
            while let Some(line) = reader.next_line(fd)? {
                writer.write_line(&line)?;
            }
        }
    }

    writer.flush()?;

    if stats {
        eprintln!("Line reader stats: {}", reader.stats());
    }

    // Descriptors must stay open until every read above has finished.
    drop(inputs);
    Ok(())
}

fn run_generate(
    output: PathBuf,
    lines: String,
    min_len: usize,
    max_len: usize,
    seed: u64,
    no_trailing_newline: bool,
    stats: bool,
) -> Result<(), HarnessError> {
    let lines = SizeSpec::from_str(&lines).ok_or_else(|| {
        HarnessError::InvalidArgument(format!(
            "Invalid line count '{}'. Use formats like 1K, 5M, 100",
            lines
        ))
    })?;

    let config = GenerateConfig {
        lines: lines.count,
        min_len,
        max_len,
        seed,
        trailing_newline: !no_trailing_newline,
    };

    let file = File::create(&output).map_err(|source| HarnessError::Open {
        path: output.clone(),
        source,
    })?;
    let result = generate_lines(&config, file)?;

    if stats {
        eprintln!("Generate stats: {}", result);
    }

    Ok(())
}
