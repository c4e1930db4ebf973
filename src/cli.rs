//! Command line interface for the `wirestream` binary.
//!
//! The binary streams a file, or standard input, through an in-process
//! receiver and reports what was reassembled. It exists to exercise both
//! halves of the protocol end to end and to generate the man page.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Where the receiver keeps segments.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// Keep segments in memory.
    #[default]
    Memory,
    /// Write each segment to its own file.
    Filesystem,
}

/// Command line arguments for the `wirestream` binary.
#[derive(Debug, Parser)]
#[command(
    name = "wirestream",
    version,
    about = "Stream bytes through a segmented, retrying transfer"
)]
pub struct Cli {
    /// File to send; reads standard input when omitted.
    pub input: Option<PathBuf>,

    /// Segment storage used by the receiver.
    #[arg(short, long, value_enum, default_value_t = Backend::Memory)]
    pub backend: Backend,

    /// Base directory for the filesystem backend.
    #[arg(short, long, default_value = ".wirestream")]
    pub dir: PathBuf,

    /// Bytes per segment.
    #[arg(short, long, default_value_t = 64 * 1024, value_parser = clap::value_parser!(u32).range(1..))]
    pub chunk_size: u32,

    /// Seconds of inactivity before the receiver evicts a stream.
    #[arg(short, long, default_value_t = 600)]
    pub timeout: u64,

    /// Attempts per segment before the transfer is abandoned.
    #[arg(long, default_value_t = 20, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_attempts: u32,
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use clap::Parser;

    use super::{Backend, Cli};

    #[test]
    fn defaults_read_stdin_into_memory() {
        let cli = Cli::parse_from(["wirestream"]);
        assert!(cli.input.is_none());
        assert_eq!(cli.backend, Backend::Memory);
        assert_eq!(cli.chunk_size, 64 * 1024);
        assert_eq!(cli.timeout, 600);
    }

    #[test]
    fn parses_filesystem_options() {
        let cli = Cli::parse_from([
            "wirestream",
            "--backend",
            "filesystem",
            "--dir",
            "/tmp/segments",
            "--chunk-size",
            "4",
            "data.bin",
        ]);
        assert_eq!(cli.backend, Backend::Filesystem);
        assert_eq!(cli.dir, PathBuf::from("/tmp/segments"));
        assert_eq!(cli.chunk_size, 4);
        assert_eq!(cli.input.as_deref(), Some(Path::new("data.bin")));
    }

    #[test]
    fn rejects_zero_chunk_size() {
        assert!(Cli::try_parse_from(["wirestream", "--chunk-size", "0"]).is_err());
    }
}
