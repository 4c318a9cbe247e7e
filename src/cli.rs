use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::compress::CompressionLevel;

#[derive(Parser, Debug)]
#[command(name = "miniwr")]
#[command(version)]
#[command(about = "A small ZIP archiver", long_about = None)]
#[command(after_help = "Examples:\n  \
  miniwr a backup.zip notes/ todo.txt -m9   add a folder and a file at maximum compression\n  \
  miniwr x backup.zip -C restored          extract into ./restored, asking before overwriting\n  \
  miniwr l backup.zip -v                   list entries with sizes and dates")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Add files/folders to archive
    #[command(name = "a")]
    Add {
        /// Archive to create
        #[arg(value_name = "ARCHIVE")]
        archive: PathBuf,

        /// Files and folders to add
        #[arg(value_name = "PATHS", required = true)]
        paths: Vec<PathBuf>,

        /// Compression level (0=store, 9=max)
        #[arg(short = 'm', value_name = "0..9", default_value_t = 6,
              value_parser = clap::value_parser!(u8).range(0..=9))]
        level: u8,

        /// Number of compression threads
        #[arg(long, value_name = "N", default_value_t = 1,
              value_parser = clap::value_parser!(u32).range(1..))]
        threads: u32,
    },

    /// Extract archive contents
    #[command(name = "x")]
    Extract {
        /// Archive to extract
        #[arg(value_name = "ARCHIVE")]
        archive: PathBuf,

        /// Extract files into DIR (default: current directory)
        #[arg(short = 'C', value_name = "DIR")]
        output_dir: Option<PathBuf>,

        /// Overwrite existing files without asking
        #[arg(long)]
        force: bool,
    },

    /// List archive contents
    #[command(name = "l")]
    List {
        /// Archive to list
        #[arg(value_name = "ARCHIVE")]
        archive: PathBuf,

        /// Show sizes, compression ratio and timestamps
        #[arg(short = 'v')]
        verbose: bool,
    },
}

impl Command {
    /// Compression level selected with `-m`, for the add command.
    pub fn compression_level(&self) -> Option<CompressionLevel> {
        match self {
            Command::Add { level, .. } => CompressionLevel::from_digit(*level),
            _ => None,
        }
    }
}
