//! # miniwr
//!
//! A small ZIP archiver: pack files and folders into a standard ZIP container and
//! extract them again with CRC-32 verification.
//!
//! The crate is split into a container codec ([`zip`]) and a pluggable block
//! compression layer ([`compress`]). Readers and writers each own a
//! [`Backend`] and drive it one entry at a time.
//!
//! ## Features
//!
//! - STORED and DEFLATE entries, four compression levels
//! - Central directory discovery that tolerates archive comments
//! - CRC-32 verification of every extracted entry
//! - POSIX permission bits and DOS timestamps preserved
//!
//! ## Example
//!
//! ```no_run
//! use miniwr::{ArchiveReader, ArchiveWriter, CompressionLevel, ConsolePrompt};
//!
//! let mut writer = ArchiveWriter::create("backup.zip")?;
//! writer.add_directory("notes", CompressionLevel::Default)?;
//! writer.close()?;
//!
//! let mut reader = ArchiveReader::open("backup.zip")?;
//! for name in reader.list_files() {
//!     println!("{name}");
//! }
//! reader.extract_all("restored", false, &mut ConsolePrompt::stdio())?;
//! # Ok::<(), miniwr::Error>(())
//! ```

pub mod cli;
pub mod compress;
mod error;
pub mod io;
pub mod zip;

pub use cli::Cli;
pub use compress::{Backend, BackendKind, CompressionLevel, Compressor, DeflateCompressor};
pub use error::{Error, Result};
pub use io::{LocalFileReader, ReadAt};
pub use zip::{
    ArchiveReader, ArchiveWriter, ConsolePrompt, Decision, Entry, ExtractSummary, NeverOverwrite,
    OverwritePrompt,
};
