//! Error types for archive reading, writing and compression.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while building or reading an archive.
#[derive(Debug, Error)]
pub enum Error {
    /// A source file passed to the writer does not exist.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// A source directory passed to the writer does not exist.
    #[error("directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    /// Malformed trailer, central directory or local header.
    #[error("invalid archive: {0}")]
    InvalidArchive(String),

    /// Extracted content does not match what the archive recorded.
    #[error("integrity check failed for '{name}': {detail}")]
    Integrity { name: String, detail: String },

    /// The compression backend failed while compressing.
    #[error("compression error: {0}")]
    Compression(String),

    /// The compression backend failed while decompressing.
    #[error("decompression error: {0}")]
    Decompression(String),

    /// The archive file could not be opened.
    #[error("failed to open archive {}: {source}", path.display())]
    ArchiveOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Writing to the archive failed. The archive is left in an undefined state.
    #[error("failed to write archive: {0}")]
    ArchiveWrite(#[source] io::Error),

    /// I/O on a source or destination file outside the archive itself.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("entry not found: {0}")]
    EntryNotFound(String),

    #[error("unknown compression backend: '{0}'")]
    UnknownBackend(String),

    #[error("archive writer is already closed")]
    WriterClosed,

    /// A size, offset or count does not fit a non-ZIP64 field.
    #[error("{0} exceeds the limits of the ZIP format (ZIP64 is not supported)")]
    LimitExceeded(&'static str),

    /// An entry name that would escape the output directory.
    #[error("refusing to extract unsafe entry name: '{0}'")]
    UnsafeEntryName(String),

    #[error("unsupported compression method: {0}")]
    UnsupportedCompression(u16),

    #[error("feature not supported: {0}")]
    UnsupportedFeature(&'static str),
}

/// Result type for archive operations.
pub type Result<T> = std::result::Result<T, Error>;
