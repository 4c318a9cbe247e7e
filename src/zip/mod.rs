//! ZIP archive reading and writing.
//!
//! ## Architecture
//!
//! - [`structures`]: Data structures representing ZIP format elements (EOCD, file headers, etc.)
//! - [`parser`]: Low-level parsing of ZIP structures from raw bytes
//! - [`reader`]: Listing, verifying and extracting entries
//! - [`writer`]: Appending entries and writing the central directory
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! All integer fields are little-endian.
//!
//! ## Limitations
//!
//! - No encryption support
//! - No multi-disk archive support
//! - No ZIP64, so every size and offset must fit in 32 bits
//! - Only STORED and DEFLATE compression methods

pub mod date;
pub mod overwrite;
mod parser;
mod reader;
pub mod structures;
mod writer;

pub use date::DosDateTime;
pub use overwrite::{ConsolePrompt, Decision, NeverOverwrite, OverwritePrompt};
pub use parser::ZipParser;
pub use reader::{ArchiveReader, ExtractSummary};
pub use structures::{CompressionMethod, Entry};
pub use writer::{walk_directory, ArchiveWriter, SourceFile};
