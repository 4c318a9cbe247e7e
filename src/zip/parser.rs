//! Low-level ZIP archive parser.
//!
//! This module handles the binary parsing of ZIP file structures,
//! reading from any source that implements the [`ReadAt`] trait.
//!
//! ## Parsing Strategy
//!
//! ZIP files are designed to be read from the end:
//! 1. Find the End of Central Directory (EOCD) at the file's end
//! 2. Read the Central Directory to get metadata for all files
//! 3. For extraction, read each file's Local File Header and data

use std::io;

use tracing::debug;

use crate::error::{Error, Result};
use crate::io::ReadAt;

use super::structures::*;

/// Low-level ZIP file parser.
///
/// Generic over the reader type so the same code serves local files and
/// in-memory archives. Typically used through
/// [`ArchiveReader`](super::ArchiveReader) rather than directly.
#[derive(Debug)]
pub struct ZipParser<R: ReadAt> {
    /// The underlying data source
    reader: R,
    /// Total size of the archive in bytes
    size: u64,
}

impl<R: ReadAt> ZipParser<R> {
    pub fn new(reader: R) -> Self {
        let size = reader.size();
        Self { reader, size }
    }

    /// Read exactly `buf.len()` bytes at `offset`, treating a short source as a
    /// malformed archive.
    fn read_at(&self, offset: u64, buf: &mut [u8], what: &str) -> Result<()> {
        self.reader.read_exact_at(offset, buf).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                Error::InvalidArchive(format!("{what} extends past the end of the archive"))
            } else {
                Error::Io(e)
            }
        })
    }

    /// Find and parse the End of Central Directory record.
    ///
    /// The last `22 + 65535` bytes are scanned backwards for the signature. A
    /// candidate whose comment length reaches exactly to the end of the file
    /// wins; failing that, the match closest to the end is used, which keeps
    /// archives with trailing junk readable.
    ///
    /// # Returns
    ///
    /// A tuple of (EOCD record, offset of EOCD in file).
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArchive`] if no signature exists in the search window.
    pub fn find_eocd(&self) -> Result<(EndOfCentralDirectory, u64)> {
        let record_size = EndOfCentralDirectory::SIZE as u64;
        if self.size < record_size {
            return Err(Error::InvalidArchive(
                "file too small to hold an end of central directory record".into(),
            ));
        }

        let search_size = (MAX_COMMENT_SIZE + record_size).min(self.size);
        let search_start = self.size - search_size;

        let mut buf = vec![0u8; search_size as usize];
        self.read_at(search_start, &mut buf, "end of central directory search window")?;

        let signature = EndOfCentralDirectory::SIGNATURE.to_le_bytes();
        let mut fallback = None;

        for i in (0..=buf.len() - EndOfCentralDirectory::SIZE).rev() {
            if buf[i..i + 4] != signature {
                continue;
            }

            let comment_len = u16::from_le_bytes([buf[i + 20], buf[i + 21]]) as usize;
            if comment_len == buf.len() - i - EndOfCentralDirectory::SIZE {
                let eocd = EndOfCentralDirectory::from_bytes(&buf[i..i + EndOfCentralDirectory::SIZE])?;
                return Ok((eocd, search_start + i as u64));
            }
            fallback.get_or_insert(i);
        }

        match fallback {
            Some(i) => {
                debug!(offset = search_start + i as u64, "EOCD comment length does not reach end of file");
                let eocd = EndOfCentralDirectory::from_bytes(&buf[i..i + EndOfCentralDirectory::SIZE])?;
                Ok((eocd, search_start + i as u64))
            }
            None => Err(Error::InvalidArchive(
                "end of central directory record not found".into(),
            )),
        }
    }

    /// List all entries in the ZIP archive.
    ///
    /// Reads the EOCD first, then fetches the entire Central Directory in one
    /// read and parses exactly as many headers as the trailer announces.
    pub fn list_entries(&self) -> Result<Vec<Entry>> {
        let (eocd, eocd_offset) = self.find_eocd()?;

        if eocd.is_multi_disk() {
            return Err(Error::UnsupportedFeature("multi-volume archives"));
        }
        if eocd.is_zip64() {
            return Err(Error::UnsupportedFeature("ZIP64 archives"));
        }

        let cd_offset = eocd.cd_offset as u64;
        let cd_size = eocd.cd_size as u64;
        if cd_offset + cd_size > eocd_offset {
            return Err(Error::InvalidArchive(format!(
                "central directory ({cd_size} bytes at {cd_offset}) overlaps its trailer at {eocd_offset}"
            )));
        }

        let mut cd_data = vec![0u8; cd_size as usize];
        self.read_at(cd_offset, &mut cd_data, "central directory")?;

        let mut entries = Vec::with_capacity(eocd.total_entries as usize);
        let mut position = 0usize;

        for _ in 0..eocd.total_entries {
            let (entry, consumed) = parse_cdfh(&cd_data[position..])?;
            debug!(
                name = %entry.name,
                offset = entry.header_offset,
                compressed = entry.compressed_size,
                "parsed central directory header"
            );
            position += consumed;
            entries.push(entry);
        }

        Ok(entries)
    }

    /// Get the actual data offset for an entry.
    ///
    /// The Local File Header has variable-length fields (filename, extra field)
    /// that may differ from the Central Directory entry, so they are read from
    /// the local header itself.
    pub fn data_offset(&self, entry: &Entry) -> Result<u64> {
        let mut lfh_buf = [0u8; LocalFileHeader::SIZE];
        self.read_at(entry.header_offset as u64, &mut lfh_buf, "local file header")?;

        let lfh = LocalFileHeader::from_bytes(&lfh_buf)?;
        Ok(entry.header_offset as u64 + LocalFileHeader::SIZE as u64 + lfh.variable_data_size() as u64)
    }

    /// Read the raw (possibly compressed) payload of an entry.
    pub fn read_payload(&self, entry: &Entry) -> Result<Vec<u8>> {
        let data_offset = self.data_offset(entry)?;
        let compressed_size = entry.compressed_size as u64;
        if data_offset + compressed_size > self.size {
            return Err(Error::InvalidArchive(format!(
                "payload of '{}' ({compressed_size} bytes at {data_offset}) extends past the end of the archive",
                entry.name
            )));
        }

        let mut payload = vec![0u8; compressed_size as usize];
        self.read_at(data_offset, &mut payload, "entry payload")?;
        Ok(payload)
    }
}

/// Parse one Central Directory File Header from the front of `data`.
///
/// Returns the entry and the number of bytes the record occupies, including
/// its file name, extra field and comment.
fn parse_cdfh(data: &[u8]) -> Result<(Entry, usize)> {
    let header = CentralDirectoryHeader::from_bytes(data)?;

    let total = CentralDirectoryHeader::SIZE + header.variable_data_size();
    if data.len() < total {
        return Err(Error::InvalidArchive(
            "central directory header extends past the central directory".into(),
        ));
    }

    let name_end = CentralDirectoryHeader::SIZE + header.file_name_length as usize;
    // Use lossy conversion to handle non-UTF8 filenames gracefully
    let name = String::from_utf8_lossy(&data[CentralDirectoryHeader::SIZE..name_end]).into_owned();

    Ok((Entry::from_central(&header, name), total))
}
