use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info};

use crate::compress::{Backend, Compressor};
use crate::error::{Error, Result};
use crate::io::{LocalFileReader, ReadAt};

use super::overwrite::{Decision, OverwritePrompt};
use super::parser::ZipParser;
use super::structures::{CompressionMethod, Entry};

/// Outcome of [`ArchiveReader::extract_all`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExtractSummary {
    /// Entries written to disk (including directory entries).
    pub extracted: usize,
    /// Names of entries left alone because the destination already existed.
    pub skipped: Vec<String>,
}

/// Reads an existing ZIP archive.
///
/// The central directory is parsed once when the reader is created and kept
/// for its whole lifetime; entries are then decompressed and CRC-checked on
/// demand.
#[derive(Debug)]
pub struct ArchiveReader<R: ReadAt> {
    parser: ZipParser<R>,
    backend: Backend,
    entries: Vec<Entry>,
}

impl ArchiveReader<LocalFileReader> {
    /// Open the archive at `path` and parse its central directory.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let reader = LocalFileReader::new(path).map_err(|source| Error::ArchiveOpen {
            path: path.to_path_buf(),
            source,
        })?;
        let archive = Self::new(reader)?;
        info!(path = %path.display(), entries = archive.entries.len(), "opened archive");
        Ok(archive)
    }
}

impl<R: ReadAt> ArchiveReader<R> {
    pub fn new(reader: R) -> Result<Self> {
        Self::with_backend(reader, Backend::default())
    }

    pub fn with_backend(reader: R, backend: Backend) -> Result<Self> {
        let parser = ZipParser::new(reader);
        let entries = parser.list_entries()?;
        Ok(Self {
            parser,
            backend,
            entries,
        })
    }

    /// Entry names in central directory order.
    pub fn list_files(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.name.clone()).collect()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First entry with the given name.
    pub fn entry(&self, name: &str) -> Option<&Entry> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    /// Decompress and verify one entry into memory.
    pub fn read_entry(&mut self, name: &str) -> Result<Vec<u8>> {
        let entry = self
            .entries
            .iter()
            .find(|entry| entry.name == name)
            .ok_or_else(|| Error::EntryNotFound(name.to_string()))?;
        unpack(&self.parser, &mut self.backend, entry)
    }

    /// Extract every entry below `output_dir`, in central directory order.
    ///
    /// Existing files are replaced only if `overwrite_all` is set or `prompt`
    /// agrees; answering [`Decision::All`] overwrites every later conflict of
    /// this call without asking again. Extraction stops at the first failing
    /// entry, leaving the entries before it on disk.
    pub fn extract_all<P>(
        &mut self,
        output_dir: impl AsRef<Path>,
        overwrite_all: bool,
        prompt: &mut P,
    ) -> Result<ExtractSummary>
    where
        P: OverwritePrompt + ?Sized,
    {
        let output_dir = output_dir.as_ref();
        let mut overwrite_all = overwrite_all;
        let mut summary = ExtractSummary::default();

        for entry in &self.entries {
            let target = output_path(output_dir, &entry.name)?;

            if entry.is_dir() {
                fs::create_dir_all(&target)?;
                summary.extracted += 1;
                continue;
            }

            if !overwrite_all && target.try_exists()? {
                match prompt.confirm(&target) {
                    Decision::Yes => {}
                    Decision::All => overwrite_all = true,
                    Decision::No => {
                        info!(name = %entry.name, "skipping existing file");
                        summary.skipped.push(entry.name.clone());
                        continue;
                    }
                }
            }

            let data = unpack(&self.parser, &mut self.backend, entry)?;
            write_output(&target, &data, entry)?;
            summary.extracted += 1;
        }

        Ok(summary)
    }
}

/// Read an entry's payload, decompress it per its method and check its CRC.
fn unpack<R: ReadAt>(parser: &ZipParser<R>, backend: &mut Backend, entry: &Entry) -> Result<Vec<u8>> {
    if entry.is_encrypted() {
        return Err(Error::UnsupportedFeature("encrypted entries"));
    }

    let payload = parser.read_payload(entry)?;
    let data = match entry.compression_method {
        CompressionMethod::Stored => payload,
        CompressionMethod::Deflate => backend
            .decompress(&payload, entry.uncompressed_size as usize)
            .map_err(|e| match e {
                Error::Decompression(detail) => Error::Integrity {
                    name: entry.name.clone(),
                    detail: format!("corrupt compressed data: {detail}"),
                },
                other => other,
            })?,
        CompressionMethod::Unknown(method) => return Err(Error::UnsupportedCompression(method)),
    };

    let actual = crc32fast::hash(&data);
    if actual != entry.crc32 {
        return Err(Error::Integrity {
            name: entry.name.clone(),
            detail: format!(
                "CRC-32 mismatch: expected {:#010x}, got {actual:#010x}",
                entry.crc32
            ),
        });
    }

    debug!(name = %entry.name, size = data.len(), "verified entry");
    Ok(data)
}

/// Resolve an entry name below `output_dir`, refusing anything that could
/// land outside it.
fn output_path(output_dir: &Path, name: &str) -> Result<PathBuf> {
    let unsafe_name = || Error::UnsafeEntryName(name.to_string());

    if name.starts_with('/') || name.starts_with('\\') {
        return Err(unsafe_name());
    }

    let mut path = output_dir.to_path_buf();
    let mut depth = 0;
    for part in name.split('/') {
        if part.is_empty() || part == "." {
            continue;
        }
        let mut components = Path::new(part).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(part)), None) => path.push(part),
            _ => return Err(unsafe_name()),
        }
        depth += 1;
    }

    if depth == 0 {
        return Err(unsafe_name());
    }
    Ok(path)
}

fn write_output(target: &Path, data: &[u8], entry: &Entry) -> io::Result<()> {
    if let Some(parent) = target.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(target, data)?;
    restore_mode(target, entry)
}

#[cfg(unix)]
fn restore_mode(target: &Path, entry: &Entry) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    match entry.mode() {
        Some(mode) => fs::set_permissions(target, fs::Permissions::from_mode(mode & 0o7777)),
        None => Ok(()),
    }
}

#[cfg(not(unix))]
fn restore_mode(_target: &Path, _entry: &Entry) -> io::Result<()> {
    Ok(())
}
