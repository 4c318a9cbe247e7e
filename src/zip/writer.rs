//! ZIP archive writer.
//!
//! Entries are appended one after another: local header, file name, payload.
//! The central directory and the end of central directory record are written
//! once, when the writer is closed (explicitly or on drop).

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::compress::{Backend, CompressionLevel, Compressor};
use crate::error::{Error, Result};

use super::date::DosDateTime;
use super::structures::*;

/// Mode recorded for entries that do not come from the file system.
const DEFAULT_FILE_MODE: u32 = 0o100644;

/// A single final fixed-Huffman block with no data: the shortest valid
/// DEFLATE stream, written for empty deflated entries.
const EMPTY_DEFLATE_STREAM: [u8; 2] = [0x03, 0x00];

/// Wraps a sink and counts the bytes written through it.
#[derive(Debug)]
struct OffsetWriter<W> {
    inner: W,
    offset: u64,
}

impl<W: Write> Write for OffsetWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.offset += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Writes a new ZIP archive.
///
/// The writer is `Open` until [`close`](Self::close) or [`finish`](Self::finish)
/// writes the trailer; afterwards every add fails with [`Error::WriterClosed`].
/// Dropping an open writer still writes the trailer, but any error doing so is
/// only logged. Call `close` to observe it.
///
/// ```no_run
/// use miniwr::{ArchiveWriter, CompressionLevel};
///
/// let mut writer = ArchiveWriter::create("a.zip")?;
/// writer.add_file("hello.txt", CompressionLevel::Default)?;
/// writer.add_directory("docs", CompressionLevel::Maximum)?;
/// writer.close()?;
/// # Ok::<(), miniwr::Error>(())
/// ```
#[derive(Debug)]
pub struct ArchiveWriter<W: Write> {
    sink: Option<OffsetWriter<W>>,
    backend: Backend,
    entries: Vec<Entry>,
}

impl ArchiveWriter<BufWriter<File>> {
    /// Create (or truncate) the archive file at `path`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|source| Error::ArchiveOpen {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "creating archive");
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> ArchiveWriter<W> {
    /// Start an archive at the current position of `sink`.
    pub fn new(sink: W) -> Self {
        Self::with_backend(sink, Backend::default())
    }

    pub fn with_backend(sink: W, backend: Backend) -> Self {
        Self {
            sink: Some(OffsetWriter {
                inner: sink,
                offset: 0,
            }),
            backend,
            entries: Vec::new(),
        }
    }

    /// Entries written so far, in archive order.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn is_closed(&self) -> bool {
        self.sink.is_none()
    }

    /// Add a single file, named after its final path component.
    pub fn add_file(&mut self, path: impl AsRef<Path>, level: CompressionLevel) -> Result<()> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| Error::FileNotFound(path.to_path_buf()))?;
        self.add_file_as(path, &name, level)
    }

    /// Add a single file under an explicit entry name.
    pub fn add_file_as(&mut self, path: impl AsRef<Path>, name: &str, level: CompressionLevel) -> Result<()> {
        let path = path.as_ref();
        let metadata = match fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::FileNotFound(path.to_path_buf()));
            }
            Err(e) => return Err(Error::Io(e)),
        };

        let data = fs::read(path)?;
        let modified = metadata
            .modified()
            .map(DosDateTime::from_system_time)
            .unwrap_or_else(|_| DosDateTime::now());

        self.write_entry(name, &data, level, modified, file_mode(&metadata))
    }

    /// Add an in-memory payload under `name`, stamped with the current time.
    pub fn add_bytes(&mut self, name: &str, data: &[u8], level: CompressionLevel) -> Result<()> {
        self.write_entry(name, data, level, DosDateTime::now(), DEFAULT_FILE_MODE)
    }

    /// Recursively add every regular file below `path`.
    ///
    /// Entries are named as described in [`walk_directory`]. Returns the number
    /// of files added.
    pub fn add_directory(&mut self, path: impl AsRef<Path>, level: CompressionLevel) -> Result<usize> {
        self.add_directory_with(path, level, |_| {})
    }

    /// Like [`add_directory`](Self::add_directory), calling `on_added` after
    /// each file is written.
    pub fn add_directory_with<F>(
        &mut self,
        path: impl AsRef<Path>,
        level: CompressionLevel,
        mut on_added: F,
    ) -> Result<usize>
    where
        F: FnMut(&SourceFile),
    {
        let root = path.as_ref();
        let files = walk_directory(root)?;

        for file in &files {
            self.add_file_as(&file.path, &file.name, level)?;
            on_added(file);
        }

        debug!(root = %root.display(), files = files.len(), "added directory");
        Ok(files.len())
    }

    fn write_entry(
        &mut self,
        name: &str,
        data: &[u8],
        level: CompressionLevel,
        modified: DosDateTime,
        mode: u32,
    ) -> Result<()> {
        if self.sink.is_none() {
            return Err(Error::WriterClosed);
        }

        let normalized = normalize_name(name);
        if normalized.is_empty() {
            return Err(Error::UnsafeEntryName(name.to_string()));
        }
        let name = normalized;
        if name.len() > u16::MAX as usize {
            return Err(Error::LimitExceeded("entry name length"));
        }
        if self.entries.len() >= u16::MAX as usize - 1 {
            return Err(Error::LimitExceeded("entry count"));
        }

        let uncompressed_size = fit_u32(data.len() as u64, "entry size")?;
        let crc32 = crc32fast::hash(data);

        let (compression_method, compressed) = if level == CompressionLevel::Store {
            (CompressionMethod::Stored, None)
        } else {
            let compressed = self.backend.compress(data, level)?;
            if compressed.is_empty() {
                (CompressionMethod::Deflate, Some(EMPTY_DEFLATE_STREAM.to_vec()))
            } else {
                (CompressionMethod::Deflate, Some(compressed))
            }
        };
        let payload = compressed.as_deref().unwrap_or(data);
        let compressed_size = fit_u32(payload.len() as u64, "compressed entry size")?;

        let Some(sink) = self.sink.as_mut() else {
            return Err(Error::WriterClosed);
        };

        // Offset is taken before anything of this entry is written
        let header_offset = fit_u32(sink.offset, "local header offset")?;

        let entry = Entry {
            name,
            compression_method,
            flags: GENERAL_PURPOSE_FLAGS,
            crc32,
            compressed_size,
            uncompressed_size,
            last_mod_time: modified.time,
            last_mod_date: modified.date,
            external_attrs: (mode & 0xFFFF) << 16,
            header_offset,
        };

        let write = |sink: &mut OffsetWriter<W>| -> io::Result<()> {
            entry.local_header().write_to(sink)?;
            sink.write_all(entry.name.as_bytes())?;
            sink.write_all(payload)
        };
        write(sink).map_err(Error::ArchiveWrite)?;

        debug!(
            name = %entry.name,
            offset = entry.header_offset,
            size = entry.uncompressed_size,
            compressed = entry.compressed_size,
            method = entry.compression_method.as_u16(),
            "wrote local file header"
        );
        self.entries.push(entry);
        Ok(())
    }

    /// Write the central directory and trailer, then release the sink.
    ///
    /// Calling `close` again afterwards is a no-op.
    pub fn close(&mut self) -> Result<()> {
        match self.sink.take() {
            Some(mut sink) => Self::write_central_directory(&self.entries, &mut sink),
            None => Ok(()),
        }
    }

    /// Like [`close`](Self::close), but hands the underlying sink back.
    pub fn finish(mut self) -> Result<W> {
        let mut sink = self.sink.take().ok_or(Error::WriterClosed)?;
        Self::write_central_directory(&self.entries, &mut sink)?;
        Ok(sink.inner)
    }

    fn write_central_directory(entries: &[Entry], sink: &mut OffsetWriter<W>) -> Result<()> {
        let cd_start = sink.offset;
        let cd_offset = fit_u32(cd_start, "central directory offset")?;

        for entry in entries {
            entry
                .central_header()
                .write_to(sink)
                .and_then(|()| sink.write_all(entry.name.as_bytes()))
                .map_err(Error::ArchiveWrite)?;
        }

        let cd_size = fit_u32(sink.offset - cd_start, "central directory size")?;
        // bounded by the check in write_entry
        let count = entries.len() as u16;

        EndOfCentralDirectory::new(count, cd_size, cd_offset)
            .write_to(sink)
            .and_then(|()| sink.flush())
            .map_err(Error::ArchiveWrite)?;

        info!(entries = count, cd_offset, cd_size, "wrote central directory");
        Ok(())
    }
}

impl<W: Write> Drop for ArchiveWriter<W> {
    fn drop(&mut self) {
        if self.sink.is_some() {
            if let Err(e) = self.close() {
                warn!(error = %e, "failed to finalize archive on drop");
            }
        }
    }
}

/// A regular file found below a directory, with the entry name it gets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub name: String,
}

/// List every regular file below `root`, in file name order.
///
/// Names are `<directory name>/<relative path>` with forward slashes, so the
/// same tree always produces the same archive layout. Symbolic links are
/// followed.
pub fn walk_directory(root: &Path) -> Result<Vec<SourceFile>> {
    if !root.is_dir() {
        return Err(Error::DirectoryNotFound(root.to_path_buf()));
    }

    let prefix = root.file_name().map(Path::new).unwrap_or(Path::new(""));
    let mut files = Vec::new();

    for item in WalkDir::new(root).follow_links(true).sort_by_file_name() {
        let item = item.map_err(io::Error::from)?;
        if !item.file_type().is_file() {
            continue;
        }

        let relative = item.path().strip_prefix(root).unwrap_or(item.path());
        files.push(SourceFile {
            name: entry_name(&prefix.join(relative)),
            path: item.into_path(),
        });
    }

    Ok(files)
}

fn fit_u32(value: u64, what: &'static str) -> Result<u32> {
    // 0xFFFFFFFF is reserved as the ZIP64 marker
    match u32::try_from(value) {
        Ok(v) if v != u32::MAX => Ok(v),
        _ => Err(Error::LimitExceeded(what)),
    }
}

/// Build a forward-slash entry name from the normal components of a path.
fn entry_name(path: &Path) -> String {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Normalize a caller-supplied name: backslashes become slashes, and empty,
/// `.` and `..` segments are dropped.
fn normalize_name(name: &str) -> String {
    name.split(['/', '\\'])
        .filter(|part| !part.is_empty() && *part != "." && *part != "..")
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(unix)]
fn file_mode(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode()
}

#[cfg(not(unix))]
fn file_mode(metadata: &fs::Metadata) -> u32 {
    if metadata.permissions().readonly() {
        0o100444
    } else {
        DEFAULT_FILE_MODE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{LittleEndian, ReadBytesExt};
    use std::io::Cursor;

    fn u16_at(data: &[u8], at: usize) -> u16 {
        Cursor::new(&data[at..]).read_u16::<LittleEndian>().unwrap()
    }

    fn u32_at(data: &[u8], at: usize) -> u32 {
        Cursor::new(&data[at..]).read_u32::<LittleEndian>().unwrap()
    }

    #[test]
    fn empty_archive_is_a_bare_trailer() {
        let bytes = ArchiveWriter::new(Vec::new()).finish().unwrap();
        assert_eq!(bytes.len(), EndOfCentralDirectory::SIZE);
        assert_eq!(&bytes[0..4], b"PK\x05\x06");
        assert_eq!(u16_at(&bytes, 8), 0);
        assert_eq!(u32_at(&bytes, 16), 0);
    }

    #[test]
    fn stored_entry_layout() {
        let mut writer = ArchiveWriter::new(Vec::new());
        writer.add_bytes("hello.txt", b"Hello, World!", CompressionLevel::Store).unwrap();
        let bytes = writer.finish().unwrap();

        // local header
        assert_eq!(u32_at(&bytes, 0), LocalFileHeader::SIGNATURE);
        assert_eq!(u16_at(&bytes, 4), VERSION_NEEDED);
        assert_eq!(u16_at(&bytes, 6), 0);
        assert_eq!(u16_at(&bytes, 8), 0, "stored entries use method 0");
        assert_eq!(u32_at(&bytes, 14), 0xEC4AC3D0);
        assert_eq!(u32_at(&bytes, 18), 13);
        assert_eq!(u32_at(&bytes, 22), 13);
        assert_eq!(u16_at(&bytes, 26), 9);
        assert_eq!(u16_at(&bytes, 28), 0);
        assert_eq!(&bytes[30..39], b"hello.txt");
        assert_eq!(&bytes[39..52], b"Hello, World!");

        // central directory
        let cd = 52;
        assert_eq!(u32_at(&bytes, cd), CentralDirectoryHeader::SIGNATURE);
        assert_eq!(u16_at(&bytes, cd + 4), VERSION_MADE_BY);
        assert_eq!(u16_at(&bytes, cd + 10), 0);
        assert_eq!(u32_at(&bytes, cd + 38), DEFAULT_FILE_MODE << 16);
        assert_eq!(u32_at(&bytes, cd + 42), 0);
        assert_eq!(&bytes[cd + 46..cd + 55], b"hello.txt");

        // trailer
        let eocd = cd + 55;
        assert_eq!(bytes.len(), eocd + EndOfCentralDirectory::SIZE);
        assert_eq!(u32_at(&bytes, eocd), EndOfCentralDirectory::SIGNATURE);
        assert_eq!(u16_at(&bytes, eocd + 8), 1);
        assert_eq!(u16_at(&bytes, eocd + 10), 1);
        assert_eq!(u32_at(&bytes, eocd + 12), 55);
        assert_eq!(u32_at(&bytes, eocd + 16), 52);
    }

    #[test]
    fn deflated_entry_reports_method_8() {
        let mut writer = ArchiveWriter::new(Vec::new());
        writer
            .add_bytes("a.txt", &b"abcabcabc".repeat(100), CompressionLevel::Default)
            .unwrap();
        let entry = writer.entries()[0].clone();
        let bytes = writer.finish().unwrap();

        assert_eq!(entry.compression_method, CompressionMethod::Deflate);
        assert!(entry.compressed_size < entry.uncompressed_size);
        assert_eq!(u16_at(&bytes, 8), 8);
    }

    #[test]
    fn empty_payload_with_store() {
        let mut writer = ArchiveWriter::new(Vec::new());
        writer.add_bytes("empty", b"", CompressionLevel::Store).unwrap();
        let entry = &writer.entries()[0];
        assert_eq!(entry.compressed_size, 0);
        assert_eq!(entry.uncompressed_size, 0);
        assert_eq!(entry.crc32, 0);
    }

    #[test]
    fn empty_deflated_entry_is_a_valid_stream() {
        let mut writer = ArchiveWriter::new(Vec::new());
        writer.add_bytes("empty", b"", CompressionLevel::Default).unwrap();
        let entry = writer.entries()[0].clone();
        let bytes = writer.finish().unwrap();

        assert_eq!(entry.compression_method, CompressionMethod::Deflate);
        assert_eq!(entry.compressed_size, 2);
        assert_eq!(entry.uncompressed_size, 0);
        assert_eq!(&bytes[30 + 5..30 + 7], &[0x03, 0x00]);

        let mut backend = Backend::default();
        assert!(backend.decompress(&EMPTY_DEFLATE_STREAM, 0).unwrap().is_empty());
    }

    #[test]
    fn header_offsets_track_write_position() {
        let mut writer = ArchiveWriter::new(Vec::new());
        writer.add_bytes("one", b"1111", CompressionLevel::Store).unwrap();
        writer.add_bytes("two", b"22", CompressionLevel::Store).unwrap();

        let offsets: Vec<_> = writer.entries().iter().map(|e| e.header_offset).collect();
        assert_eq!(offsets, [0, 30 + 3 + 4]);
    }

    #[test]
    fn adds_after_close_fail_and_close_is_idempotent() {
        let mut writer = ArchiveWriter::new(Vec::new());
        writer.close().unwrap();
        writer.close().unwrap();
        assert!(writer.is_closed());

        let err = writer.add_bytes("late", b"x", CompressionLevel::Fast).unwrap_err();
        assert!(matches!(err, Error::WriterClosed));
    }

    #[test]
    fn missing_sources() {
        let mut writer = ArchiveWriter::new(Vec::new());
        let err = writer
            .add_file("/definitely/not/here.txt", CompressionLevel::Default)
            .unwrap_err();
        assert!(matches!(err, Error::FileNotFound(_)));

        let err = writer
            .add_directory("/definitely/not/here", CompressionLevel::Default)
            .unwrap_err();
        assert!(matches!(err, Error::DirectoryNotFound(_)));
        assert!(writer.entries().is_empty());
    }

    #[test]
    fn walk_names_entries_under_directory_name() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("docs");
        fs::create_dir_all(root.join("b/c")).unwrap();
        fs::write(root.join("z.txt"), b"z").unwrap();
        fs::write(root.join("a.txt"), b"a").unwrap();
        fs::write(root.join("b/c/d.txt"), b"d").unwrap();

        let names: Vec<_> = walk_directory(&root).unwrap().into_iter().map(|f| f.name).collect();
        assert_eq!(names, ["docs/a.txt", "docs/b/c/d.txt", "docs/z.txt"]);

        let mut writer = ArchiveWriter::new(Vec::new());
        assert_eq!(writer.add_directory(&root, CompressionLevel::Fast).unwrap(), 3);
        let written: Vec<_> = writer.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(written, names);

        let mut reported = Vec::new();
        let mut writer = ArchiveWriter::new(Vec::new());
        let added = writer
            .add_directory_with(&root, CompressionLevel::Store, |file| reported.push(file.name.clone()))
            .unwrap();
        assert_eq!(added, 3);
        assert_eq!(reported, names);
    }

    #[test]
    fn names_are_normalized() {
        assert_eq!(normalize_name("/abs/./x/../y.txt"), "abs/x/y.txt");
        assert_eq!(normalize_name("dir\\sub\\f.bin"), "dir/sub/f.bin");
        assert_eq!(entry_name(Path::new("root/a/b.txt")), "root/a/b.txt");
    }

    #[test]
    fn limits_reject_zip64_values() {
        assert_eq!(fit_u32(5, "x").unwrap(), 5);
        assert!(matches!(fit_u32(u32::MAX as u64, "x"), Err(Error::LimitExceeded("x"))));
        assert!(matches!(fit_u32(1 << 40, "x"), Err(Error::LimitExceeded("x"))));
    }

    /// Sink that accepts a fixed number of bytes, then fails.
    struct FailingSink {
        budget: usize,
    }

    impl Write for FailingSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.budget == 0 {
                return Err(io::Error::other("disk full"));
            }
            let n = buf.len().min(self.budget);
            self.budget -= n;
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn write_failures_are_archive_write_errors() {
        let mut writer = ArchiveWriter::new(FailingSink { budget: 10 });
        let err = writer.add_bytes("x.txt", b"payload", CompressionLevel::Store).unwrap_err();
        assert!(matches!(err, Error::ArchiveWrite(_)), "{err}");
    }

    #[test]
    fn drop_finalizes_and_swallows_errors() {
        // would panic if drop propagated the failure
        let mut writer = ArchiveWriter::new(FailingSink { budget: 40 });
        writer.add_bytes("x", b"y", CompressionLevel::Store).unwrap();
        drop(writer);
    }
}
