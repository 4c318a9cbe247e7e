//! Archives must be readable by other ZIP implementations and vice versa.

use std::io::{Cursor, Read, Write};

use miniwr::{ArchiveReader, ArchiveWriter, CompressionLevel, NeverOverwrite};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

fn sample() -> Vec<u8> {
    "Interop test payload, repeated until deflate has something to chew on.\n"
        .repeat(300)
        .into_bytes()
}

#[test]
fn zip_crate_reads_our_archives() {
    let text = sample();
    let mut writer = ArchiveWriter::new(Vec::new());
    writer.add_bytes("stored.txt", &text, CompressionLevel::Store).unwrap();
    writer.add_bytes("fast.txt", &text, CompressionLevel::Fast).unwrap();
    writer.add_bytes("dir/max.txt", &text, CompressionLevel::Maximum).unwrap();
    writer.add_bytes("empty.txt", b"", CompressionLevel::Store).unwrap();
    writer.add_bytes("empty-deflated.txt", b"", CompressionLevel::Default).unwrap();
    let bytes = writer.finish().unwrap();

    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    assert_eq!(archive.len(), 5);

    {
        let file = archive.by_name("stored.txt").unwrap();
        assert_eq!(file.compression(), CompressionMethod::Stored);
    }
    {
        let file = archive.by_name("fast.txt").unwrap();
        assert_eq!(file.compression(), CompressionMethod::Deflated);
        assert!(file.compressed_size() < file.size());
    }

    for name in ["stored.txt", "fast.txt", "dir/max.txt"] {
        let mut content = Vec::new();
        archive.by_name(name).unwrap().read_to_end(&mut content).unwrap();
        assert_eq!(content, text, "{name}");
    }

    for name in ["empty.txt", "empty-deflated.txt"] {
        let mut content = Vec::new();
        archive.by_name(name).unwrap().read_to_end(&mut content).unwrap();
        assert!(content.is_empty(), "{name}");
    }
    assert_eq!(
        archive.by_name("empty-deflated.txt").unwrap().compression(),
        CompressionMethod::Deflated
    );
}

#[cfg(unix)]
#[test]
fn zip_crate_sees_unix_permissions() {
    let mut writer = ArchiveWriter::new(Vec::new());
    writer.add_bytes("f.txt", b"x", CompressionLevel::Default).unwrap();
    let bytes = writer.finish().unwrap();

    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    let file = archive.by_index(0).unwrap();
    assert_eq!(file.unix_mode().map(|mode| mode & 0o777), Some(0o644));
}

#[test]
fn we_read_zip_crate_archives() {
    let text = sample();
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

    zip.add_directory("folder/", stored).unwrap();
    zip.start_file("folder/deflated.txt", deflated).unwrap();
    zip.write_all(&text).unwrap();
    zip.start_file("stored.bin", stored).unwrap();
    zip.write_all(&[0, 1, 2, 3, 255]).unwrap();
    zip.set_comment("written by another implementation");
    let bytes = zip.finish().unwrap().into_inner();

    let mut reader = ArchiveReader::new(bytes).unwrap();
    assert_eq!(reader.list_files(), ["folder/", "folder/deflated.txt", "stored.bin"]);
    assert!(reader.entry("folder/").unwrap().is_dir());
    assert_eq!(reader.read_entry("folder/deflated.txt").unwrap(), text);
    assert_eq!(reader.read_entry("stored.bin").unwrap(), [0, 1, 2, 3, 255]);

    let out = tempfile::tempdir().unwrap();
    let summary = reader.extract_all(out.path(), false, &mut NeverOverwrite).unwrap();
    assert_eq!(summary.extracted, 3);
    assert!(out.path().join("folder").is_dir());
    assert_eq!(std::fs::read(out.path().join("folder/deflated.txt")).unwrap(), text);
}
