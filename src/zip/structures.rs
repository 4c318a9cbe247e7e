use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Cursor, Write};

use crate::error::{Error, Result};

/// Version made by: UNIX host, APPNOTE 6.3.
pub const VERSION_MADE_BY: u16 = 0x033F;

/// Version needed to extract: 2.0 (DEFLATE).
pub const VERSION_NEEDED: u16 = 0x0014;

/// General purpose flags written for every entry.
pub const GENERAL_PURPOSE_FLAGS: u16 = 0x0000;

/// General purpose flag bit marking an encrypted entry.
pub const FLAG_ENCRYPTED: u16 = 0x0001;

/// Maximum ZIP comment size allowed by the format (65535 bytes).
pub const MAX_COMMENT_SIZE: u64 = u16::MAX as u64;

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unknown(v) => *v,
        }
    }
}

fn check_signature(cursor: &mut Cursor<&[u8]>, expected: u32, record: &str) -> Result<()> {
    let actual = cursor
        .read_u32::<LittleEndian>()
        .map_err(|_| truncated(record))?;
    if actual != expected {
        return Err(Error::InvalidArchive(format!(
            "bad {record} signature: expected {expected:#010x}, got {actual:#010x}"
        )));
    }
    Ok(())
}

fn truncated(record: &str) -> Error {
    Error::InvalidArchive(format!("truncated {record}"))
}

/// End of Central Directory (EOCD) - 22 bytes minimum
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndOfCentralDirectory {
    pub disk_number: u16,
    pub disk_with_cd: u16,
    pub disk_entries: u16,
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: u32 = 0x06054b50;
    pub const SIZE: usize = 22;

    /// A single-disk trailer for `entries` records.
    pub fn new(entries: u16, cd_size: u32, cd_offset: u32) -> Self {
        Self {
            disk_number: 0,
            disk_with_cd: 0,
            disk_entries: entries,
            total_entries: entries,
            cd_size,
            cd_offset,
            comment_len: 0,
        }
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        const RECORD: &str = "end of central directory";
        let mut cursor = Cursor::new(data);
        check_signature(&mut cursor, Self::SIGNATURE, RECORD)?;

        let read = |cursor: &mut Cursor<&[u8]>| -> io::Result<Self> {
            Ok(Self {
                disk_number: cursor.read_u16::<LittleEndian>()?,
                disk_with_cd: cursor.read_u16::<LittleEndian>()?,
                disk_entries: cursor.read_u16::<LittleEndian>()?,
                total_entries: cursor.read_u16::<LittleEndian>()?,
                cd_size: cursor.read_u32::<LittleEndian>()?,
                cd_offset: cursor.read_u32::<LittleEndian>()?,
                comment_len: cursor.read_u16::<LittleEndian>()?,
            })
        };
        read(&mut cursor).map_err(|_| truncated(RECORD))
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u32::<LittleEndian>(Self::SIGNATURE)?;
        writer.write_u16::<LittleEndian>(self.disk_number)?;
        writer.write_u16::<LittleEndian>(self.disk_with_cd)?;
        writer.write_u16::<LittleEndian>(self.disk_entries)?;
        writer.write_u16::<LittleEndian>(self.total_entries)?;
        writer.write_u32::<LittleEndian>(self.cd_size)?;
        writer.write_u32::<LittleEndian>(self.cd_offset)?;
        writer.write_u16::<LittleEndian>(self.comment_len)
    }

    pub fn is_multi_disk(&self) -> bool {
        self.disk_number != 0 || self.disk_with_cd != 0 || self.disk_entries != self.total_entries
    }

    pub fn is_zip64(&self) -> bool {
        self.disk_entries == 0xFFFF
            || self.total_entries == 0xFFFF
            || self.cd_size == 0xFFFFFFFF
            || self.cd_offset == 0xFFFFFFFF
    }
}

/// Central Directory File Header (CDFH) - 46 bytes plus variable data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CentralDirectoryHeader {
    pub version_made_by: u16,
    pub version_needed: u16,
    pub flags: u16,
    pub compression_method: u16,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub file_name_length: u16,
    pub extra_field_length: u16,
    pub file_comment_length: u16,
    pub disk_number_start: u16,
    pub internal_attrs: u16,
    pub external_attrs: u32,
    pub lfh_offset: u32,
}

impl CentralDirectoryHeader {
    pub const SIGNATURE: u32 = 0x02014b50;
    pub const SIZE: usize = 46;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        const RECORD: &str = "central directory header";
        let mut cursor = Cursor::new(data);
        check_signature(&mut cursor, Self::SIGNATURE, RECORD)?;

        let read = |cursor: &mut Cursor<&[u8]>| -> io::Result<Self> {
            Ok(Self {
                version_made_by: cursor.read_u16::<LittleEndian>()?,
                version_needed: cursor.read_u16::<LittleEndian>()?,
                flags: cursor.read_u16::<LittleEndian>()?,
                compression_method: cursor.read_u16::<LittleEndian>()?,
                last_mod_time: cursor.read_u16::<LittleEndian>()?,
                last_mod_date: cursor.read_u16::<LittleEndian>()?,
                crc32: cursor.read_u32::<LittleEndian>()?,
                compressed_size: cursor.read_u32::<LittleEndian>()?,
                uncompressed_size: cursor.read_u32::<LittleEndian>()?,
                file_name_length: cursor.read_u16::<LittleEndian>()?,
                extra_field_length: cursor.read_u16::<LittleEndian>()?,
                file_comment_length: cursor.read_u16::<LittleEndian>()?,
                disk_number_start: cursor.read_u16::<LittleEndian>()?,
                internal_attrs: cursor.read_u16::<LittleEndian>()?,
                external_attrs: cursor.read_u32::<LittleEndian>()?,
                lfh_offset: cursor.read_u32::<LittleEndian>()?,
            })
        };
        read(&mut cursor).map_err(|_| truncated(RECORD))
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u32::<LittleEndian>(Self::SIGNATURE)?;
        writer.write_u16::<LittleEndian>(self.version_made_by)?;
        writer.write_u16::<LittleEndian>(self.version_needed)?;
        writer.write_u16::<LittleEndian>(self.flags)?;
        writer.write_u16::<LittleEndian>(self.compression_method)?;
        writer.write_u16::<LittleEndian>(self.last_mod_time)?;
        writer.write_u16::<LittleEndian>(self.last_mod_date)?;
        writer.write_u32::<LittleEndian>(self.crc32)?;
        writer.write_u32::<LittleEndian>(self.compressed_size)?;
        writer.write_u32::<LittleEndian>(self.uncompressed_size)?;
        writer.write_u16::<LittleEndian>(self.file_name_length)?;
        writer.write_u16::<LittleEndian>(self.extra_field_length)?;
        writer.write_u16::<LittleEndian>(self.file_comment_length)?;
        writer.write_u16::<LittleEndian>(self.disk_number_start)?;
        writer.write_u16::<LittleEndian>(self.internal_attrs)?;
        writer.write_u32::<LittleEndian>(self.external_attrs)?;
        writer.write_u32::<LittleEndian>(self.lfh_offset)
    }

    /// Total variable-length data size following this header.
    pub fn variable_data_size(&self) -> usize {
        self.file_name_length as usize
            + self.extra_field_length as usize
            + self.file_comment_length as usize
    }
}

/// Local File Header (LFH) - 30 bytes plus file name and extra field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFileHeader {
    pub version_needed: u16,
    pub flags: u16,
    pub compression_method: u16,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub file_name_length: u16,
    pub extra_field_length: u16,
}

impl LocalFileHeader {
    pub const SIGNATURE: u32 = 0x04034b50;
    pub const SIZE: usize = 30;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        const RECORD: &str = "local file header";
        let mut cursor = Cursor::new(data);
        check_signature(&mut cursor, Self::SIGNATURE, RECORD)?;

        let read = |cursor: &mut Cursor<&[u8]>| -> io::Result<Self> {
            Ok(Self {
                version_needed: cursor.read_u16::<LittleEndian>()?,
                flags: cursor.read_u16::<LittleEndian>()?,
                compression_method: cursor.read_u16::<LittleEndian>()?,
                last_mod_time: cursor.read_u16::<LittleEndian>()?,
                last_mod_date: cursor.read_u16::<LittleEndian>()?,
                crc32: cursor.read_u32::<LittleEndian>()?,
                compressed_size: cursor.read_u32::<LittleEndian>()?,
                uncompressed_size: cursor.read_u32::<LittleEndian>()?,
                file_name_length: cursor.read_u16::<LittleEndian>()?,
                extra_field_length: cursor.read_u16::<LittleEndian>()?,
            })
        };
        read(&mut cursor).map_err(|_| truncated(RECORD))
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u32::<LittleEndian>(Self::SIGNATURE)?;
        writer.write_u16::<LittleEndian>(self.version_needed)?;
        writer.write_u16::<LittleEndian>(self.flags)?;
        writer.write_u16::<LittleEndian>(self.compression_method)?;
        writer.write_u16::<LittleEndian>(self.last_mod_time)?;
        writer.write_u16::<LittleEndian>(self.last_mod_date)?;
        writer.write_u32::<LittleEndian>(self.crc32)?;
        writer.write_u32::<LittleEndian>(self.compressed_size)?;
        writer.write_u32::<LittleEndian>(self.uncompressed_size)?;
        writer.write_u16::<LittleEndian>(self.file_name_length)?;
        writer.write_u16::<LittleEndian>(self.extra_field_length)
    }

    /// Total variable-length data size following this header.
    pub fn variable_data_size(&self) -> usize {
        self.file_name_length as usize + self.extra_field_length as usize
    }
}

/// One archived file, as recorded in the central directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Forward-slash separated path inside the archive.
    pub name: String,
    pub compression_method: CompressionMethod,
    pub flags: u16,
    /// CRC-32 of the uncompressed bytes.
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    /// POSIX mode in the high 16 bits.
    pub external_attrs: u32,
    /// Offset of the local file header within the archive.
    pub header_offset: u32,
}

impl Entry {
    pub(crate) fn from_central(header: &CentralDirectoryHeader, name: String) -> Self {
        Self {
            name,
            compression_method: CompressionMethod::from_u16(header.compression_method),
            flags: header.flags,
            crc32: header.crc32,
            compressed_size: header.compressed_size,
            uncompressed_size: header.uncompressed_size,
            last_mod_time: header.last_mod_time,
            last_mod_date: header.last_mod_date,
            external_attrs: header.external_attrs,
            header_offset: header.lfh_offset,
        }
    }

    fn name_length(&self) -> u16 {
        // names longer than u16::MAX are rejected before an entry is built
        self.name.len() as u16
    }

    pub fn local_header(&self) -> LocalFileHeader {
        LocalFileHeader {
            version_needed: VERSION_NEEDED,
            flags: self.flags,
            compression_method: self.compression_method.as_u16(),
            last_mod_time: self.last_mod_time,
            last_mod_date: self.last_mod_date,
            crc32: self.crc32,
            compressed_size: self.compressed_size,
            uncompressed_size: self.uncompressed_size,
            file_name_length: self.name_length(),
            extra_field_length: 0,
        }
    }

    pub fn central_header(&self) -> CentralDirectoryHeader {
        CentralDirectoryHeader {
            version_made_by: VERSION_MADE_BY,
            version_needed: VERSION_NEEDED,
            flags: self.flags,
            compression_method: self.compression_method.as_u16(),
            last_mod_time: self.last_mod_time,
            last_mod_date: self.last_mod_date,
            crc32: self.crc32,
            compressed_size: self.compressed_size,
            uncompressed_size: self.uncompressed_size,
            file_name_length: self.name_length(),
            extra_field_length: 0,
            file_comment_length: 0,
            disk_number_start: 0,
            internal_attrs: 0,
            external_attrs: self.external_attrs,
            lfh_offset: self.header_offset,
        }
    }

    /// Parse modification date to (year, month, day)
    pub fn mod_date(&self) -> (u16, u8, u8) {
        let day = (self.last_mod_date & 0x1F) as u8;
        let month = ((self.last_mod_date >> 5) & 0x0F) as u8;
        let year = ((self.last_mod_date >> 9) & 0x7F) + 1980;
        (year, month, day)
    }

    /// Parse modification time to (hour, minute, second)
    pub fn mod_time(&self) -> (u8, u8, u8) {
        let second = ((self.last_mod_time & 0x1F) * 2) as u8;
        let minute = ((self.last_mod_time >> 5) & 0x3F) as u8;
        let hour = ((self.last_mod_time >> 11) & 0x1F) as u8;
        (hour, minute, second)
    }

    /// POSIX mode carried in the external attributes, if any was recorded.
    pub fn mode(&self) -> Option<u32> {
        match self.external_attrs >> 16 {
            0 => None,
            mode => Some(mode),
        }
    }

    /// Directory entries end with '/'
    pub fn is_dir(&self) -> bool {
        self.name.ends_with('/')
    }

    pub fn is_encrypted(&self) -> bool {
        self.flags & FLAG_ENCRYPTED != 0
    }
}
