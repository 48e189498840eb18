use crate::error::FormatError;

use super::bytes::{u16_le, u32_le, u64_le};

/// Placeholder for 32-bit fields whose real value lives in the ZIP64 extra field
pub const ZIP64_PLACEHOLDER_32: u32 = 0xFFFF_FFFF;
/// Placeholder for 16-bit fields whose real value lives in the ZIP64 extra field
pub const ZIP64_PLACEHOLDER_16: u16 = 0xFFFF;

/// Longest archive comment the EOCD length field can describe
pub const MAX_COMMENT_SIZE: usize = 0xFFFF;

/// General purpose flag bit 0: entry is encrypted
pub const FLAG_ENCRYPTED: u16 = 0x0001;
/// General purpose flag bit 3: CRC and sizes follow the data in a descriptor
pub const FLAG_DATA_DESCRIPTOR: u16 = 0x0008;

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

/// Verify length and signature of a fixed-size record prefix.
fn check_record(
    data: &[u8],
    record: &'static str,
    size: usize,
    signature: u32,
) -> Result<(), FormatError> {
    if data.len() < size {
        return Err(FormatError::Truncated {
            record,
            needed: size as u64,
            available: data.len() as u64,
        });
    }

    let found = u32_le(data, 0)?;
    if found != signature {
        return Err(FormatError::BadSignature {
            record,
            expected: signature,
            found,
        });
    }

    Ok(())
}

/// End of Central Directory (EOCD) - 22 bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndOfCentralDirectory {
    pub disk_number: u16,
    pub disk_with_cd: u16,
    pub volume_entries: u16,
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: u32 = 0x0605_4b50;
    pub const SIZE: usize = 22;

    pub fn from_bytes(data: &[u8]) -> Result<Self, FormatError> {
        check_record(data, "end of central directory", Self::SIZE, Self::SIGNATURE)?;

        Ok(Self {
            disk_number: u16_le(data, 4)?,
            disk_with_cd: u16_le(data, 6)?,
            volume_entries: u16_le(data, 8)?,
            total_entries: u16_le(data, 10)?,
            cd_size: u32_le(data, 12)?,
            cd_offset: u32_le(data, 16)?,
            comment_len: u16_le(data, 20)?,
        })
    }

    /// Any count, size or offset field holds a ZIP64 placeholder.
    pub fn is_zip64(&self) -> bool {
        self.volume_entries == ZIP64_PLACEHOLDER_16
            || self.total_entries == ZIP64_PLACEHOLDER_16
            || self.cd_size == ZIP64_PLACEHOLDER_32
            || self.cd_offset == ZIP64_PLACEHOLDER_32
    }
}

/// ZIP64 End of Central Directory Locator - 20 bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zip64EocdLocator {
    pub disk_with_eocd64: u32,
    pub eocd64_offset: u64,
    pub total_disks: u32,
}

impl Zip64EocdLocator {
    pub const SIGNATURE: u32 = 0x0706_4b50;
    pub const SIZE: usize = 20;

    pub fn from_bytes(data: &[u8]) -> Result<Self, FormatError> {
        check_record(data, "ZIP64 locator", Self::SIZE, Self::SIGNATURE)?;

        Ok(Self {
            disk_with_eocd64: u32_le(data, 4)?,
            eocd64_offset: u64_le(data, 8)?,
            total_disks: u32_le(data, 16)?,
        })
    }
}

/// ZIP64 End of Central Directory - 56 bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zip64Eocd {
    pub eocd64_size: u64,
    pub version_made_by: u16,
    pub version_needed: u16,
    pub disk_number: u32,
    pub disk_with_cd: u32,
    pub volume_entries: u64,
    pub total_entries: u64,
    pub cd_size: u64,
    pub cd_offset: u64,
}

impl Zip64Eocd {
    pub const SIGNATURE: u32 = 0x0606_4b50;
    pub const SIZE: usize = 56;

    pub fn from_bytes(data: &[u8]) -> Result<Self, FormatError> {
        check_record(data, "ZIP64 end of central directory", Self::SIZE, Self::SIGNATURE)?;

        Ok(Self {
            eocd64_size: u64_le(data, 4)?,
            version_made_by: u16_le(data, 12)?,
            version_needed: u16_le(data, 14)?,
            disk_number: u32_le(data, 16)?,
            disk_with_cd: u32_le(data, 20)?,
            volume_entries: u64_le(data, 24)?,
            total_entries: u64_le(data, 32)?,
            cd_size: u64_le(data, 40)?,
            cd_offset: u64_le(data, 48)?,
        })
    }
}

/// Central Directory File Header (CDFH) - fixed 46-byte prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CentralDirectoryHeader {
    pub version_made_by: u16,
    pub version_needed: u16,
    pub flags: u16,
    pub method: u16,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub name_len: u16,
    pub extra_len: u16,
    pub comment_len: u16,
    pub disk_start: u16,
    pub internal_attrs: u16,
    pub external_attrs: u32,
    pub lfh_offset: u32,
}

impl CentralDirectoryHeader {
    pub const SIGNATURE: u32 = 0x0201_4b50;
    pub const SIZE: usize = 46;

    /// Decode the fixed header starting at `offset` within `data`.
    pub fn from_bytes(data: &[u8], offset: usize) -> Result<Self, FormatError> {
        let data = data.get(offset..).unwrap_or_default();
        check_record(data, "central directory header", Self::SIZE, Self::SIGNATURE)?;

        Ok(Self {
            version_made_by: u16_le(data, 4)?,
            version_needed: u16_le(data, 6)?,
            flags: u16_le(data, 8)?,
            method: u16_le(data, 10)?,
            last_mod_time: u16_le(data, 12)?,
            last_mod_date: u16_le(data, 14)?,
            crc32: u32_le(data, 16)?,
            compressed_size: u32_le(data, 20)?,
            uncompressed_size: u32_le(data, 24)?,
            name_len: u16_le(data, 28)?,
            extra_len: u16_le(data, 30)?,
            comment_len: u16_le(data, 32)?,
            disk_start: u16_le(data, 34)?,
            internal_attrs: u16_le(data, 36)?,
            external_attrs: u32_le(data, 38)?,
            lfh_offset: u32_le(data, 42)?,
        })
    }

    /// Length of the name, extra field and comment that follow the fixed header.
    pub fn variable_len(&self) -> usize {
        usize::from(self.name_len) + usize::from(self.extra_len) + usize::from(self.comment_len)
    }
}

/// Local File Header (LFH) - fixed 30-byte prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFileHeader {
    pub version_needed: u16,
    pub flags: u16,
    pub method: u16,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub name_len: u16,
    pub extra_len: u16,
}

impl LocalFileHeader {
    pub const SIGNATURE: u32 = 0x0403_4b50;
    pub const SIZE: usize = 30;

    pub fn from_bytes(data: &[u8]) -> Result<Self, FormatError> {
        check_record(data, "local file header", Self::SIZE, Self::SIGNATURE)?;

        Ok(Self {
            version_needed: u16_le(data, 4)?,
            flags: u16_le(data, 6)?,
            method: u16_le(data, 8)?,
            last_mod_time: u16_le(data, 10)?,
            last_mod_date: u16_le(data, 12)?,
            crc32: u32_le(data, 14)?,
            compressed_size: u32_le(data, 18)?,
            uncompressed_size: u32_le(data, 22)?,
            name_len: u16_le(data, 26)?,
            extra_len: u16_le(data, 28)?,
        })
    }

    /// Bytes between the start of the header and the entry's data.
    pub fn total_len(&self) -> u64 {
        Self::SIZE as u64 + u64::from(self.name_len) + u64::from(self.extra_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eocd_bytes(entries: u16, cd_size: u32, cd_offset: u32, comment_len: u16) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&EndOfCentralDirectory::SIGNATURE.to_le_bytes());
        buf.extend_from_slice(&[0, 0, 0, 0]);
        buf.extend_from_slice(&entries.to_le_bytes());
        buf.extend_from_slice(&entries.to_le_bytes());
        buf.extend_from_slice(&cd_size.to_le_bytes());
        buf.extend_from_slice(&cd_offset.to_le_bytes());
        buf.extend_from_slice(&comment_len.to_le_bytes());
        buf
    }

    #[test]
    fn decodes_eocd() {
        let eocd = EndOfCentralDirectory::from_bytes(&eocd_bytes(3, 150, 1024, 7)).unwrap();
        assert_eq!(eocd.volume_entries, 3);
        assert_eq!(eocd.total_entries, 3);
        assert_eq!(eocd.cd_size, 150);
        assert_eq!(eocd.cd_offset, 1024);
        assert_eq!(eocd.comment_len, 7);
        assert!(!eocd.is_zip64());
    }

    #[test]
    fn eocd_placeholders_flag_zip64() {
        let eocd = EndOfCentralDirectory::from_bytes(&eocd_bytes(0xFFFF, 0, 0, 0)).unwrap();
        assert!(eocd.is_zip64());
        let eocd = EndOfCentralDirectory::from_bytes(&eocd_bytes(1, 10, 0xFFFF_FFFF, 0)).unwrap();
        assert!(eocd.is_zip64());
    }

    #[test]
    fn rejects_bad_signature_and_truncation() {
        let mut buf = eocd_bytes(1, 0, 0, 0);
        assert!(matches!(
            EndOfCentralDirectory::from_bytes(&buf[..21]),
            Err(FormatError::Truncated {
                needed: 22,
                available: 21,
                ..
            })
        ));
        buf[3] = 0x07;
        assert!(matches!(
            EndOfCentralDirectory::from_bytes(&buf),
            Err(FormatError::BadSignature {
                found: 0x0705_4b50,
                ..
            })
        ));
    }

    #[test]
    fn decodes_zip64_locator_and_eocd() {
        let mut loc = Vec::new();
        loc.extend_from_slice(&Zip64EocdLocator::SIGNATURE.to_le_bytes());
        loc.extend_from_slice(&0u32.to_le_bytes());
        loc.extend_from_slice(&0x1_0000_0000u64.to_le_bytes());
        loc.extend_from_slice(&1u32.to_le_bytes());
        let loc = Zip64EocdLocator::from_bytes(&loc).unwrap();
        assert_eq!(loc.eocd64_offset, 0x1_0000_0000);
        assert_eq!(loc.total_disks, 1);

        let mut rec = Vec::new();
        rec.extend_from_slice(&Zip64Eocd::SIGNATURE.to_le_bytes());
        rec.extend_from_slice(&44u64.to_le_bytes());
        rec.extend_from_slice(&45u16.to_le_bytes());
        rec.extend_from_slice(&45u16.to_le_bytes());
        rec.extend_from_slice(&0u32.to_le_bytes());
        rec.extend_from_slice(&0u32.to_le_bytes());
        rec.extend_from_slice(&70_000u64.to_le_bytes());
        rec.extend_from_slice(&70_000u64.to_le_bytes());
        rec.extend_from_slice(&5_000_000u64.to_le_bytes());
        rec.extend_from_slice(&0x2_0000_0000u64.to_le_bytes());
        assert_eq!(rec.len(), Zip64Eocd::SIZE);
        let rec = Zip64Eocd::from_bytes(&rec).unwrap();
        assert_eq!(rec.volume_entries, 70_000);
        assert_eq!(rec.total_entries, 70_000);
        assert_eq!(rec.cd_size, 5_000_000);
        assert_eq!(rec.cd_offset, 0x2_0000_0000);

        assert!(matches!(
            Zip64Eocd::from_bytes(&[0x50, 0x4b, 0x06, 0x06]),
            Err(FormatError::Truncated { .. })
        ));
    }

    #[test]
    fn decodes_local_header() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&LocalFileHeader::SIGNATURE.to_le_bytes());
        buf.extend_from_slice(&20u16.to_le_bytes());
        buf.extend_from_slice(&FLAG_DATA_DESCRIPTOR.to_le_bytes());
        buf.extend_from_slice(&8u16.to_le_bytes());
        buf.extend_from_slice(&0u16.to_le_bytes());
        buf.extend_from_slice(&0u16.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(&5u16.to_le_bytes());
        buf.extend_from_slice(&9u16.to_le_bytes());
        let lfh = LocalFileHeader::from_bytes(&buf).unwrap();
        assert_eq!(lfh.flags, FLAG_DATA_DESCRIPTOR);
        assert_eq!(CompressionMethod::from_u16(lfh.method), CompressionMethod::Deflate);
        assert_eq!(lfh.total_len(), 30 + 5 + 9);
    }

    #[test]
    fn compression_method_codes() {
        assert_eq!(CompressionMethod::from_u16(0), CompressionMethod::Stored);
        assert_eq!(CompressionMethod::from_u16(14), CompressionMethod::Unknown(14));
        assert_eq!(CompressionMethod::Unknown(14).as_u16(), 14);
        assert_eq!(CompressionMethod::Deflate.as_u16(), 8);
    }
}
