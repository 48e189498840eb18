use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use encoding_rs::Encoding;
use flate2::read::DeflateDecoder;
use tracing::debug;

use crate::error::{Error, FormatError, Result, Unsupported};
use crate::io::ReadAt;

use super::entry::ZipEntry;
use super::index::{ZipIndex, resolve_entry};
use super::structures::CompressionMethod;

/// Upper bound on the output buffer reserved up front from a declared size.
const MAX_PREALLOC: u64 = 16 * 1024 * 1024;

/// Read, decompress and verify one entry's data.
pub(crate) fn read_entry_data<R: ReadAt + ?Sized>(
    reader: &mut R,
    entry: &mut ZipEntry,
    encoding: &'static Encoding,
) -> Result<Vec<u8>> {
    let data_offset = resolve_entry(reader, entry, encoding)?;

    if entry.is_encrypted() {
        return Err(Unsupported::Encrypted.into());
    }

    // The declared size must fit in the source before anything is allocated
    let source_size = reader.size();
    let len = data_offset
        .checked_add(entry.compressed_size)
        .filter(|&end| end <= source_size)
        .and_then(|_| usize::try_from(entry.compressed_size).ok())
        .ok_or(FormatError::Truncated {
            record: "entry data",
            needed: entry.compressed_size,
            available: source_size.saturating_sub(data_offset),
        })?;

    let mut raw = vec![0u8; len];
    reader.read_at(data_offset, &mut raw)?;

    let data = match entry.compression_method() {
        CompressionMethod::Stored => raw,
        CompressionMethod::Deflate => inflate(&raw, entry.size)?,
        CompressionMethod::Unknown(code) => return Err(Unsupported::Method(code).into()),
    };

    if data.len() as u64 != entry.size {
        return Err(Error::SizeMismatch {
            expected: entry.size,
            actual: data.len() as u64,
        });
    }

    // With a data descriptor the header CRC is not reliable and the
    // descriptor itself is not read.
    if !entry.has_data_descriptor() {
        let actual = crc32fast::hash(&data);
        if actual != entry.crc32 {
            return Err(Error::CrcMismatch {
                expected: entry.crc32,
                actual,
            });
        }
    } else {
        debug!(name = %entry.name, "data descriptor present, skipping CRC check");
    }

    Ok(data)
}

/// Inflate a raw DEFLATE stream, producing at most `size + 1` bytes so an
/// understated size is detected without inflating the whole stream.
fn inflate(raw: &[u8], size: u64) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(size.min(MAX_PREALLOC) as usize);
    DeflateDecoder::new(raw)
        .take(size.saturating_add(1))
        .read_to_end(&mut out)
        .map_err(FormatError::CorruptStream)?;
    Ok(out)
}

impl<R: ReadAt> ZipIndex<R> {
    /// Read an entry's uncompressed data.
    ///
    /// The entry is updated in place: lazy trailers are decoded and local
    /// header values applied.
    pub fn read_entry(&mut self, entry: &mut ZipEntry) -> Result<Vec<u8>> {
        let encoding = self.encoding();
        read_entry_data(self.reader_mut(), entry, encoding)
    }

    /// Read a stored entry's uncompressed data by name.
    pub fn read_payload(&mut self, name: &str) -> Result<Vec<u8>> {
        let encoding = self.encoding();
        let (reader, entry) = self.reader_and_entry(name)?;
        read_entry_data(reader, entry, encoding)
    }

    /// Extract a stored entry to disk, creating parent directories.
    ///
    /// The name is not checked here; callers extracting untrusted archives
    /// should run [`ZipEntry::validate_name`] first.
    pub fn extract_to_file(&mut self, name: &str, output_path: &Path) -> Result<()> {
        let data = self.read_payload(name)?;

        if let Some(parent) = output_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        fs::write(output_path, &data)?;
        Ok(())
    }

    /// Extract a stored entry into any writer.
    pub fn extract_to_writer<W: Write + ?Sized>(&mut self, name: &str, out: &mut W) -> Result<()> {
        let data = self.read_payload(name)?;
        out.write_all(&data)?;
        Ok(())
    }
}
