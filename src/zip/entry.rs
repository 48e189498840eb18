//! One archive member as described by the central directory.
//!
//! An entry is built in two steps: the fixed 46-byte header first, then the
//! variable trailer (name, extra field, comment). In lazy mode only the name
//! is decoded up front; the entry keeps a shared handle on the raw central
//! directory block and decodes the rest on first use.

use std::ops::Range;
use std::sync::Arc;

use encoding_rs::Encoding;
use time::PrimitiveDateTime;
use tracing::trace;

use crate::error::{Error, FormatError, Result};

use super::bytes::{self, u32_le, u64_le};
use super::extra::{ExtraField, ExtraFields};
use super::structures::{
    CentralDirectoryHeader, CompressionMethod, FLAG_DATA_DESCRIPTOR, FLAG_ENCRYPTED,
    LocalFileHeader, ZIP64_PLACEHOLDER_16, ZIP64_PLACEHOLDER_32,
};

const PLACEHOLDER_64: u64 = ZIP64_PLACEHOLDER_32 as u64;

/// Materialization state of the extra field and comment.
#[derive(Debug, Clone)]
enum Trailer {
    Parsed,
    /// `range` covers the extra field and comment inside `block`.
    Unparsed { block: Arc<[u8]>, range: Range<usize> },
}

/// Parsed ZIP file entry information
#[derive(Debug, Clone)]
pub struct ZipEntry {
    pub name: String,
    pub version_made_by: u16,
    pub version_needed: u16,
    pub flags: u16,
    pub method: u16,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    /// Decoded from the DOS time/date; see [`ZipEntry::has_valid_timestamp`].
    pub modified: PrimitiveDateTime,
    pub crc32: u32,
    pub compressed_size: u64,
    pub size: u64,
    pub disk_start: u32,
    pub internal_attrs: u16,
    pub external_attrs: u32,
    pub lfh_offset: u64,
    pub comment: Option<String>,
    pub is_directory: bool,
    name_len: u16,
    extra_len: u16,
    comment_len: u16,
    trailer: Trailer,
}

fn decode_text(raw: &[u8], encoding: &'static Encoding) -> String {
    let (text, _had_errors) = encoding.decode_without_bom_handling(raw);
    text.into_owned()
}

impl ZipEntry {
    /// Decode the fixed central directory header at `offset`.
    ///
    /// Returns the entry and the number of bytes consumed (always 46). The
    /// trailer still has to be decoded with [`ZipEntry::decode_trailer`].
    pub fn decode_fixed_header(
        buf: &[u8],
        offset: usize,
    ) -> std::result::Result<(Self, usize), FormatError> {
        let header =
            CentralDirectoryHeader::from_bytes(buf, offset).map_err(|err| FormatError::BadEntry {
                offset,
                source: Box::new(err),
            })?;

        let entry = Self {
            name: String::new(),
            version_made_by: header.version_made_by,
            version_needed: header.version_needed,
            flags: header.flags,
            method: header.method,
            last_mod_time: header.last_mod_time,
            last_mod_date: header.last_mod_date,
            modified: bytes::dos_datetime(header.last_mod_time, header.last_mod_date),
            crc32: header.crc32,
            compressed_size: header.compressed_size.into(),
            size: header.uncompressed_size.into(),
            disk_start: header.disk_start.into(),
            internal_attrs: header.internal_attrs,
            external_attrs: header.external_attrs,
            lfh_offset: header.lfh_offset.into(),
            comment: None,
            is_directory: false,
            name_len: header.name_len,
            extra_len: header.extra_len,
            comment_len: header.comment_len,
            trailer: Trailer::Parsed,
        };

        Ok((entry, CentralDirectoryHeader::SIZE))
    }

    /// Length of name + extra field + comment following the fixed header.
    pub fn trailer_len(&self) -> usize {
        usize::from(self.name_len) + usize::from(self.extra_len) + usize::from(self.comment_len)
    }

    /// Decode name, extra field and comment starting at `offset`.
    ///
    /// Undecodable bytes are replaced, never rejected. A zero-length comment
    /// leaves [`ZipEntry::comment`] as `None`.
    pub fn decode_trailer(
        &mut self,
        buf: &[u8],
        offset: usize,
        encoding: &'static Encoding,
    ) -> std::result::Result<(), FormatError> {
        let end = offset + self.trailer_len();
        if end > buf.len() {
            return Err(FormatError::Truncated {
                record: "central directory entry",
                needed: self.trailer_len() as u64,
                available: buf.len().saturating_sub(offset) as u64,
            });
        }

        let rest = self.decode_name(buf, offset, encoding)?;
        self.decode_extra_and_comment(&buf[rest..end], encoding);
        Ok(())
    }

    /// Decode only the name, returning the offset just past it.
    pub(crate) fn decode_name(
        &mut self,
        buf: &[u8],
        offset: usize,
        encoding: &'static Encoding,
    ) -> std::result::Result<usize, FormatError> {
        let end = offset + usize::from(self.name_len);
        let raw = buf.get(offset..end).ok_or(FormatError::Truncated {
            record: "central directory entry name",
            needed: self.name_len.into(),
            available: buf.len().saturating_sub(offset) as u64,
        })?;

        self.name = decode_text(raw, encoding);
        self.is_directory = self.name.ends_with('/') || self.name.ends_with('\\');
        Ok(end)
    }

    /// Defer the extra field and comment to [`ZipEntry::ensure_parsed`].
    pub(crate) fn defer_trailer(&mut self, block: Arc<[u8]>, start: usize) {
        let len = usize::from(self.extra_len) + usize::from(self.comment_len);
        self.trailer = Trailer::Unparsed {
            block,
            range: start..start + len,
        };
    }

    fn decode_extra_and_comment(&mut self, rest: &[u8], encoding: &'static Encoding) {
        let (extra, comment) = rest.split_at(usize::from(self.extra_len).min(rest.len()));

        if !extra.is_empty() {
            self.parse_extra(extra);
        }

        self.comment = if comment.is_empty() {
            None
        } else {
            Some(decode_text(comment, encoding))
        };
        self.trailer = Trailer::Parsed;
    }

    /// Whether the extra field and comment have been decoded.
    pub fn is_parsed(&self) -> bool {
        matches!(self.trailer, Trailer::Parsed)
    }

    /// Decode a deferred trailer. No-op for entries that are already parsed.
    pub fn ensure_parsed(&mut self, encoding: &'static Encoding) -> Result<()> {
        let Trailer::Unparsed { block, range } = &self.trailer else {
            return Ok(());
        };

        let block = Arc::clone(block);
        let rest = block.get(range.clone()).ok_or(FormatError::Truncated {
            record: "central directory entry",
            needed: range.end as u64,
            available: block.len() as u64,
        })?;

        trace!(name = %self.name, "parsing deferred entry trailer");
        self.decode_extra_and_comment(rest, encoding);
        Ok(())
    }

    /// Apply every recognized sub-record of an extra block.
    pub fn parse_extra(&mut self, block: &[u8]) {
        for field in ExtraFields::new(block) {
            match field {
                ExtraField::Zip64(data) => self.apply_zip64(data),
                ExtraField::UnicodePath(data) => self.apply_unicode_path(data),
                ExtraField::Unknown { id, data } => {
                    trace!(id, len = data.len(), "skipping extra sub-record");
                }
            }
        }
    }

    /// ZIP64 extended information.
    ///
    /// Values are present only for fields whose header value is the
    /// placeholder, in the fixed order size, compressed size, local header
    /// offset, disk start.
    fn apply_zip64(&mut self, data: &[u8]) {
        let mut pos = 0;

        if self.size == PLACEHOLDER_64 {
            if let Ok(value) = u64_le(data, pos) {
                self.size = value;
                pos += 8;
            }
        }
        if self.compressed_size == PLACEHOLDER_64 {
            if let Ok(value) = u64_le(data, pos) {
                self.compressed_size = value;
                pos += 8;
            }
        }
        if self.lfh_offset == PLACEHOLDER_64 {
            if let Ok(value) = u64_le(data, pos) {
                self.lfh_offset = value;
                pos += 8;
            }
        }
        if self.disk_start == u32::from(ZIP64_PLACEHOLDER_16) {
            if let Ok(value) = u32_le(data, pos) {
                self.disk_start = value;
            }
        }
    }

    /// Info-ZIP Unicode path: version (1 byte), CRC-32 of the header name
    /// (4 bytes), UTF-8 name.
    fn apply_unicode_path(&mut self, data: &[u8]) {
        if data.len() < 5 {
            return;
        }
        self.name = String::from_utf8_lossy(&data[5..]).into_owned();
    }

    /// Take version, flags, method and timestamp from the local header.
    ///
    /// CRC and sizes are only taken when nonzero (and, for sizes, not the
    /// ZIP64 placeholder); a zero there means "see the central directory".
    /// A CRC that is genuinely zero is therefore indistinguishable from an
    /// absent one.
    pub fn apply_local_header(&mut self, lfh: &LocalFileHeader) {
        self.version_needed = lfh.version_needed;
        self.flags = lfh.flags;
        self.method = lfh.method;
        self.last_mod_time = lfh.last_mod_time;
        self.last_mod_date = lfh.last_mod_date;
        self.modified = bytes::dos_datetime(lfh.last_mod_time, lfh.last_mod_date);

        if lfh.crc32 != 0 {
            self.crc32 = lfh.crc32;
        }
        if lfh.compressed_size != 0 && lfh.compressed_size != ZIP64_PLACEHOLDER_32 {
            self.compressed_size = lfh.compressed_size.into();
        }
        if lfh.uncompressed_size != 0 && lfh.uncompressed_size != ZIP64_PLACEHOLDER_32 {
            self.size = lfh.uncompressed_size.into();
        }
    }

    /// Reject names that could escape an extraction directory: backslashes,
    /// a `name:` prefix (drive letters, URL schemes), a leading `/`, or any
    /// `..` segment.
    pub fn validate_name(&self) -> Result<()> {
        let name = self.name.as_str();

        let has_prefix = name.split_once(':').is_some_and(|(head, _)| {
            !head.is_empty() && head.chars().all(|c| c.is_alphanumeric() || c == '_')
        });

        if name.contains('\\')
            || has_prefix
            || name.starts_with('/')
            || name.split('/').any(|segment| segment == "..")
        {
            return Err(Error::UnsafeName(self.name.clone()));
        }

        Ok(())
    }

    pub fn compression_method(&self) -> CompressionMethod {
        CompressionMethod::from_u16(self.method)
    }

    /// Flag bit 3: CRC and sizes were written after the data.
    pub fn has_data_descriptor(&self) -> bool {
        self.flags & FLAG_DATA_DESCRIPTOR != 0
    }

    pub fn is_encrypted(&self) -> bool {
        self.flags & FLAG_ENCRYPTED != 0
    }

    /// False when the DOS timestamp was invalid and [`ZipEntry::modified`]
    /// holds the 1970-01-01 sentinel.
    pub fn has_valid_timestamp(&self) -> bool {
        self.modified != bytes::epoch_sentinel()
    }

    /// A size or offset still holds a ZIP64 placeholder no extra field
    /// replaced, so it cannot be trusted.
    pub fn has_unresolved_zip64(&self) -> bool {
        self.size == PLACEHOLDER_64
            || self.compressed_size == PLACEHOLDER_64
            || self.lfh_offset == PLACEHOLDER_64
    }
}
