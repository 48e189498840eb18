//! Random-access index over a ZIP archive.
//!
//! This module locates the End of Central Directory (EOCD) record, reads the
//! Central Directory in one request and builds a name-keyed table of entries.
//!
//! ## Parsing Strategy
//!
//! ZIP files are designed to be read from the end:
//! 1. Scan the file's tail backwards for the EOCD signature
//! 2. Read the Central Directory the EOCD points at
//! 3. Decode every entry header, eagerly or lazily
//! 4. For data access, read the entry's Local File Header to find its data
//!
//! Only the tail and the Central Directory are read up front, which keeps
//! opening cheap for remote sources.

use std::path::Path;
use std::sync::Arc;

use encoding_rs::Encoding;
use indexmap::IndexMap;
use memchr::memmem;
use tracing::{debug, warn};

use crate::error::{Error, FormatError, Result, Unsupported};
use crate::io::{LocalFileReader, ReadAt};

use super::entry::ZipEntry;
use super::structures::{
    CentralDirectoryHeader, EndOfCentralDirectory, LocalFileHeader, MAX_COMMENT_SIZE,
};

/// Options controlling how an archive is indexed.
#[derive(Debug, Clone)]
pub struct OpenOptions {
    /// Keep a name-keyed table of entries for [`ZipIndex::lookup`].
    pub store_entries: bool,
    /// Defer decoding of each entry's extra field and comment until first use.
    pub lazy_entries: bool,
    /// Encoding label (WHATWG names such as `utf-8`, `shift_jis`, `windows-1252`)
    /// used for entry names and comments.
    ///
    /// IBM437 (`cp437`), the format's legacy default, is not a WHATWG
    /// encoding and is rejected with [`Error::UnknownEncoding`].
    pub encoding: String,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            store_entries: true,
            lazy_entries: false,
            encoding: "utf-8".to_string(),
        }
    }
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store_entries(mut self, store: bool) -> Self {
        self.store_entries = store;
        self
    }

    pub fn lazy_entries(mut self, lazy: bool) -> Self {
        self.lazy_entries = lazy;
        self
    }

    /// Set the name and comment encoding. See [`OpenOptions::encoding`] for
    /// accepted labels; `cp437` is not among them.
    pub fn encoding(mut self, label: impl Into<String>) -> Self {
        self.encoding = label.into();
        self
    }
}

/// How much of each central directory record is decoded while loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Decode name, extra field and comment immediately.
    Eager,
    /// Decode the name only; the rest on first access.
    Lazy,
}

/// Random-access index over a ZIP archive.
///
/// Owns the byte source for its whole lifetime; [`ZipIndex::close`] hands it
/// back. All reads block the calling thread.
///
/// ## Example
///
/// ```no_run
/// use streamzip::{OpenOptions, ZipIndex};
///
/// # fn main() -> streamzip::Result<()> {
/// let mut index = ZipIndex::open_path("archive.zip", &OpenOptions::default())?;
/// for entry in index.entries()?.values() {
///     println!("{} ({} bytes)", entry.name, entry.size);
/// }
/// let data = index.read_payload("docs/readme.txt")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ZipIndex<R: ReadAt> {
    /// The underlying data source
    reader: R,
    /// Total size of the archive in bytes
    size: u64,
    header: EndOfCentralDirectory,
    eocd_offset: u64,
    comment: Option<String>,
    encoding: &'static Encoding,
    entries: Option<IndexMap<String, ZipEntry>>,
}

impl ZipIndex<LocalFileReader> {
    /// Open and index an archive on the local filesystem.
    pub fn open_path(path: impl AsRef<Path>, options: &OpenOptions) -> Result<Self> {
        let reader = LocalFileReader::new(path.as_ref())?;
        Self::open(reader, options)
    }
}

impl<R: ReadAt> ZipIndex<R> {
    /// Locate the EOCD, then load the Central Directory.
    ///
    /// # Arguments
    ///
    /// * `reader` - The archive's byte source; the index takes ownership
    /// * `options` - Storage, laziness and text encoding settings
    ///
    /// # Errors
    ///
    /// Fails if the encoding label is unknown, no EOCD can be found, the
    /// archive needs ZIP64, or any Central Directory record is malformed.
    /// No partially built index is ever returned.
    pub fn open(mut reader: R, options: &OpenOptions) -> Result<Self> {
        let encoding = Encoding::for_label(options.encoding.as_bytes())
            .ok_or_else(|| Error::UnknownEncoding(options.encoding.clone()))?;

        let size = reader.size();
        let (header, eocd_offset, comment) = find_eocd(&mut reader, size, encoding)?;

        let mut index = Self {
            reader,
            size,
            header,
            eocd_offset,
            comment,
            encoding,
            entries: None,
        };

        let mode = if options.lazy_entries {
            LoadMode::Lazy
        } else {
            LoadMode::Eager
        };
        index.load_entries(mode, options.store_entries)?;

        Ok(index)
    }

    /// Read the Central Directory and decode every entry in it.
    ///
    /// Entries are inserted in directory order. The format does not forbid
    /// duplicate names; a later entry replaces an earlier one of the same name.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::Truncated`] if the declared entry count does not
    /// fit in the declared directory size, or if the directory extends past
    /// the end of the file.
    fn load_entries(&mut self, mode: LoadMode, store: bool) -> Result<()> {
        let cd_offset = u64::from(self.header.cd_offset);
        let cd_size = u64::from(self.header.cd_size);
        let count = usize::from(self.header.volume_entries);

        if cd_offset + cd_size > self.size {
            return Err(FormatError::Truncated {
                record: "central directory",
                needed: cd_offset + cd_size,
                available: self.size,
            }
            .into());
        }

        debug!(cd_offset, cd_size, count, ?mode, "reading central directory");

        // Read the entire Central Directory in one request
        let mut data = vec![0u8; cd_size as usize];
        self.reader.read_at(cd_offset, &mut data)?;
        let block: Arc<[u8]> = data.into();

        let mut entries = store.then(|| IndexMap::with_capacity(count));
        let mut pos = 0;

        for _ in 0..count {
            let header_end = pos + CentralDirectoryHeader::SIZE;
            if header_end > block.len() {
                return Err(FormatError::Truncated {
                    record: "central directory",
                    needed: header_end as u64,
                    available: block.len() as u64,
                }
                .into());
            }

            let (mut entry, used) = ZipEntry::decode_fixed_header(&block, pos)?;
            let trailer_start = pos + used;
            let next = trailer_start + entry.trailer_len();
            if next > block.len() {
                return Err(FormatError::Truncated {
                    record: "central directory",
                    needed: next as u64,
                    available: block.len() as u64,
                }
                .into());
            }

            match mode {
                LoadMode::Eager => entry.decode_trailer(&block, trailer_start, self.encoding)?,
                LoadMode::Lazy => {
                    let rest = entry.decode_name(&block, trailer_start, self.encoding)?;
                    entry.defer_trailer(Arc::clone(&block), rest);
                }
            }
            pos = next;

            if let Some(entries) = entries.as_mut() {
                if let Some(previous) = entries.insert(entry.name.clone(), entry) {
                    warn!(name = %previous.name, "duplicate entry name, keeping the later one");
                }
            }
        }

        self.entries = entries;
        Ok(())
    }

    /// Number of entries the EOCD declares for this disk.
    pub fn entries_count(&self) -> usize {
        usize::from(self.header.volume_entries)
    }

    /// Archive comment, absent when the EOCD declares a zero-length comment.
    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    pub fn header(&self) -> &EndOfCentralDirectory {
        &self.header
    }

    /// Byte offset of the EOCD record within the archive.
    pub fn eocd_offset(&self) -> u64 {
        self.eocd_offset
    }

    /// Total size of the archive in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    /// All stored entries, in Central Directory order.
    pub fn entries(&self) -> Result<&IndexMap<String, ZipEntry>> {
        self.entries.as_ref().ok_or(Error::EntriesNotStored)
    }

    /// Look up an entry by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EntriesNotStored`] if the index was opened with
    /// `store_entries` disabled.
    pub fn lookup(&self, name: &str) -> Result<Option<&ZipEntry>> {
        Ok(self.entries()?.get(name))
    }

    pub fn lookup_mut(&mut self, name: &str) -> Result<Option<&mut ZipEntry>> {
        let entries = self.entries.as_mut().ok_or(Error::EntriesNotStored)?;
        Ok(entries.get_mut(name))
    }

    /// Decode the deferred trailer of every stored entry.
    pub fn parse_all(&mut self) -> Result<()> {
        let encoding = self.encoding;
        let entries = self.entries.as_mut().ok_or(Error::EntriesNotStored)?;
        for entry in entries.values_mut() {
            entry.ensure_parsed(encoding)?;
        }
        Ok(())
    }

    /// Split borrow of the byte source and one stored entry.
    pub(crate) fn reader_and_entry(&mut self, name: &str) -> Result<(&mut R, &mut ZipEntry)> {
        let entries = self.entries.as_mut().ok_or(Error::EntriesNotStored)?;
        let entry = entries
            .get_mut(name)
            .ok_or_else(|| Error::EntryNotFound(name.to_string()))?;
        Ok((&mut self.reader, entry))
    }

    pub(crate) fn reader_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    /// Get the actual data offset for a file entry.
    ///
    /// The Local File Header (LFH) has variable-length fields (filename,
    /// extra field) that may differ from the Central Directory entry.
    /// This method reads the LFH to calculate where the actual file
    /// data begins, and takes version, flags, method, timestamp and any
    /// nonzero CRC/sizes from it.
    ///
    /// # Arguments
    ///
    /// * `entry` - An entry of this archive; lazily loaded entries are parsed first
    ///
    /// # Returns
    ///
    /// The byte offset where the compressed file data begins.
    ///
    /// # Errors
    ///
    /// [`Error::IsDirectory`] for directory entries (nothing is read),
    /// [`Error::LocalHeaderMismatch`] if the LFH signature is wrong, and
    /// [`Unsupported::Zip64Required`] if a size or offset is still a ZIP64
    /// placeholder.
    pub fn resolve(&mut self, entry: &mut ZipEntry) -> Result<u64> {
        resolve_entry(&mut self.reader, entry, self.encoding)
    }

    /// Release the index and return the byte source.
    pub fn close(self) -> R {
        self.reader
    }
}

pub(crate) fn resolve_entry<R: ReadAt + ?Sized>(
    reader: &mut R,
    entry: &mut ZipEntry,
    encoding: &'static Encoding,
) -> Result<u64> {
    entry.ensure_parsed(encoding)?;

    if entry.is_directory {
        return Err(Error::IsDirectory(entry.name.clone()));
    }
    if entry.has_unresolved_zip64() {
        return Err(Unsupported::Zip64Required.into());
    }

    let mut lfh_buf = [0u8; LocalFileHeader::SIZE];
    reader.read_at(entry.lfh_offset, &mut lfh_buf)?;

    let lfh = match LocalFileHeader::from_bytes(&lfh_buf) {
        Ok(lfh) => lfh,
        Err(FormatError::BadSignature { .. }) => {
            return Err(Error::LocalHeaderMismatch {
                offset: entry.lfh_offset,
            });
        }
        Err(err) => return Err(err.into()),
    };
    entry.apply_local_header(&lfh);

    // Data starts after: LFH (30 bytes) + filename + extra field, using the
    // local header's own lengths
    let data_offset = entry.lfh_offset + lfh.total_len();
    debug!(name = %entry.name, lfh_offset = entry.lfh_offset, data_offset, "resolved entry");

    Ok(data_offset)
}

/// Find and parse the End of Central Directory record.
///
/// Reads up to `22 + 65535` bytes from the end of the file and scans them
/// backwards for the EOCD signature. The rightmost candidate whose fixed
/// record and declared comment fit inside the window wins; bytes after the
/// comment are tolerated.
///
/// # Returns
///
/// The EOCD record, its offset in the file and the decoded archive comment.
///
/// # Errors
///
/// [`Error::EocdNotFound`] if no candidate exists, and
/// [`Unsupported::Zip64Required`] if the record holds ZIP64 placeholders.
fn find_eocd<R: ReadAt + ?Sized>(
    reader: &mut R,
    size: u64,
    encoding: &'static Encoding,
) -> Result<(EndOfCentralDirectory, u64, Option<String>)> {
    let search_size = ((EndOfCentralDirectory::SIZE + MAX_COMMENT_SIZE) as u64).min(size);
    let search_start = size - search_size;

    let mut buf = vec![0u8; search_size as usize];
    reader.read_at(search_start, &mut buf)?;

    let signature = EndOfCentralDirectory::SIGNATURE.to_le_bytes();
    for pos in memmem::rfind_iter(&buf, &signature) {
        let Some(record) = buf.get(pos..pos + EndOfCentralDirectory::SIZE) else {
            continue;
        };
        let eocd = EndOfCentralDirectory::from_bytes(record)?;

        let comment_start = pos + EndOfCentralDirectory::SIZE;
        let comment_end = comment_start + usize::from(eocd.comment_len);
        let Some(raw_comment) = buf.get(comment_start..comment_end) else {
            debug!(
                offset = search_start + pos as u64,
                comment_len = eocd.comment_len,
                "EOCD candidate comment overruns the file, skipping"
            );
            continue;
        };

        let offset = search_start + pos as u64;
        debug!(
            offset,
            entries = eocd.volume_entries,
            cd_offset = eocd.cd_offset,
            cd_size = eocd.cd_size,
            "found end of central directory"
        );

        let comment = (!raw_comment.is_empty())
            .then(|| encoding.decode_without_bom_handling(raw_comment).0.into_owned());

        if eocd.is_zip64() {
            return Err(Unsupported::Zip64Required.into());
        }

        return Ok((eocd, offset, comment));
    }

    Err(Error::EocdNotFound)
}
