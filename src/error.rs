//! Error types for archive indexing and entry extraction.

use std::io;

use thiserror::Error;

/// Result type for streamzip operations
pub type Result<T> = std::result::Result<T, Error>;

/// Broad category of an [`Error`].
///
/// Lets callers decide between "the archive is broken", "the archive needs
/// something we do not implement", "this one entry is damaged", "the caller
/// asked for something wrong" and "the byte source failed" without matching
/// every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Format,
    Unsupported,
    Integrity,
    Usage,
    Resource,
}

/// Malformed on-disk structures.
#[derive(Error, Debug)]
pub enum FormatError {
    /// A fixed record did not start with the expected signature
    #[error("invalid {record} signature: expected {expected:#010x}, got {found:#010x}")]
    BadSignature {
        record: &'static str,
        expected: u32,
        found: u32,
    },

    /// Not enough bytes for a fixed record or a declared region
    #[error("truncated {record}: need {needed} bytes, have {available}")]
    Truncated {
        record: &'static str,
        needed: u64,
        available: u64,
    },

    /// A central directory entry header could not be decoded
    #[error("invalid central directory entry at offset {offset}")]
    BadEntry {
        offset: usize,
        #[source]
        source: Box<FormatError>,
    },

    /// A fixed-width field read past the end of its buffer
    #[error("read of {width} bytes at offset {offset} exceeds buffer of {len} bytes")]
    OutOfBounds {
        offset: usize,
        width: usize,
        len: usize,
    },

    /// The compressed stream of an entry is corrupt
    #[error("corrupt compressed stream: {0}")]
    CorruptStream(#[source] io::Error),
}

/// Archive features this reader deliberately does not implement.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unsupported {
    #[error("archive requires ZIP64 support")]
    Zip64Required,

    #[error("compression method {0} is not supported")]
    Method(u16),

    #[error("encrypted entries are not supported")]
    Encrypted,
}

/// streamzip error types
#[derive(Error, Debug)]
pub enum Error {
    /// IO error from the underlying byte source
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("unsupported archive: {0}")]
    Unsupported(#[from] Unsupported),

    /// No end of central directory record in the archive tail
    #[error("end of central directory signature not found")]
    EocdNotFound,

    #[error("local header signature mismatch at offset {offset}")]
    LocalHeaderMismatch { offset: u64 },

    #[error("size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("CRC-32 mismatch: expected {expected:#010x}, got {actual:#010x}")]
    CrcMismatch { expected: u32, actual: u32 },

    #[error("entry not found: {0}")]
    EntryNotFound(String),

    #[error("entry storage is disabled")]
    EntriesNotStored,

    #[error("entry is a directory: {0}")]
    IsDirectory(String),

    /// Name that could escape an extraction root
    #[error("unsafe entry name: {0}")]
    UnsafeName(String),

    #[error("unknown text encoding: {0}")]
    UnknownEncoding(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_) => ErrorKind::Resource,
            Error::Format(_) | Error::EocdNotFound | Error::LocalHeaderMismatch { .. } => {
                ErrorKind::Format
            }
            Error::Unsupported(_) => ErrorKind::Unsupported,
            Error::SizeMismatch { .. } | Error::CrcMismatch { .. } => ErrorKind::Integrity,
            Error::EntryNotFound(_)
            | Error::EntriesNotStored
            | Error::IsDirectory(_)
            | Error::UnsafeName(_)
            | Error::UnknownEncoding(_) => ErrorKind::Usage,
        }
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> io::Error {
        let kind = match &err {
            Error::Io(err) => err.kind(),
            Error::EntryNotFound(_) => io::ErrorKind::NotFound,
            Error::EntriesNotStored | Error::IsDirectory(_) | Error::UnknownEncoding(_) => {
                io::ErrorKind::InvalidInput
            }
            Error::UnsafeName(_) => io::ErrorKind::PermissionDenied,
            Error::Unsupported(_) => io::ErrorKind::Unsupported,
            _ => io::ErrorKind::InvalidData,
        };

        io::Error::new(kind, err)
    }
}
