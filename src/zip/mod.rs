//! ZIP archive parsing and random access.
//!
//! ## Architecture
//!
//! The module is organized leaf-first:
//!
//! - [`bytes`]: bounds-checked little-endian reads and DOS timestamps
//! - [`structures`]: fixed-size records (EOCD, ZIP64 locator/EOCD, central and local headers)
//! - [`extra`]: extra field sub-records
//! - [`entry`]: one archive member, eagerly or lazily decoded
//! - [`index`]: EOCD discovery, Central Directory loading, local header resolution
//! - `extractor`: reading, decompressing and verifying entry data
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! ## Supported Features
//!
//! - STORED (no compression) and DEFLATE compression methods
//! - ZIP64 extra fields on individual entries
//! - Info-ZIP Unicode path extra fields
//! - CRC-32 verification
//!
//! ## Limitations
//!
//! - Archives whose EOCD needs ZIP64 are rejected
//! - No encryption support
//! - No multi-disk archive support
//! - Data descriptors are not read; entries using them skip the CRC check

pub mod bytes;
pub mod entry;
pub mod extra;
pub mod index;
pub mod structures;

mod extractor;

pub use entry::ZipEntry;
pub use extra::{ExtraField, ExtraFields};
pub use index::{LoadMode, OpenOptions, ZipIndex};
pub use structures::*;
