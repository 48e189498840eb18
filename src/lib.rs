//! # streamzip
//!
//! A read-only, random-access index over ZIP archives.
//!
//! Opening an archive reads only its tail and its Central Directory; entry
//! data is fetched on demand by seeking to the entry's local header. This
//! works the same for local files, in-memory buffers and remote files served
//! over HTTP Range requests.
//!
//! ## Features
//!
//! - Backward EOCD scan tolerant of archive comments
//! - Eager or lazy decoding of Central Directory entries
//! - ZIP64 extra fields and Info-ZIP Unicode paths on entries
//! - STORED and DEFLATE entries, verified by size and CRC-32
//! - Entry names decoded in any WHATWG encoding, with replacement characters
//! - Path-traversal check for callers that extract to disk
//!
//! ## Example
//!
//! ```no_run
//! use streamzip::{OpenOptions, ZipIndex};
//!
//! fn main() -> streamzip::Result<()> {
//!     let options = OpenOptions::new().lazy_entries(true);
//!     let mut index = ZipIndex::open_path("archive.zip", &options)?;
//!
//!     println!("{} entries", index.entries_count());
//!     if let Some(comment) = index.comment() {
//!         println!("comment: {comment}");
//!     }
//!
//!     let data = index.read_payload("a.txt")?;
//!     println!("{}", String::from_utf8_lossy(&data));
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod error;
pub mod io;
pub mod zip;

pub use cli::Cli;
pub use error::{Error, ErrorKind, FormatError, Result, Unsupported};
pub use io::{HttpRangeReader, LocalFileReader, ReadAt};
pub use zip::{CompressionMethod, OpenOptions, ZipEntry, ZipIndex};
