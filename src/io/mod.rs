//! Random-access byte sources an archive index can read from.

mod http;
mod local;

pub use http::HttpRangeReader;
pub use local::LocalFileReader;

use std::io::{self, Cursor};

/// Trait for random access reading from a data source
///
/// Reads take `&mut self`: sources such as files share one seek position, so
/// concurrent use needs external locking around each call.
pub trait ReadAt {
    /// Fill `buf` with the bytes starting at `offset`.
    ///
    /// Fails with [`io::ErrorKind::UnexpectedEof`] if the source ends first.
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()>;

    /// Get the total size of the data source
    fn size(&self) -> u64;
}

impl<R: ReadAt + ?Sized> ReadAt for Box<R> {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        (**self).read_at(offset, buf)
    }

    fn size(&self) -> u64 {
        (**self).size()
    }
}

/// In-memory archives.
impl<T: AsRef<[u8]>> ReadAt for Cursor<T> {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        let data = self.get_ref().as_ref();
        let src = usize::try_from(offset)
            .ok()
            .and_then(|start| data.get(start..start.checked_add(buf.len())?))
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!(
                        "read of {} bytes at offset {offset} past end of {} byte buffer",
                        buf.len(),
                        data.len()
                    ),
                )
            })?;
        buf.copy_from_slice(src);
        self.set_position(offset + buf.len() as u64);
        Ok(())
    }

    fn size(&self) -> u64 {
        self.get_ref().as_ref().len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_reads_exact_ranges() {
        let mut src = Cursor::new(b"0123456789".to_vec());
        assert_eq!(src.size(), 10);

        let mut buf = [0u8; 3];
        src.read_at(4, &mut buf).unwrap();
        assert_eq!(&buf, b"456");

        let err = src.read_at(8, &mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn boxed_sources_forward() {
        let mut src: Box<dyn ReadAt> = Box::new(Cursor::new(vec![1u8, 2, 3]));
        let mut buf = [0u8; 2];
        src.read_at(1, &mut buf).unwrap();
        assert_eq!(buf, [2, 3]);
        assert_eq!(src.size(), 3);
    }
}
