//! Extra field sub-records attached to central directory entries.
//!
//! An extra block is a sequence of `(id: u16, len: u16, data: [u8; len])`
//! records. Only the ids this reader acts on get their own variant; anything
//! else comes back as [`ExtraField::Unknown`] so callers can skip it.

use tracing::warn;

use super::bytes::u16_le;

/// ZIP64 extended information
pub const ID_ZIP64: u16 = 0x0001;
/// Info-ZIP Unicode path
pub const ID_UNICODE_PATH: u16 = 0x7075;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtraField<'a> {
    Zip64(&'a [u8]),
    UnicodePath(&'a [u8]),
    Unknown { id: u16, data: &'a [u8] },
}

impl<'a> ExtraField<'a> {
    fn new(id: u16, data: &'a [u8]) -> Self {
        match id {
            ID_ZIP64 => ExtraField::Zip64(data),
            ID_UNICODE_PATH => ExtraField::UnicodePath(data),
            _ => ExtraField::Unknown { id, data },
        }
    }
}

/// Iterator over the sub-records of an extra block.
///
/// Stops at the first sub-record whose header or declared length does not
/// fit in the remaining bytes; everything before it is still yielded.
#[derive(Debug, Clone)]
pub struct ExtraFields<'a> {
    block: &'a [u8],
    pos: usize,
}

impl<'a> ExtraFields<'a> {
    pub fn new(block: &'a [u8]) -> Self {
        Self { block, pos: 0 }
    }
}

impl<'a> Iterator for ExtraFields<'a> {
    type Item = ExtraField<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos + 4 > self.block.len() {
            return None;
        }

        let id = u16_le(self.block, self.pos).ok()?;
        let len = usize::from(u16_le(self.block, self.pos + 2).ok()?);
        let start = self.pos + 4;

        let Some(data) = self.block.get(start..start + len) else {
            warn!(
                id,
                len,
                available = self.block.len() - start,
                "extra sub-record overruns its block, ignoring the rest"
            );
            self.pos = self.block.len();
            return None;
        };

        self.pos = start + len;
        Some(ExtraField::new(id, data))
    }
}
