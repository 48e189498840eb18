//! Bounds-checked little-endian field access and DOS timestamp decoding.

use byteorder::{ByteOrder, LittleEndian};
use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, Time};

use crate::error::FormatError;

fn field(buf: &[u8], off: usize, width: usize) -> Result<&[u8], FormatError> {
    match off.checked_add(width) {
        Some(end) if end <= buf.len() => Ok(&buf[off..end]),
        _ => Err(FormatError::OutOfBounds {
            offset: off,
            width,
            len: buf.len(),
        }),
    }
}

pub fn u8(buf: &[u8], off: usize) -> Result<u8, FormatError> {
    Ok(field(buf, off, 1)?[0])
}

pub fn u16_le(buf: &[u8], off: usize) -> Result<u16, FormatError> {
    Ok(LittleEndian::read_u16(field(buf, off, 2)?))
}

pub fn u32_le(buf: &[u8], off: usize) -> Result<u32, FormatError> {
    Ok(LittleEndian::read_u32(field(buf, off, 4)?))
}

pub fn u64_le(buf: &[u8], off: usize) -> Result<u64, FormatError> {
    Ok(LittleEndian::read_u64(field(buf, off, 8)?))
}

/// Timestamp returned for DOS date/time pairs that are not a real calendar
/// instant (1970-01-01 00:00:00).
pub fn epoch_sentinel() -> PrimitiveDateTime {
    let epoch = OffsetDateTime::UNIX_EPOCH;
    PrimitiveDateTime::new(epoch.date(), epoch.time())
}

/// Decode a packed MS-DOS time/date pair.
///
/// `time16` packs hour (5 bits), minute (6 bits) and second/2 (5 bits) from
/// the most significant bit down; `date16` packs years since 1980 (7 bits),
/// month (4 bits) and day (5 bits). Values that do not form a valid civil
/// date/time (month 0, February 30th, second 60...) decode to
/// [`epoch_sentinel`].
pub fn dos_datetime(time16: u16, date16: u16) -> PrimitiveDateTime {
    let hour = (time16 >> 11) as u8;
    let minute = ((time16 >> 5) & 0x3F) as u8;
    let second = ((time16 & 0x1F) * 2) as u8;

    let year = i32::from(date16 >> 9) + 1980;
    let month = ((date16 >> 5) & 0x0F) as u8;
    let day = (date16 & 0x1F) as u8;

    let date = Month::try_from(month)
        .ok()
        .and_then(|month| Date::from_calendar_date(year, month, day).ok());
    let time = Time::from_hms(hour, minute, second).ok();

    match (date, time) {
        (Some(date), Some(time)) => PrimitiveDateTime::new(date, time),
        _ => epoch_sentinel(),
    }
}
