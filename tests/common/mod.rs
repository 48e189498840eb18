//! Hand-rolled ZIP writer for building test archives byte by byte.

#![allow(dead_code)]

use std::io::Write;

use flate2::Compression;
use flate2::write::DeflateEncoder;

pub const FLAG_DATA_DESCRIPTOR: u16 = 0x0008;

// 2024-06-01 12:30:10
const DOS_TIME: u16 = (12 << 11) | (30 << 5) | 5;
const DOS_DATE: u16 = ((2024 - 1980) << 9) | (6 << 5) | 1;

#[derive(Debug, Clone, Default)]
pub struct Member {
    pub name: Vec<u8>,
    pub data: Vec<u8>,
    pub deflate: bool,
    pub flags: u16,
    /// Extra field bytes written to the central directory only
    pub extra: Vec<u8>,
    pub comment: Vec<u8>,
    /// Put 0xFFFFFFFF in the central sizes and carry them in a ZIP64 extra
    pub zip64_sizes: bool,
}

impl Member {
    pub fn new(name: &str, data: &[u8]) -> Self {
        Self {
            name: name.as_bytes().to_vec(),
            data: data.to_vec(),
            ..Self::default()
        }
    }

    pub fn deflated(mut self) -> Self {
        self.deflate = true;
        self
    }

    pub fn comment(mut self, comment: &str) -> Self {
        self.comment = comment.as_bytes().to_vec();
        self
    }
}

/// Offsets recorded while building, for tests that patch bytes afterwards.
#[derive(Debug)]
pub struct Built {
    pub bytes: Vec<u8>,
    pub local_offsets: Vec<usize>,
    pub data_offsets: Vec<usize>,
    pub central_offsets: Vec<usize>,
    pub cd_offset: usize,
    pub eocd_offset: usize,
}

#[derive(Debug, Default)]
pub struct ArchiveBuilder {
    entries: Vec<Member>,
    comment: Vec<u8>,
}

fn deflate(data: &[u8]) -> Vec<u8> {
    let mut enc = DeflateEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

fn put16(buf: &mut Vec<u8>, v: u16) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stored(self, name: &str, data: &[u8]) -> Self {
        self.entry(Member::new(name, data))
    }

    pub fn deflated(self, name: &str, data: &[u8]) -> Self {
        self.entry(Member::new(name, data).deflated())
    }

    pub fn entry(mut self, member: Member) -> Self {
        self.entries.push(member);
        self
    }

    pub fn comment(mut self, comment: &[u8]) -> Self {
        self.comment = comment.to_vec();
        self
    }

    pub fn bytes(self) -> Vec<u8> {
        self.build().bytes
    }

    pub fn build(self) -> Built {
        let mut out = Vec::new();
        let mut central = Vec::new();
        let mut local_offsets = Vec::new();
        let mut data_offsets = Vec::new();
        let mut central_offsets = Vec::new();

        for member in &self.entries {
            let crc = crc32fast::hash(&member.data);
            let payload = if member.deflate {
                deflate(&member.data)
            } else {
                member.data.clone()
            };
            let method: u16 = if member.deflate { 8 } else { 0 };
            let descriptor = member.flags & FLAG_DATA_DESCRIPTOR != 0;
            let local_offset = out.len();
            local_offsets.push(local_offset);

            // Local file header
            put32(&mut out, 0x0403_4b50);
            put16(&mut out, 20);
            put16(&mut out, member.flags);
            put16(&mut out, method);
            put16(&mut out, DOS_TIME);
            put16(&mut out, DOS_DATE);
            if descriptor {
                put32(&mut out, 0);
                put32(&mut out, 0);
                put32(&mut out, 0);
            } else {
                put32(&mut out, crc);
                put32(&mut out, payload.len() as u32);
                put32(&mut out, member.data.len() as u32);
            }
            put16(&mut out, member.name.len() as u16);
            put16(&mut out, 0);
            out.extend_from_slice(&member.name);
            data_offsets.push(out.len());
            out.extend_from_slice(&payload);

            if descriptor {
                put32(&mut out, 0x0807_4b50);
                put32(&mut out, crc);
                put32(&mut out, payload.len() as u32);
                put32(&mut out, member.data.len() as u32);
            }

            let mut extra = Vec::new();
            if member.zip64_sizes {
                put16(&mut extra, 0x0001);
                put16(&mut extra, 16);
                extra.extend_from_slice(&(member.data.len() as u64).to_le_bytes());
                extra.extend_from_slice(&(payload.len() as u64).to_le_bytes());
            }
            extra.extend_from_slice(&member.extra);

            // Central directory header
            central_offsets.push(central.len());
            put32(&mut central, 0x0201_4b50);
            put16(&mut central, 0x031e);
            put16(&mut central, 20);
            put16(&mut central, member.flags);
            put16(&mut central, method);
            put16(&mut central, DOS_TIME);
            put16(&mut central, DOS_DATE);
            put32(&mut central, crc);
            if member.zip64_sizes {
                put32(&mut central, 0xFFFF_FFFF);
                put32(&mut central, 0xFFFF_FFFF);
            } else {
                put32(&mut central, payload.len() as u32);
                put32(&mut central, member.data.len() as u32);
            }
            put16(&mut central, member.name.len() as u16);
            put16(&mut central, extra.len() as u16);
            put16(&mut central, member.comment.len() as u16);
            put16(&mut central, 0);
            put16(&mut central, 0);
            put32(&mut central, 0);
            put32(&mut central, local_offset as u32);
            central.extend_from_slice(&member.name);
            central.extend_from_slice(&extra);
            central.extend_from_slice(&member.comment);
        }

        let cd_offset = out.len();
        out.extend_from_slice(&central);
        let central_offsets = central_offsets.iter().map(|o| o + cd_offset).collect();

        let eocd_offset = out.len();
        put32(&mut out, 0x0605_4b50);
        put16(&mut out, 0);
        put16(&mut out, 0);
        put16(&mut out, self.entries.len() as u16);
        put16(&mut out, self.entries.len() as u16);
        put32(&mut out, central.len() as u32);
        put32(&mut out, cd_offset as u32);
        put16(&mut out, self.comment.len() as u16);
        out.extend_from_slice(&self.comment);

        Built {
            bytes: out,
            local_offsets,
            data_offsets,
            central_offsets,
            cd_offset,
            eocd_offset,
        }
    }
}

impl Built {
    pub fn patch16(&mut self, at: usize, v: u16) {
        self.bytes[at..at + 2].copy_from_slice(&v.to_le_bytes());
    }

    pub fn patch32(&mut self, at: usize, v: u32) {
        self.bytes[at..at + 4].copy_from_slice(&v.to_le_bytes());
    }
}

/// Info-ZIP Unicode path extra field (0x7075) renaming `raw_name` to `name`.
pub fn unicode_path_extra(raw_name: &[u8], name: &str) -> Vec<u8> {
    let mut extra = Vec::new();
    put16(&mut extra, 0x7075);
    put16(&mut extra, (5 + name.len()) as u16);
    extra.push(1);
    put32(&mut extra, crc32fast::hash(raw_name));
    extra.extend_from_slice(name.as_bytes());
    extra
}
