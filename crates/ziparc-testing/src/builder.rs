//! Hand-assembled ZIP archives
//!
//! `zip::ZipWriter` always patches sizes into the local header when it can
//! seek, so archives using data descriptors (as written by streaming
//! producers) are assembled here byte by byte.

use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::io::Write;

const SIG_LOCAL_FILE: u32 = 0x0403_4b50;
const SIG_CENTRAL_DIR: u32 = 0x0201_4b50;
const SIG_EOCD: u32 = 0x0605_4b50;
const SIG_DATA_DESCRIPTOR: u32 = 0x0807_4b50;

const FLAG_DATA_DESCRIPTOR: u16 = 0x0008;
const FLAG_UTF8: u16 = 0x0800;
/// 1980-01-01
const DOS_DATE: u16 = 0x0021;

/// Entry compression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Stored,
    Deflated,
}

impl Method {
    fn code(self) -> u16 {
        match self {
            Method::Stored => 0,
            Method::Deflated => 8,
        }
    }
}

#[derive(Debug, Clone)]
struct Item {
    name: String,
    data: Vec<u8>,
    method: Method,
    descriptor: bool,
    unsigned_descriptor: bool,
    corrupt_crc: bool,
}

/// Builder for raw ZIP bytes
#[derive(Debug, Clone)]
pub struct StreamedZipBuilder {
    items: Vec<Item>,
    central_directory: bool,
    spanning_marker: bool,
}

impl Default for StreamedZipBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamedZipBuilder {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            central_directory: true,
            spanning_marker: false,
        }
    }

    /// Entry with sizes and CRC in the local header
    pub fn file(mut self, name: &str, data: &[u8], method: Method) -> Self {
        self.items.push(Item {
            name: name.to_string(),
            data: data.to_vec(),
            method,
            descriptor: false,
            unsigned_descriptor: false,
            corrupt_crc: false,
        });
        self
    }

    /// Entry whose sizes and CRC follow the data in a signed descriptor
    pub fn streamed_file(mut self, name: &str, data: &[u8], method: Method) -> Self {
        self.items.push(Item {
            name: name.to_string(),
            data: data.to_vec(),
            method,
            descriptor: true,
            unsigned_descriptor: false,
            corrupt_crc: false,
        });
        self
    }

    /// Directory marker; a trailing `/` is added when missing
    pub fn dir(mut self, name: &str) -> Self {
        let name = if name.ends_with('/') {
            name.to_string()
        } else {
            format!("{}/", name)
        };
        self.items.push(Item {
            name,
            data: Vec::new(),
            method: Method::Stored,
            descriptor: false,
            unsigned_descriptor: false,
            corrupt_crc: false,
        });
        self
    }

    /// Record a wrong CRC for the most recently added entry
    pub fn with_bad_crc(mut self) -> Self {
        if let Some(item) = self.items.last_mut() {
            item.corrupt_crc = true;
        }
        self
    }

    /// Write the most recently added entry's descriptor without `PK 07 08`
    pub fn with_unsigned_descriptor(mut self) -> Self {
        if let Some(item) = self.items.last_mut() {
            item.descriptor = true;
            item.unsigned_descriptor = true;
        }
        self
    }

    /// Prefix the archive with a split-archive marker
    pub fn with_spanning_marker(mut self) -> Self {
        self.spanning_marker = true;
        self
    }

    /// Stop after the last entry, as a truncated download would
    pub fn without_central_directory(mut self) -> Self {
        self.central_directory = false;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        if self.spanning_marker {
            put_u32(&mut out, SIG_DATA_DESCRIPTOR);
        }

        let mut central = Vec::new();
        for item in &self.items {
            let offset = out.len() as u32;
            let payload = match item.method {
                Method::Stored => item.data.clone(),
                Method::Deflated => deflate(&item.data),
            };
            let mut crc = crc32fast::hash(&item.data);
            if item.corrupt_crc {
                crc ^= 0xdead_beef;
            }
            let flags = FLAG_UTF8 | if item.descriptor { FLAG_DATA_DESCRIPTOR } else { 0 };
            let name = item.name.as_bytes();

            put_u32(&mut out, SIG_LOCAL_FILE);
            put_u16(&mut out, 20);
            put_u16(&mut out, flags);
            put_u16(&mut out, item.method.code());
            put_u16(&mut out, 0);
            put_u16(&mut out, DOS_DATE);
            if item.descriptor {
                put_u32(&mut out, 0);
                put_u32(&mut out, 0);
                put_u32(&mut out, 0);
            } else {
                put_u32(&mut out, crc);
                put_u32(&mut out, payload.len() as u32);
                put_u32(&mut out, item.data.len() as u32);
            }
            put_u16(&mut out, name.len() as u16);
            put_u16(&mut out, 0);
            out.extend_from_slice(name);
            out.extend_from_slice(&payload);

            if item.descriptor {
                if !item.unsigned_descriptor {
                    put_u32(&mut out, SIG_DATA_DESCRIPTOR);
                }
                put_u32(&mut out, crc);
                put_u32(&mut out, payload.len() as u32);
                put_u32(&mut out, item.data.len() as u32);
            }

            put_u32(&mut central, SIG_CENTRAL_DIR);
            put_u16(&mut central, 20);
            put_u16(&mut central, 20);
            put_u16(&mut central, flags);
            put_u16(&mut central, item.method.code());
            put_u16(&mut central, 0);
            put_u16(&mut central, DOS_DATE);
            put_u32(&mut central, crc);
            put_u32(&mut central, payload.len() as u32);
            put_u32(&mut central, item.data.len() as u32);
            put_u16(&mut central, name.len() as u16);
            put_u16(&mut central, 0);
            put_u16(&mut central, 0);
            put_u16(&mut central, 0);
            put_u16(&mut central, 0);
            put_u32(&mut central, if item.name.ends_with('/') { 0x10 } else { 0 });
            put_u32(&mut central, offset);
            central.extend_from_slice(name);
        }

        if self.central_directory {
            let cd_offset = out.len() as u32;
            out.extend_from_slice(&central);
            put_u32(&mut out, SIG_EOCD);
            put_u16(&mut out, 0);
            put_u16(&mut out, 0);
            put_u16(&mut out, self.items.len() as u16);
            put_u16(&mut out, self.items.len() as u16);
            put_u32(&mut out, central.len() as u32);
            put_u32(&mut out, cd_offset);
            put_u16(&mut out, 0);
        }
        out
    }
}

fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .expect("writing to a Vec cannot fail");
    encoder.finish().expect("writing to a Vec cannot fail")
}

fn put_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}
