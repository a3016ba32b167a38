//! Forward-only ZIP reader driven by local file headers.
//!
//! Unlike [`zip::ZipArchive`], this reader never seeks and never looks at the
//! central directory, so it works on any [`Read`] source (pipes, bundled
//! assets, network bodies). Entries are yielded in stream order.
//!
//! Entries whose sizes are deferred to a trailing data descriptor
//! (general-purpose flag bit 3) are supported:
//! - deflated entries end where the deflate stream ends;
//! - stored entries end at the first descriptor whose CRC-32 and size fields
//!   agree with the bytes read so far. A signed descriptor starts with
//!   `PK 07 08`; an unsigned one is recognised by the header signature that
//!   must follow it (next local header or central directory).
//!
//! Names without the UTF-8 flag are decoded as CP437.
//!
//! Every entry's CRC-32 and sizes are checked against the local header or the
//! data descriptor before the next entry is returned.

use super::{cp437, ArchiveEntry};
use crate::{Error, Result};
use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use flate2::{Decompress, FlushDecompress, Status};
use serde::Serialize;
use std::io::{self, BufRead, Cursor, Read};
use tracing::{debug, trace};

/// Local file header: PK 03 04
pub const SIG_LOCAL_FILE: u32 = 0x0403_4b50;
/// Central directory file header: PK 01 02
pub const SIG_CENTRAL_DIR: u32 = 0x0201_4b50;
/// End of central directory: PK 05 06
pub const SIG_EOCD: u32 = 0x0605_4b50;
/// ZIP64 end of central directory: PK 06 06
pub const SIG_ZIP64_EOCD: u32 = 0x0606_4b50;
/// Data descriptor (also the split-archive marker): PK 07 08
pub const SIG_DATA_DESCRIPTOR: u32 = 0x0807_4b50;
/// Single-segment spanning marker written by some tools: PK 0 0
const SIG_SPANNING_SINGLE: u32 = 0x3030_4b50;

/// Local file header length without name and extra field
const LOCAL_HEADER_LEN: usize = 26;
const DESCRIPTOR_LEN: usize = 16;
const DESCRIPTOR_LEN_ZIP64: usize = 24;
const ZIP64_EXTRA_ID: u16 = 0x0001;

const FLAG_ENCRYPTED: u16 = 0x0001;
const FLAG_DATA_DESCRIPTOR: u16 = 0x0008;
const FLAG_UTF8: u16 = 0x0800;

/// Default lookahead buffer size
pub const DEFAULT_BUFFER_SIZE: usize = 8 * 1024;
/// Smallest buffer able to hold a ZIP64 data descriptor with slack
const MIN_BUFFER_SIZE: usize = 64;

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionMethod {
    Stored,
    Deflated,
    Other(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflated,
            _ => CompressionMethod::Other(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflated => 8,
            CompressionMethod::Other(v) => *v,
        }
    }
}

/// Buffered reader that can guarantee a minimum amount of lookahead.
///
/// `std::io::BufReader` only refills once drained, which is not enough to
/// inspect a data descriptor straddling two reads.
pub struct Lookahead<R> {
    inner: R,
    buf: Box<[u8]>,
    pos: usize,
    end: usize,
    bytes_read: u64,
}

impl<R: Read> Lookahead<R> {
    pub fn new(inner: R) -> Self {
        Self::with_capacity(DEFAULT_BUFFER_SIZE, inner)
    }

    pub fn with_capacity(capacity: usize, inner: R) -> Self {
        Self {
            inner,
            buf: vec![0u8; capacity.max(MIN_BUFFER_SIZE)].into_boxed_slice(),
            pos: 0,
            end: 0,
            bytes_read: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Total bytes pulled from the underlying reader
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Buffer at least `want` bytes (capped at capacity) unless the source
    /// ends first, and return everything buffered.
    pub fn fill(&mut self, want: usize) -> io::Result<&[u8]> {
        let want = want.min(self.buf.len());
        if self.end - self.pos < want {
            if self.pos > 0 {
                self.buf.copy_within(self.pos..self.end, 0);
                self.end -= self.pos;
                self.pos = 0;
            }
            while self.end < want {
                match self.inner.read(&mut self.buf[self.end..]) {
                    Ok(0) => break,
                    Ok(n) => {
                        self.end += n;
                        self.bytes_read += n as u64;
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e),
                }
            }
        }
        Ok(&self.buf[self.pos..self.end])
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for Lookahead<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if self.pos == self.end && out.len() >= self.buf.len() {
            let n = self.inner.read(out)?;
            self.bytes_read += n as u64;
            return Ok(n);
        }
        let available = self.fill(1)?;
        let n = available.len().min(out.len());
        out[..n].copy_from_slice(&available[..n]);
        self.pos += n;
        Ok(n)
    }
}

impl<R: Read> BufRead for Lookahead<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.fill(1)
    }

    fn consume(&mut self, amt: usize) {
        self.pos = (self.pos + amt).min(self.end);
    }
}

/// How the end of an entry's data is found
enum Body {
    /// Size known from the local header
    Stored { remaining: u64 },
    /// Size deferred to a signed data descriptor
    StoredUntilDescriptor,
    Deflated { inflater: Decompress },
}

/// Layout of a data descriptor found after stored data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DescriptorForm {
    /// Preceded by `PK 07 08`
    Signed,
    /// Bare CRC and sizes
    Unsigned,
}

/// Decoding state of the entry currently open
struct EntryState {
    entry: ArchiveEntry,
    flags: u16,
    zip64: bool,
    body: Body,
    descriptor_form: Option<DescriptorForm>,
    hasher: crc32fast::Hasher,
    compressed_read: u64,
    uncompressed_written: u64,
    data_done: bool,
    verified: bool,
}

impl EntryState {
    fn has_descriptor(&self) -> bool {
        self.flags & FLAG_DATA_DESCRIPTOR != 0
    }

    fn descriptor_len(&self) -> usize {
        if self.zip64 {
            DESCRIPTOR_LEN_ZIP64
        } else {
            DESCRIPTOR_LEN
        }
    }

    fn read_data<R: Read>(&mut self, input: &mut Lookahead<R>, out: &mut [u8]) -> Result<usize> {
        if self.data_done || out.is_empty() {
            return Ok(0);
        }

        let n = match &mut self.body {
            Body::Stored { remaining } => {
                let available = input.fill(1)?;
                if available.is_empty() {
                    return Err(truncated(&self.entry.name));
                }
                let n = available
                    .len()
                    .min(out.len())
                    .min(usize::try_from(*remaining).unwrap_or(usize::MAX));
                out[..n].copy_from_slice(&available[..n]);
                input.consume(n);
                *remaining -= n as u64;
                if *remaining == 0 {
                    self.data_done = true;
                }
                self.compressed_read += n as u64;
                n
            }
            Body::StoredUntilDescriptor => {
                let desc_len = self.descriptor_len();
                let capacity = input.capacity();
                let available = input.fill(capacity)?;
                let (n, form) = scan_stored(
                    available,
                    desc_len,
                    self.compressed_read,
                    &self.hasher,
                    out.len(),
                );
                if n == 0 && form.is_none() {
                    return Err(truncated(&self.entry.name));
                }
                out[..n].copy_from_slice(&available[..n]);
                input.consume(n);
                if form.is_some() {
                    self.descriptor_form = form;
                    self.data_done = true;
                }
                self.compressed_read += n as u64;
                n
            }
            Body::Deflated { inflater } => loop {
                let available = input.fill(1)?;
                if available.is_empty() {
                    return Err(truncated(&self.entry.name));
                }
                let in_before = inflater.total_in();
                let out_before = inflater.total_out();
                let status = inflater
                    .decompress(available, out, FlushDecompress::None)
                    .map_err(|e| {
                        Error::MalformedArchive(format!(
                            "invalid deflate data in {}: {}",
                            self.entry.name, e
                        ))
                    })?;
                let consumed = (inflater.total_in() - in_before) as usize;
                let produced = (inflater.total_out() - out_before) as usize;
                input.consume(consumed);
                self.compressed_read += consumed as u64;

                if status == Status::StreamEnd {
                    self.data_done = true;
                    break produced;
                }
                if produced > 0 {
                    break produced;
                }
                if consumed == 0 {
                    return Err(Error::MalformedArchive(format!(
                        "deflate stream of {} stalled",
                        self.entry.name
                    )));
                }
            },
        };

        self.hasher.update(&out[..n]);
        self.uncompressed_written += n as u64;
        Ok(n)
    }

    /// Drain remaining data, read the descriptor if any, and verify
    fn finish<R: Read>(&mut self, input: &mut Lookahead<R>) -> Result<()> {
        if self.verified {
            return Ok(());
        }
        let mut scratch = [0u8; 4096];
        while !self.data_done {
            self.read_data(input, &mut scratch)?;
        }

        let actual_crc = self.hasher.clone().finalize();
        let (crc, compressed, uncompressed) = if self.has_descriptor() {
            self.read_descriptor(input)?
        } else {
            (
                self.entry.crc32.unwrap_or_default(),
                self.entry.compressed_size.unwrap_or_default(),
                self.entry.size.unwrap_or_default(),
            )
        };

        if crc != actual_crc {
            return Err(Error::MalformedArchive(format!(
                "CRC mismatch in {}: expected {:08x}, got {:08x}",
                self.entry.name, crc, actual_crc
            )));
        }
        if compressed != self.compressed_read || uncompressed != self.uncompressed_written {
            return Err(Error::MalformedArchive(format!(
                "size mismatch in {}: expected {}/{} bytes, got {}/{}",
                self.entry.name,
                compressed,
                uncompressed,
                self.compressed_read,
                self.uncompressed_written
            )));
        }

        self.entry.crc32 = Some(actual_crc);
        self.entry.compressed_size = Some(self.compressed_read);
        self.entry.size = Some(self.uncompressed_written);
        self.verified = true;
        trace!(name = %self.entry.name, size = self.uncompressed_written, "entry verified");
        Ok(())
    }

    fn read_descriptor<R: Read>(&self, input: &mut Lookahead<R>) -> Result<(u32, u64, u64)> {
        let desc_len = self.descriptor_len();
        let head = input.fill(desc_len)?;
        // The signature is optional; stored entries already know which form they end with.
        let skip = match self.descriptor_form {
            Some(DescriptorForm::Signed) => 4,
            Some(DescriptorForm::Unsigned) => 0,
            None if head.len() >= 4 && LittleEndian::read_u32(head) == SIG_DATA_DESCRIPTOR => 4,
            None => 0,
        };
        let body_len = desc_len - 4;
        if head.len() < skip + body_len {
            return Err(truncated(&self.entry.name));
        }

        let mut cursor = Cursor::new(&head[skip..skip + body_len]);
        let crc = cursor.read_u32::<LittleEndian>()?;
        let (compressed, uncompressed) = if self.zip64 {
            (
                cursor.read_u64::<LittleEndian>()?,
                cursor.read_u64::<LittleEndian>()?,
            )
        } else {
            (
                cursor.read_u32::<LittleEndian>()? as u64,
                cursor.read_u32::<LittleEndian>()? as u64,
            )
        };
        input.consume(skip + body_len);
        Ok((crc, compressed, uncompressed))
    }
}

/// Find how many bytes of a stored-with-descriptor body can be emitted.
///
/// Returns `(len, form)`: `len` bytes at the front of `window` are entry
/// data; `form` is set when a descriptor starts right after them. An
/// unsigned descriptor only counts when a header signature follows it.
fn scan_stored(
    window: &[u8],
    desc_len: usize,
    read_so_far: u64,
    hasher: &crc32fast::Hasher,
    limit: usize,
) -> (usize, Option<DescriptorForm>) {
    let zip64 = desc_len == DESCRIPTOR_LEN_ZIP64;
    let mut p = 0;
    while p + desc_len <= window.len() {
        let size = read_so_far + p as u64;
        let form = if LittleEndian::read_u32(&window[p..]) == SIG_DATA_DESCRIPTOR
            && descriptor_matches(&window[p + 4..], zip64, size, hasher, &window[..p])
        {
            Some(DescriptorForm::Signed)
        } else if is_header_signature(LittleEndian::read_u32(&window[p + desc_len - 4..]))
            && descriptor_matches(&window[p..], zip64, size, hasher, &window[..p])
        {
            Some(DescriptorForm::Unsigned)
        } else {
            None
        };
        if form.is_some() {
            return if p <= limit { (p, form) } else { (limit, None) };
        }
        p += 1;
    }
    // Positions past `p` could still start a descriptor we cannot see yet.
    (p.min(limit), None)
}

/// Whether `fields` (CRC, compressed size, size) describe `pending` stored
/// bytes of `size` total following the already hashed data.
fn descriptor_matches(
    fields: &[u8],
    zip64: bool,
    size: u64,
    hasher: &crc32fast::Hasher,
    pending: &[u8],
) -> bool {
    let crc = LittleEndian::read_u32(fields);
    let (compressed, uncompressed) = if zip64 {
        (
            LittleEndian::read_u64(&fields[4..]),
            LittleEndian::read_u64(&fields[12..]),
        )
    } else {
        (
            LittleEndian::read_u32(&fields[4..]) as u64,
            LittleEndian::read_u32(&fields[8..]) as u64,
        )
    };
    if compressed != size || uncompressed != size {
        return false;
    }
    let mut candidate = hasher.clone();
    candidate.update(pending);
    candidate.finalize() == crc
}

fn is_header_signature(signature: u32) -> bool {
    matches!(
        signature,
        SIG_LOCAL_FILE | SIG_CENTRAL_DIR | SIG_EOCD | SIG_ZIP64_EOCD
    )
}

fn truncated(name: &str) -> Error {
    Error::MalformedArchive(format!("unexpected end of stream in {}", name))
}

/// Forward-only iterator over the entries of a ZIP stream
pub struct ZipStreamReader<R> {
    input: Lookahead<R>,
    current: Option<EntryState>,
    started: bool,
    done: bool,
}

impl<R: Read> ZipStreamReader<R> {
    pub fn new(inner: R) -> Self {
        Self::with_capacity(DEFAULT_BUFFER_SIZE, inner)
    }

    pub fn with_capacity(capacity: usize, inner: R) -> Self {
        Self {
            input: Lookahead::with_capacity(capacity, inner),
            current: None,
            started: false,
            done: false,
        }
    }

    /// Total bytes pulled from the underlying reader
    pub fn bytes_read(&self) -> u64 {
        self.input.bytes_read()
    }

    pub fn into_inner(self) -> R {
        self.input.into_inner()
    }

    /// Advance to the next entry, finishing the previous one if needed.
    ///
    /// Returns `None` once the central directory (or a clean end of stream)
    /// is reached.
    pub fn next_entry(&mut self) -> Result<Option<ZipStreamEntry<'_, R>>> {
        if let Some(mut previous) = self.current.take() {
            previous.finish(&mut self.input)?;
        }
        if self.done {
            return Ok(None);
        }

        let signature = loop {
            let head = self.input.fill(4)?;
            if head.is_empty() {
                self.done = true;
                return Ok(None);
            }
            if head.len() < 4 {
                return Err(Error::MalformedArchive(
                    "unexpected end of stream in entry signature".to_string(),
                ));
            }
            let signature = LittleEndian::read_u32(head);
            if !self.started
                && (signature == SIG_DATA_DESCRIPTOR || signature == SIG_SPANNING_SINGLE)
            {
                debug!("skipping spanning marker");
                self.input.consume(4);
                self.started = true;
                continue;
            }
            break signature;
        };
        self.started = true;

        match signature {
            SIG_LOCAL_FILE => {
                self.input.consume(4);
            }
            SIG_CENTRAL_DIR | SIG_EOCD | SIG_ZIP64_EOCD => {
                debug!("reached central directory");
                self.done = true;
                return Ok(None);
            }
            other => {
                return Err(Error::MalformedArchive(format!(
                    "unexpected signature {:#010x}",
                    other
                )));
            }
        }

        let state = read_local_header(&mut self.input)?;
        debug!(
            name = %state.entry.name,
            method = ?state.entry.method,
            streamed = state.entry.streamed,
            "entry header"
        );
        let state = self.current.insert(state);
        Ok(Some(ZipStreamEntry {
            input: &mut self.input,
            state,
        }))
    }
}

fn read_local_header<R: Read>(input: &mut Lookahead<R>) -> Result<EntryState> {
    let mut fixed = [0u8; LOCAL_HEADER_LEN];
    input.read_exact(&mut fixed).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => {
            Error::MalformedArchive("truncated local file header".to_string())
        }
        _ => Error::Io(e),
    })?;

    let mut cursor = Cursor::new(&fixed[..]);
    let _version_needed = cursor.read_u16::<LittleEndian>()?;
    let flags = cursor.read_u16::<LittleEndian>()?;
    let method = CompressionMethod::from_u16(cursor.read_u16::<LittleEndian>()?);
    let _mod_time = cursor.read_u16::<LittleEndian>()?;
    let _mod_date = cursor.read_u16::<LittleEndian>()?;
    let crc32 = cursor.read_u32::<LittleEndian>()?;
    let mut compressed_size = cursor.read_u32::<LittleEndian>()? as u64;
    let mut size = cursor.read_u32::<LittleEndian>()? as u64;
    let name_len = cursor.read_u16::<LittleEndian>()? as usize;
    let extra_len = cursor.read_u16::<LittleEndian>()? as usize;

    let mut name_bytes = vec![0u8; name_len];
    let mut extra = vec![0u8; extra_len];
    input
        .read_exact(&mut name_bytes)
        .and_then(|_| input.read_exact(&mut extra))
        .map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => {
                Error::MalformedArchive("truncated local file header".to_string())
            }
            _ => Error::Io(e),
        })?;

    let name = if flags & FLAG_UTF8 != 0 {
        String::from_utf8(name_bytes)
            .map_err(|_| Error::MalformedArchive("entry name is not valid UTF-8".to_string()))?
    } else {
        cp437::decode(&name_bytes)
    };

    if flags & FLAG_ENCRYPTED != 0 {
        return Err(Error::Unsupported(format!("encrypted entry {}", name)));
    }

    let zip64 = match zip64_sizes(&extra, size, compressed_size) {
        Some((usize64, csize64)) => {
            size = usize64;
            compressed_size = csize64;
            true
        }
        None => false,
    };

    let streamed = flags & FLAG_DATA_DESCRIPTOR != 0;
    let body = match method {
        CompressionMethod::Stored if streamed => Body::StoredUntilDescriptor,
        CompressionMethod::Stored => Body::Stored {
            remaining: compressed_size,
        },
        CompressionMethod::Deflated => Body::Deflated {
            inflater: Decompress::new(false),
        },
        CompressionMethod::Other(code) => {
            return Err(Error::Unsupported(format!(
                "compression method {} in entry {}",
                code, name
            )));
        }
    };

    let data_done = matches!(body, Body::Stored { remaining: 0 });
    let entry = ArchiveEntry {
        is_dir: name.ends_with('/'),
        name,
        size: (!streamed).then_some(size),
        compressed_size: (!streamed).then_some(compressed_size),
        method,
        crc32: (!streamed).then_some(crc32),
        streamed,
    };

    Ok(EntryState {
        entry,
        flags,
        zip64,
        body,
        descriptor_form: None,
        hasher: crc32fast::Hasher::new(),
        compressed_read: 0,
        uncompressed_written: 0,
        data_done,
        verified: false,
    })
}

/// Sizes from a ZIP64 extended information extra field, if present
fn zip64_sizes(extra: &[u8], size: u64, compressed_size: u64) -> Option<(u64, u64)> {
    let mut rest = extra;
    while rest.len() >= 4 {
        let id = LittleEndian::read_u16(rest);
        let len = LittleEndian::read_u16(&rest[2..]) as usize;
        let data = rest.get(4..4 + len)?;
        if id == ZIP64_EXTRA_ID {
            let mut cursor = Cursor::new(data);
            let size = if data.len() >= 16 || size == u32::MAX as u64 {
                cursor.read_u64::<LittleEndian>().ok()?
            } else {
                size
            };
            let compressed_size = if data.len() >= 16 || compressed_size == u32::MAX as u64 {
                cursor.read_u64::<LittleEndian>().ok()?
            } else {
                compressed_size
            };
            return Some((size, compressed_size));
        }
        rest = &rest[4 + len..];
    }
    None
}

/// The entry currently open on a [`ZipStreamReader`]
pub struct ZipStreamEntry<'a, R> {
    input: &'a mut Lookahead<R>,
    state: &'a mut EntryState,
}

impl<'a, R: Read> ZipStreamEntry<'a, R> {
    /// Metadata from the local header; sizes are `None` for streamed entries
    /// until [`finish`](Self::finish) has run.
    pub fn entry(&self) -> &ArchiveEntry {
        &self.state.entry
    }

    pub fn name(&self) -> &str {
        &self.state.entry.name
    }

    pub fn is_dir(&self) -> bool {
        self.state.entry.is_dir
    }

    /// Total bytes pulled from the underlying reader so far
    pub fn stream_position(&self) -> u64 {
        self.input.bytes_read()
    }

    /// Read decompressed bytes; `Ok(0)` once the entry is exhausted
    pub fn read_data(&mut self, out: &mut [u8]) -> Result<usize> {
        self.state.read_data(self.input, out)
    }

    /// Consume the rest of the entry, verify it, and return the resolved
    /// metadata (sizes and CRC always set).
    pub fn finish(self) -> Result<ArchiveEntry> {
        self.state.finish(self.input)?;
        Ok(self.state.entry.clone())
    }
}

impl<'a, R: Read> Read for ZipStreamEntry<'a, R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        self.read_data(out).map_err(|e| match e {
            Error::Io(e) => e,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        })
    }
}
