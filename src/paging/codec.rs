//! Page-marks cache file codec
//!
//! # Layout
//!
//! ```text
//! offset  size  field
//!      0     4  magic "MARK"
//!      4     4  format version (u32)
//!      8    16  content hash
//!     24     4  font size (i32)
//!     28    16  left, right, top, bottom margins (i32 each)
//!     44     4  mark count (u32)
//!     48  12*n  marks: paragraph, element, char index (u32 each)
//! ```
//!
//! All integers are little-endian. The viewport size is not stored here,
//! it is part of the file name (see `store`).

use super::error::CacheRejection;
use super::types::{hash_accepts, ContentHash, LayoutConfig, PageMarks, Position, HASH_LEN};

pub const MARKS_MAGIC: [u8; 4] = *b"MARK";
pub const MARKS_FORMAT_VERSION: u32 = 3;
pub const HEADER_LEN: usize = 48;
pub const MARK_LEN: usize = 12;

/// Borrowed view of everything that goes into a cache file
#[derive(Debug, Clone, Copy)]
pub struct MarksRecord<'a> {
    pub hash: &'a ContentHash,
    pub config: &'a LayoutConfig,
    pub marks: &'a PageMarks,
}

/// Encode a record into the on-disk representation
///
/// `None` if the mark count does not fit the header's `u32`.
pub fn encode(record: &MarksRecord<'_>) -> Option<Vec<u8>> {
    let marks = record.marks.as_slice();
    let count = mark_count(marks.len())?;
    let mut out = Vec::with_capacity(HEADER_LEN + marks.len() * MARK_LEN);

    out.extend_from_slice(&MARKS_MAGIC);
    out.extend_from_slice(&MARKS_FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(record.hash.as_bytes());
    out.extend_from_slice(&record.config.font_size.to_le_bytes());
    let m = &record.config.margins;
    for margin in [m.left, m.right, m.top, m.bottom] {
        out.extend_from_slice(&margin.to_le_bytes());
    }
    out.extend_from_slice(&count.to_le_bytes());

    for mark in marks {
        out.extend_from_slice(&mark.paragraph.to_le_bytes());
        out.extend_from_slice(&mark.element.to_le_bytes());
        out.extend_from_slice(&mark.char_index.to_le_bytes());
    }
    Some(out)
}

fn mark_count(len: usize) -> Option<u32> {
    u32::try_from(len).ok()
}

/// Decode and validate a cache file
///
/// Checks, in order: magic, version, hash (unless `expected_hash` is
/// unknown), font size and margins, non-zero count, payload length,
/// strict ordering. Nothing is returned unless every check passes.
pub fn decode(
    bytes: &[u8],
    expected: &LayoutConfig,
    expected_hash: Option<&ContentHash>,
) -> Result<PageMarks, CacheRejection> {
    if bytes.len() <= HEADER_LEN {
        return Err(CacheRejection::TooShort(bytes.len()));
    }
    let mut header = Reader::new(&bytes[..HEADER_LEN]);

    if header.take::<4>() != MARKS_MAGIC {
        return Err(CacheRejection::BadMagic);
    }

    let version = header.u32();
    if version != MARKS_FORMAT_VERSION {
        return Err(CacheRejection::VersionMismatch {
            found: version,
            expected: MARKS_FORMAT_VERSION,
        });
    }

    let stored_hash = ContentHash::from_bytes(header.take::<HASH_LEN>());
    if !hash_accepts(expected_hash, &stored_hash) {
        return Err(CacheRejection::HashMismatch);
    }

    let m = &expected.margins;
    let fields = [
        ("font size", expected.font_size),
        ("left margin", m.left),
        ("right margin", m.right),
        ("top margin", m.top),
        ("bottom margin", m.bottom),
    ];
    for (field, want) in fields {
        if header.i32() != want {
            return Err(CacheRejection::ConfigMismatch { field });
        }
    }

    let count = header.u32() as usize;
    if count == 0 {
        return Err(CacheRejection::EmptyRecord);
    }

    let payload = &bytes[HEADER_LEN..];
    let declared = count.saturating_mul(MARK_LEN);
    if declared != payload.len() {
        return Err(CacheRejection::LengthMismatch {
            declared,
            actual: payload.len(),
        });
    }

    let mut marks = PageMarks::new();
    let mut body = Reader::new(payload);
    for index in 0..count {
        let mark = Position::new(body.u32(), body.u32(), body.u32());
        if !marks.push(mark) {
            return Err(CacheRejection::BrokenOrder { index });
        }
    }
    Ok(marks)
}

/// Cursor over a slice whose length has already been checked
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf[self.pos..self.pos + N]);
        self.pos += N;
        out
    }

    fn u32(&mut self) -> u32 {
        u32::from_le_bytes(self.take())
    }

    fn i32(&mut self) -> i32 {
        i32::from_le_bytes(self.take())
    }
}
