//! Core paging types
//!
//! Positions inside a book, the ordered list of page starts, the layout a
//! list was computed for, and the content digest binding it to a book.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::{PagingError, PagingResult};

/// Size of a content digest in bytes
pub const HASH_LEN: usize = 16;

/// Exact start of a page
///
/// Ordered lexicographically: paragraph, then element, then character.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    /// Paragraph index in the book text model
    pub paragraph: u32,
    /// Element index within the paragraph
    pub element: u32,
    /// Character index within the element
    pub char_index: u32,
}

impl Position {
    pub const fn new(paragraph: u32, element: u32, char_index: u32) -> Self {
        Self {
            paragraph,
            element,
            char_index,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.paragraph, self.element, self.char_index)
    }
}

/// Strictly increasing list of page starts for one layout
///
/// Index 0 is the first page. An empty list is a valid result for a book
/// with nothing to lay out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PageMarks(Vec<Position>);

impl PageMarks {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Build from a vector, rejecting anything that is not strictly increasing
    pub fn from_vec(marks: Vec<Position>) -> Option<Self> {
        if marks.windows(2).all(|w| w[0] < w[1]) {
            Some(Self(marks))
        } else {
            None
        }
    }

    /// Append a mark; refused unless it is greater than the last one
    pub fn push(&mut self, mark: Position) -> bool {
        match self.0.last() {
            Some(last) if *last >= mark => false,
            _ => {
                self.0.push(mark);
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Position> {
        self.0.get(index).copied()
    }

    pub fn as_slice(&self) -> &[Position] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Position> {
        self.0.iter()
    }

    /// Index of the page that contains `pos`
    ///
    /// Positions before the first mark belong to page 0. Returns `None`
    /// for an empty list.
    pub fn page_of(&self, pos: Position) -> Option<usize> {
        if self.0.is_empty() {
            return None;
        }
        match self.0.binary_search(&pos) {
            Ok(index) => Some(index),
            Err(0) => Some(0),
            Err(insert_at) => Some(insert_at - 1),
        }
    }
}

impl<'a> IntoIterator for &'a PageMarks {
    type Item = &'a Position;
    type IntoIter = std::slice::Iter<'a, Position>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Page margins in pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Margins {
    pub left: i32,
    pub right: i32,
    pub top: i32,
    pub bottom: i32,
}

impl Margins {
    pub const fn uniform(margin: i32) -> Self {
        Self {
            left: margin,
            right: margin,
            top: margin,
            bottom: margin,
        }
    }
}

/// Everything that decides where page breaks fall
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Viewport width in pixels
    pub width: u32,
    /// Viewport height in pixels
    pub height: u32,
    /// Font size in pixels
    pub font_size: i32,
    pub margins: Margins,
}

impl LayoutConfig {
    pub const fn new(width: u32, height: u32, font_size: i32, margins: Margins) -> Self {
        Self {
            width,
            height,
            font_size,
            margins,
        }
    }

    /// Same layout with a different viewport
    pub const fn with_size(self, width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..self
        }
    }

    /// Whether the viewport has an area worth paginating
    pub fn is_drawable(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    pub fn validate(&self) -> PagingResult<()> {
        if !self.is_drawable() {
            return Err(PagingError::InvalidLayout(format!(
                "viewport {} has no area",
                self
            )));
        }
        let m = &self.margins;
        if m.left < 0 || m.right < 0 || m.top < 0 || m.bottom < 0 {
            return Err(PagingError::InvalidLayout(format!(
                "negative margin {}/{}/{}/{}",
                m.left, m.right, m.top, m.bottom
            )));
        }
        if self.font_size <= 0 {
            return Err(PagingError::InvalidLayout(format!(
                "font size {}",
                self.font_size
            )));
        }
        Ok(())
    }
}

impl fmt::Display for LayoutConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Digest of a book's bytes
///
/// "Not known yet" is modelled as `Option<ContentHash>::None` wherever a
/// hash is expected; `None` accepts any stored hash during cache validation.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; HASH_LEN]);

impl ContentHash {
    pub const fn from_bytes(bytes: [u8; HASH_LEN]) -> Self {
        Self(bytes)
    }

    /// Digest from a slice, `None` unless it is exactly `HASH_LEN` bytes
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; HASH_LEN]>::try_from(bytes).ok().map(Self)
    }

    pub fn from_hex(hex_str: &str) -> Option<Self> {
        hex::decode(hex_str)
            .ok()
            .and_then(|bytes| Self::from_slice(&bytes))
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.to_hex())
    }
}

/// Whether a stored hash is acceptable for the expected one
///
/// An unknown expected hash accepts anything; the real hash is compared
/// again once it has been computed.
pub fn hash_accepts(expected: Option<&ContentHash>, stored: &ContentHash) -> bool {
    expected.map_or(true, |expected| expected == stored)
}
