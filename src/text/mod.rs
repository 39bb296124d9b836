//! Plain-text books
//!
//! Paragraphs are separated by blank lines and their elements are words.
//! Layout uses the fixed-advance engine in [`layout`].

mod layout;

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::paging::{
    compute_hash, hash_file, BookSource, ContentHash, LayoutConfig, MeasurementEngine, PagingError,
    PagingResult,
};

pub use layout::{Metrics, TextLayout};

/// A plain-text document split into paragraphs of words
pub struct PlainTextBook {
    id: String,
    /// File the text came from, hashed directly when set
    path: Option<PathBuf>,
    text: String,
    /// Word lengths in chars, per paragraph
    paragraphs: Vec<Vec<usize>>,
    hash: Mutex<Option<ContentHash>>,
}

impl PlainTextBook {
    /// Book from an in-memory string
    pub fn from_text(id: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            id: id.into(),
            path: None,
            paragraphs: split_paragraphs(&text),
            text,
            hash: Mutex::new(None),
        }
    }

    /// Book read from a UTF-8 file, identified by its file name
    pub fn open(path: impl AsRef<Path>) -> PagingResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let id = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        tracing::debug!(path = %path.display(), "Opened plain-text book");
        Ok(Self {
            path: Some(path.to_path_buf()),
            ..Self::from_text(id, text)
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Words per paragraph
    pub fn word_counts(&self) -> impl Iterator<Item = usize> + '_ {
        self.paragraphs.iter().map(Vec::len)
    }
}

impl BookSource for PlainTextBook {
    fn id(&self) -> &str {
        &self.id
    }

    fn paragraph_count(&self) -> usize {
        self.paragraphs.len()
    }

    fn content_hash(&self) -> PagingResult<ContentHash> {
        let mut memo = self.hash.lock();
        if let Some(hash) = *memo {
            return Ok(hash);
        }

        let hash = match &self.path {
            Some(path) => hash_file(path)
                .map_err(|e| PagingError::Hash(format!("{}: {}", path.display(), e)))?,
            None => compute_hash(self.text.as_bytes()),
        };
        *memo = Some(hash);
        Ok(hash)
    }

    fn measure(&self, config: &LayoutConfig) -> Box<dyn MeasurementEngine + '_> {
        Box::new(TextLayout::new(&self.paragraphs, config))
    }
}

fn split_paragraphs(text: &str) -> Vec<Vec<usize>> {
    let mut paragraphs = Vec::new();
    let mut current = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                paragraphs.push(std::mem::take(&mut current));
            }
            continue;
        }
        current.extend(line.split_whitespace().map(|word| word.chars().count()));
    }
    if !current.is_empty() {
        paragraphs.push(current);
    }
    paragraphs
}
