//! Page-marks cache files on disk
//!
//! One file per book and viewport size:
//! `<root>/<book id>/.<width>x<height>.marks`. Everything else that
//! affects layout lives in the file header and is validated on load.
//!
//! All calls are blocking and meant to run on a paging worker.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::codec::{self, MarksRecord};
use super::types::{ContentHash, LayoutConfig, PageMarks};

pub const MARKS_FILE_SUFFIX: &str = ".marks";

/// Location of page-marks cache files
#[derive(Debug, Clone)]
pub struct MarksStore {
    root: PathBuf,
}

impl MarksStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Cache file for a book at a given viewport size
    pub fn path_for(&self, book_id: &str, config: &LayoutConfig) -> PathBuf {
        self.root.join(sanitize_id(book_id)).join(format!(
            ".{}x{}{}",
            config.width, config.height, MARKS_FILE_SUFFIX
        ))
    }

    /// Load cached marks, deleting the file if it fails validation
    ///
    /// A missing file is a plain miss. Any file that cannot be read or
    /// decoded is removed so it does not get parsed again next time.
    pub fn load(
        &self,
        path: &Path,
        config: &LayoutConfig,
        expected_hash: Option<&ContentHash>,
    ) -> Option<PageMarks> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %path.display(), "Failed to read page marks: {}", e);
                discard(path);
                return None;
            }
        };

        tracing::debug!(path = %path.display(), bytes = bytes.len(), "Reading page marks");
        match codec::decode(&bytes, config, expected_hash) {
            Ok(marks) => Some(marks),
            Err(reason) => {
                tracing::warn!(path = %path.display(), "Rejected page marks: {}", reason);
                discard(path);
                None
            }
        }
    }

    /// Write marks to `path`, creating parent directories as needed
    pub fn save(
        &self,
        path: &Path,
        hash: &ContentHash,
        config: &LayoutConfig,
        marks: &PageMarks,
    ) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
                tracing::debug!(dir = %parent.display(), "Created page marks directory");
            }
        }

        let bytes = codec::encode(&MarksRecord {
            hash,
            config,
            marks,
        })
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} page marks do not fit a cache file", marks.len()),
            )
        })?;
        fs::write(path, bytes)?;
        tracing::debug!(path = %path.display(), pages = marks.len(), "Wrote page marks");
        Ok(())
    }
}

fn discard(path: &Path) {
    tracing::debug!(path = %path.display(), "Deleting page marks");
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), "Failed to delete page marks: {}", e);
        }
    }
}

/// Keep book ids from escaping the cache root
fn sanitize_id(id: &str) -> String {
    let cleaned: String = id
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '_',
            c => c,
        })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => format!("_{}", cleaned),
        _ => cleaned,
    }
}
