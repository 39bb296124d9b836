//! Current and backup layouts
//!
//! At most two completed paginations are kept: the one matching the active
//! layout and the one it displaced. Rotating between two viewport sizes
//! then costs a swap instead of a re-layout.

use std::mem;
use std::sync::Arc;

use super::task::PagingOutput;
use super::traits::BookSource;
use super::types::{ContentHash, LayoutConfig, PageMarks};

/// One completed pagination
pub struct LayoutSlot {
    pub config: LayoutConfig,
    pub hash: Option<ContentHash>,
    pub marks: PageMarks,
    /// Book the marks were computed from
    pub book: Arc<dyn BookSource>,
    /// Loaded from the cache file rather than measured
    pub from_cache: bool,
}

impl LayoutSlot {
    /// Whether this slot can stand in for `config` given what we know
    /// about the book's hash
    pub fn satisfies(&self, config: &LayoutConfig, known_hash: Option<&ContentHash>) -> bool {
        self.config == *config && known_hash.map_or(true, |known| self.hash.as_ref() == Some(known))
    }

    /// True if the slot was computed for content other than `hash`
    pub fn is_stale(&self, hash: &ContentHash) -> bool {
        self.hash.as_ref() != Some(hash)
    }
}

impl From<PagingOutput> for LayoutSlot {
    fn from(output: PagingOutput) -> Self {
        Self {
            config: output.config,
            hash: output.hash,
            marks: output.marks,
            book: output.book,
            from_cache: output.from_cache,
        }
    }
}

impl std::fmt::Debug for LayoutSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayoutSlot")
            .field("config", &self.config)
            .field("hash", &self.hash)
            .field("pages", &self.marks.len())
            .field("book", &self.book.id())
            .field("from_cache", &self.from_cache)
            .finish()
    }
}

/// What a layout request needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotDecision {
    /// Current slot already matches
    Keep,
    /// Backup matched and is now current
    Swapped,
    /// Nothing matches; a new pagination is needed
    Recompute,
}

#[derive(Debug, Default)]
pub struct LayoutSlots {
    current: Option<LayoutSlot>,
    backup: Option<LayoutSlot>,
}

impl LayoutSlots {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&LayoutSlot> {
        self.current.as_ref()
    }

    pub fn backup(&self) -> Option<&LayoutSlot> {
        self.backup.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_none() && self.backup.is_none()
    }

    /// Reuse the current slot, swap in the backup, or ask for a re-layout
    pub fn resolve(&mut self, config: &LayoutConfig, known_hash: Option<&ContentHash>) -> SlotDecision {
        if self.current.as_ref().is_some_and(|s| s.satisfies(config, known_hash)) {
            SlotDecision::Keep
        } else if self.backup.as_ref().is_some_and(|s| s.satisfies(config, known_hash)) {
            mem::swap(&mut self.current, &mut self.backup);
            SlotDecision::Swapped
        } else {
            SlotDecision::Recompute
        }
    }

    /// Drop the backup and move current into its place
    pub fn retire_current(&mut self) {
        self.backup = self.current.take();
    }

    pub fn discard_current(&mut self) -> Option<LayoutSlot> {
        self.current.take()
    }

    pub fn clear(&mut self) {
        self.current = None;
        self.backup = None;
    }

    /// Make a finished pagination current, returning what it replaced
    pub fn install(&mut self, slot: LayoutSlot) -> Option<LayoutSlot> {
        self.current.replace(slot)
    }

    /// Drop the backup if it was computed for other content
    pub fn drop_stale_backup(&mut self, hash: &ContentHash) -> bool {
        if self.backup.as_ref().is_some_and(|s| s.is_stale(hash)) {
            self.backup = None;
            true
        } else {
            false
        }
    }

    pub fn current_is_stale(&self, hash: &ContentHash) -> bool {
        self.current.as_ref().is_some_and(|s| s.is_stale(hash))
    }
}
