//! Document traits
//!
//! The paging core never lays out text itself. A book hands out a
//! measurement engine per layout and knows how to digest its own bytes.

use super::error::PagingResult;
use super::types::{ContentHash, LayoutConfig, Position};

/// Page-by-page layout of one book under one `LayoutConfig`
///
/// Must be deterministic for a fixed layout and book content, and every
/// position returned by `next_page` must be greater than the previous one.
pub trait MeasurementEngine {
    /// Position the engine at the first page and return its start
    fn rewind(&mut self) -> Position;

    /// Advance to the next page boundary, `None` once the book is exhausted
    fn next_page(&mut self) -> Option<Position>;
}

/// A book that can be paginated
///
/// Shared between the session and any in-flight paging task, so
/// implementations are used through `Arc<dyn BookSource>`.
pub trait BookSource: Send + Sync {
    /// Stable identity, used to derive cache file locations
    fn id(&self) -> &str;

    /// Number of paragraphs in the text model; zero means nothing to lay out
    fn paragraph_count(&self) -> usize;

    /// Digest of the book's bytes (potentially slow)
    fn content_hash(&self) -> PagingResult<ContentHash>;

    /// Layout engine for one configuration
    fn measure(&self, config: &LayoutConfig) -> Box<dyn MeasurementEngine + '_>;
}
