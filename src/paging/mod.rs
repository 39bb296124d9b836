//! Background pagination with a persistent page-marks cache
//!
//! Splitting a reflowable book into pages is slow, so it runs on a bounded
//! worker pool and every result is written to disk, keyed by the book's
//! content hash and the layout that produced it.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                   PagingSession                         │
//! │  (current + backup LayoutSlots, model events)           │
//! └─────────────────────────────────────────────────────────┘
//!        │ submit                          ▲ TaskMessage
//!        ▼                                 │ (progress, done)
//! ┌──────────────┐    ┌────────────────────┴───────────────┐
//! │  TaskQueue   │───▶│            PagingTask               │
//! │ (semaphore)  │    │  hash ─▶ cache lookup ─▶ measure    │
//! └──────────────┘    └────────────────────────────────────┘
//!                              │                  │
//!                              ▼                  ▼
//!                     ┌──────────────┐   ┌──────────────────┐
//!                     │  MarksStore  │   │   BookSource /   │
//!                     │  (codec)     │   │ MeasurementEngine│
//!                     └──────────────┘   └──────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use amnesia_paginator::paging::{LayoutConfig, Margins, MarksStore, PagingSession, TaskQueue};
//!
//! let mut session = PagingSession::new(TaskQueue::current(2)?, MarksStore::new(cache_dir));
//! session.set_book(Some(book), None);
//! session.set_layout_config(LayoutConfig::new(800, 600, 20, Margins::uniform(10)));
//! session.wait_until_loaded().await;
//!
//! let second_page = session.position_at(1)?;
//! ```

mod codec;
mod error;
mod hash;
mod model;
mod queue;
mod session;
mod slots;
mod store;
mod task;
mod traits;
mod types;

#[cfg(test)]
mod testing;

pub use codec::{decode, encode, MarksRecord, HEADER_LEN, MARKS_FORMAT_VERSION, MARKS_MAGIC, MARK_LEN};
pub use error::{CacheRejection, PagingError, PagingResult};
pub use hash::{compute_hash, hash_file, hash_reader};
pub use model::{count_change_events, ModelEvent, ResetReason, Subscribers};
pub use queue::{TaskQueue, DEFAULT_MAX_WORKERS};
pub use session::{PagingSession, TaskInfo};
pub use slots::{LayoutSlot, LayoutSlots, SlotDecision};
pub use store::{MarksStore, MARKS_FILE_SUFFIX};
pub use task::{CancelFlag, PagingOutput, PagingTask, TaskId, TaskMessage, TaskState};
pub use traits::{BookSource, MeasurementEngine};
pub use types::{hash_accepts, ContentHash, LayoutConfig, Margins, PageMarks, Position, HASH_LEN};
