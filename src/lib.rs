//! Amnesia Paginator Library
//!
//! Lays out reflowable books into pages in the background and keeps the
//! resulting page boundaries on disk so reopening a book is instant.
//!
//! # Modules
//!
//! - `paging`: Sessions, background tasks, layout slots and the marks cache
//! - `text`: Plain-text books with a fixed-advance measurement engine
//! - `config`: Environment-driven configuration

pub mod config;
pub mod paging;
pub mod text;

pub use config::Config;
