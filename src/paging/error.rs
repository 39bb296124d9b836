//! Paging error types
//!
//! Errors that can cross the session boundary, plus the reasons a
//! page-marks cache file gets rejected. Rejections never leave the
//! pagination task: they are logged and treated as a cache miss.

use thiserror::Error;

/// Errors surfaced by the paging subsystem
#[derive(Debug, Error)]
pub enum PagingError {
    /// Page index outside `[0, page_count)`
    #[error("Page index {index} out of range (page count {count})")]
    OutOfRange { index: usize, count: usize },

    /// Layout that cannot be paginated (zero-sized viewport, negative margins)
    #[error("Invalid layout: {0}")]
    InvalidLayout(String),

    /// IO error (std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Content hash could not be computed
    #[error("Hash error: {0}")]
    Hash(String),

    /// No tokio runtime to run paging workers on
    #[error("Runtime error: {0}")]
    Runtime(String),
}

/// Result type alias for paging operations
pub type PagingResult<T> = std::result::Result<T, PagingError>;

/// Why a cache file was not accepted
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheRejection {
    #[error("too short ({0} bytes)")]
    TooShort(usize),

    #[error("bad magic")]
    BadMagic,

    #[error("format version {found} (expected {expected})")]
    VersionMismatch { found: u32, expected: u32 },

    #[error("content hash mismatch")]
    HashMismatch,

    #[error("{field} mismatch")]
    ConfigMismatch { field: &'static str },

    #[error("empty record")]
    EmptyRecord,

    #[error("payload is {actual} bytes, header declares {declared}")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("broken order at mark {index}")]
    BrokenOrder { index: usize },
}
