//! Error types for the storage engine.

use thiserror::Error;
use crate::types::{PageId, RecordId};

/// Result type alias for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur in the storage engine
#[derive(Error, Debug)]
pub enum StorageError {
    /// I/O error from the underlying file system
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Named file does not exist
    #[error("File {0} not found")]
    FileNotFound(String),

    /// Named file already exists
    #[error("File {0} already exists")]
    FileExists(String),

    /// Named file is still open and cannot be destroyed
    #[error("File {0} is still open")]
    FileOpen(String),

    /// File name is empty, too long, or contains path separators
    #[error("Invalid file name: {0}")]
    InvalidFileName(String),

    /// Requested page was not found
    #[error("Page {0} not found")]
    PageNotFound(PageId),

    /// Unpin of a page that holds no pins
    #[error("Page {0} is not pinned")]
    PageNotPinned(PageId),

    /// Page does not have enough space for the operation
    #[error("Page {page_id} is full, need {needed} bytes but only {available} available")]
    PageFull {
        page_id: PageId,
        needed: usize,
        available: usize,
    },

    /// Record identifier does not address a live record
    #[error("No record at {0}")]
    SlotNotFound(RecordId),

    /// Scan has no current record
    #[error("Scan is not positioned on a record")]
    NoCurrentRecord,

    /// Invalid filter passed to a scan
    #[error("Bad scan parameter: {0}")]
    BadScanParameter(String),

    /// Record can never fit on a page
    #[error("Invalid record length: {size} bytes (max: {max})")]
    InvalidRecordLength { size: usize, max: usize },

    /// Data corruption detected (e.g., checksum mismatch)
    #[error("Corruption detected: {0}")]
    Corruption(String),

    /// Invalid page format or type
    #[error("Invalid page: {0}")]
    InvalidPage(String),

    /// Buffer pool has no available frames
    #[error("Buffer pool exhausted: no available frames")]
    BufferPoolExhausted,

    /// Invalid operation for the current state
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Database file is corrupted or has invalid format
    #[error("Invalid database file: {0}")]
    InvalidDatabaseFile(String),
}

impl StorageError {
    /// Create a corruption error with a message
    pub fn corruption(msg: impl Into<String>) -> Self {
        Self::Corruption(msg.into())
    }

    /// Create an invalid page error
    pub fn invalid_page(msg: impl Into<String>) -> Self {
        Self::InvalidPage(msg.into())
    }

    /// Create an invalid operation error
    pub fn invalid_operation(msg: impl Into<String>) -> Self {
        Self::InvalidOperation(msg.into())
    }

    /// Create an invalid database file error
    pub fn invalid_db(msg: impl Into<String>) -> Self {
        Self::InvalidDatabaseFile(msg.into())
    }

    /// Create a bad scan parameter error
    pub fn bad_scan(msg: impl Into<String>) -> Self {
        Self::BadScanParameter(msg.into())
    }

    /// Whether this is the page-level "no space" signal
    pub fn is_page_full(&self) -> bool {
        matches!(self, Self::PageFull { .. })
    }
}
