//! Page and file identifier types.

use serde::Serialize;
use std::fmt;

/// Unique identifier for a page in a file.
///
/// Page IDs are 0-indexed. Page 0 is reserved for the disk-level file header;
/// heap pages start from page 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct PageId(pub u32);

impl PageId {
    /// Invalid page ID, stored on disk as the end of a page chain
    pub const INVALID: PageId = PageId(u32::MAX);

    /// Page ID for the file header (page 0)
    pub const HEADER: PageId = PageId(0);

    /// Create a new page ID
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw page ID value
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Check if this is a valid page ID
    pub const fn is_valid(self) -> bool {
        self.0 != u32::MAX
    }

    /// Calculate the byte offset of this page in the file
    pub const fn file_offset(self, page_size: usize) -> u64 {
        self.0 as u64 * page_size as u64
    }

    /// Decode an on-disk link, mapping the sentinel to `None`
    pub fn from_link(raw: u32) -> Option<Self> {
        let id = Self(raw);
        id.is_valid().then_some(id)
    }

    /// Encode an optional link for storage on disk
    pub fn to_link(link: Option<PageId>) -> u32 {
        link.unwrap_or(Self::INVALID).0
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "INVALID")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl From<u32> for PageId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl From<PageId> for u32 {
    fn from(id: PageId) -> Self {
        id.0
    }
}

/// Identifier of an open file within the buffer pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId(pub u32);

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file#{}", self.0)
    }
}
