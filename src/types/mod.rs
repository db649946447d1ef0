//! Common types used throughout the storage engine.

mod page_id;
mod record_id;

pub use page_id::{FileId, PageId};
pub use record_id::{RecordId, SlotId};

/// Page size in bytes (4KB)
pub const PAGE_SIZE: usize = 4096;

/// Default number of frames in the buffer pool
pub const DEFAULT_BUFFER_POOL_SIZE: usize = 1000;

/// Page types
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    /// Allocated but never initialized
    Free = 0x00,
    /// Heap file header page
    HeapHeader = 0x01,
    /// Heap data page (slotted records + next link)
    HeapData = 0x0D,
}

impl PageType {
    /// Convert from byte value
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x00 => Some(Self::Free),
            0x01 => Some(Self::HeapHeader),
            0x0D => Some(Self::HeapData),
            _ => None,
        }
    }
}
