//! Disk file header.
//!
//! The first page (page 0) of every file on disk identifies the format and
//! records how many pages the file holds.

use crate::error::{Result, StorageError};
use crate::types::{PageId, PAGE_SIZE};

/// Magic bytes to identify a valid storage file
pub const MAGIC: &[u8; 16] = b"HeapStorageV01\0\0";

/// File header size (uses first page)
pub const FILE_HEADER_SIZE: usize = PAGE_SIZE;

/// Number of header bytes covered by the checksum
const CHECKSUMMED_LEN: usize = 24;

/// Disk file header
///
/// Layout:
/// ```text
/// Offset  Size  Description
/// 0       16    Magic string "HeapStorageV01\0\0"
/// 16      4     Page size (currently always 4096)
/// 20      4     Total page count
/// 24      4     Checksum of header (CRC32)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    /// Page size in bytes
    pub page_size: u32,
    /// Total number of pages in the file (including header page)
    pub page_count: u32,
}

impl FileHeader {
    /// Create a new file header for an empty file
    pub fn new() -> Self {
        Self {
            page_size: PAGE_SIZE as u32,
            page_count: 1, // Just the header page initially
        }
    }

    /// Read a file header from bytes
    pub fn read(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < CHECKSUMMED_LEN + 4 {
            return Err(StorageError::invalid_db("header too short"));
        }

        if &bytes[0..16] != MAGIC {
            return Err(StorageError::invalid_db("invalid magic bytes"));
        }

        let page_size = u32::from_be_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]);
        let page_count = u32::from_be_bytes([bytes[20], bytes[21], bytes[22], bytes[23]]);

        let stored_checksum = u32::from_be_bytes([bytes[24], bytes[25], bytes[26], bytes[27]]);
        let computed_checksum = crc32fast::hash(&bytes[0..CHECKSUMMED_LEN]);
        if stored_checksum != computed_checksum {
            return Err(StorageError::corruption("file header checksum mismatch"));
        }

        if page_size != PAGE_SIZE as u32 {
            return Err(StorageError::invalid_db(format!(
                "unsupported page size: {} (expected {})",
                page_size, PAGE_SIZE
            )));
        }
        if page_count == 0 {
            return Err(StorageError::invalid_db("page count must include the header page"));
        }

        Ok(Self {
            page_size,
            page_count,
        })
    }

    /// Write this header to bytes
    pub fn write(&self, bytes: &mut [u8]) {
        bytes[..FILE_HEADER_SIZE].fill(0);

        bytes[0..16].copy_from_slice(MAGIC);
        bytes[16..20].copy_from_slice(&self.page_size.to_be_bytes());
        bytes[20..24].copy_from_slice(&self.page_count.to_be_bytes());

        let checksum = crc32fast::hash(&bytes[0..CHECKSUMMED_LEN]);
        bytes[24..28].copy_from_slice(&checksum.to_be_bytes());
    }

    /// Allocate a new page ID
    pub fn allocate_page(&mut self) -> PageId {
        let page_id = PageId::new(self.page_count);
        self.page_count += 1;
        page_id
    }
}

impl Default for FileHeader {
    fn default() -> Self {
        Self::new()
    }
}
