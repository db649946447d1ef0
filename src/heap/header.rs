//! Heap file header page.
//!
//! The first page of a heap file names the file and tracks the page chain
//! and the number of live records.

use crate::error::{Result, StorageError};
use crate::storage::MAX_FILE_NAME_LEN;
use crate::types::{PageId, PageType, PAGE_SIZE};

/// Magic bytes identifying a heap header page
pub const HEAP_MAGIC: &[u8; 8] = b"HEAPFILE";

const NAME_LEN_OFFSET: usize = 12;
const NAME_OFFSET: usize = 13;
const COUNTS_OFFSET: usize = NAME_OFFSET + MAX_FILE_NAME_LEN;
const CHECKSUM_OFFSET: usize = COUNTS_OFFSET + 16;

/// Encoded size of the header, checksum included
pub const HEAP_HEADER_SIZE: usize = CHECKSUM_OFFSET + 4;

/// Heap file header
///
/// Layout (big-endian):
/// ```text
/// Offset  Size  Description
/// 0       1     Page type flag
/// 1       3     Reserved
/// 4       8     Magic "HEAPFILE"
/// 12      1     File name length
/// 13      64    File name, zero padded
/// 77      4     Data page count
/// 81      4     Live record count
/// 85      4     First data page
/// 89      4     Last data page
/// 93      4     Checksum of bytes 0..93 (CRC32)
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapFileHeader {
    pub file_name: String,
    pub page_count: u32,
    pub record_count: u32,
    pub first_page: PageId,
    pub last_page: PageId,
}

impl HeapFileHeader {
    /// Header of a new file holding one empty data page
    pub fn new(file_name: &str, first_page: PageId) -> Result<Self> {
        if file_name.is_empty() || file_name.len() > MAX_FILE_NAME_LEN {
            return Err(StorageError::InvalidFileName(file_name.to_string()));
        }

        Ok(Self {
            file_name: file_name.to_string(),
            page_count: 1,
            record_count: 0,
            first_page,
            last_page: first_page,
        })
    }

    /// Read a heap header from page bytes
    pub fn read(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEAP_HEADER_SIZE {
            return Err(StorageError::invalid_db("heap header too short"));
        }

        if PageType::from_byte(bytes[0]) != Some(PageType::HeapHeader) || &bytes[4..12] != HEAP_MAGIC
        {
            return Err(StorageError::invalid_db("not a heap file header page"));
        }

        let stored_checksum = read_u32(bytes, CHECKSUM_OFFSET);
        let computed_checksum = crc32fast::hash(&bytes[..CHECKSUM_OFFSET]);
        if stored_checksum != computed_checksum {
            return Err(StorageError::corruption("heap header checksum mismatch"));
        }

        let name_len = bytes[NAME_LEN_OFFSET] as usize;
        if name_len == 0 || name_len > MAX_FILE_NAME_LEN {
            return Err(StorageError::corruption(format!(
                "heap header file name length {}",
                name_len
            )));
        }
        let file_name = std::str::from_utf8(&bytes[NAME_OFFSET..NAME_OFFSET + name_len])
            .map_err(|_| StorageError::corruption("heap header file name is not UTF-8"))?
            .to_string();

        let first_page = PageId::new(read_u32(bytes, COUNTS_OFFSET + 8));
        let last_page = PageId::new(read_u32(bytes, COUNTS_OFFSET + 12));
        if !first_page.is_valid() || !last_page.is_valid() {
            return Err(StorageError::corruption("heap header has no data pages"));
        }

        Ok(Self {
            file_name,
            page_count: read_u32(bytes, COUNTS_OFFSET),
            record_count: read_u32(bytes, COUNTS_OFFSET + 4),
            first_page,
            last_page,
        })
    }

    /// Write this header to page bytes
    pub fn write(&self, bytes: &mut [u8]) {
        let len = PAGE_SIZE.min(bytes.len());
        bytes[..len].fill(0);

        bytes[0] = PageType::HeapHeader as u8;
        bytes[4..12].copy_from_slice(HEAP_MAGIC);

        let name = &self.file_name.as_bytes()[..self.file_name.len().min(MAX_FILE_NAME_LEN)];
        bytes[NAME_LEN_OFFSET] = name.len() as u8;
        bytes[NAME_OFFSET..NAME_OFFSET + name.len()].copy_from_slice(name);

        write_u32(bytes, COUNTS_OFFSET, self.page_count);
        write_u32(bytes, COUNTS_OFFSET + 4, self.record_count);
        write_u32(bytes, COUNTS_OFFSET + 8, self.first_page.value());
        write_u32(bytes, COUNTS_OFFSET + 12, self.last_page.value());

        let checksum = crc32fast::hash(&bytes[..CHECKSUM_OFFSET]);
        write_u32(bytes, CHECKSUM_OFFSET, checksum);
    }
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

fn write_u32(bytes: &mut [u8], offset: usize, value: u32) {
    bytes[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
}
