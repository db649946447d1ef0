//! Data page header structure.
//!
//! The header occupies the first bytes of every heap data page and carries
//! the slot directory bookkeeping plus the page-chain link.

use crate::types::{PageId, PageType, PAGE_SIZE};

/// Size of the data page header
pub const DATA_PAGE_HEADER_SIZE: usize = 16;

/// Data page header
///
/// Layout (16 bytes, big-endian):
/// ```text
/// Offset  Size  Description
/// 0       1     Page type flag
/// 1       1     Reserved
/// 2       2     Number of slots in the directory
/// 4       2     Offset to start of record content area
/// 6       2     Bytes held by deleted records inside the content area
/// 8       4     This page's number
/// 12      4     Next page in the chain (u32::MAX if none)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataPageHeader {
    pub page_type: PageType,
    pub slot_count: u16,
    pub content_start: u16,
    pub fragmented_bytes: u16,
    pub page_id: PageId,
    pub next_page: Option<PageId>,
}

impl DataPageHeader {
    /// Header for a freshly initialized, empty page
    pub fn new(page_id: PageId) -> Self {
        Self {
            page_type: PageType::HeapData,
            slot_count: 0,
            content_start: PAGE_SIZE as u16,
            fragmented_bytes: 0,
            page_id,
            next_page: None,
        }
    }

    /// Read a data page header from bytes
    pub fn read(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < DATA_PAGE_HEADER_SIZE {
            return None;
        }

        let page_type = PageType::from_byte(bytes[0])?;
        let slot_count = u16::from_be_bytes([bytes[2], bytes[3]]);
        let content_start = u16::from_be_bytes([bytes[4], bytes[5]]);
        let fragmented_bytes = u16::from_be_bytes([bytes[6], bytes[7]]);
        let page_id = u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
        let next_page = u32::from_be_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]);

        Some(Self {
            page_type,
            slot_count,
            content_start,
            fragmented_bytes,
            page_id: PageId::new(page_id),
            next_page: PageId::from_link(next_page),
        })
    }

    /// Write this header to bytes
    pub fn write(&self, bytes: &mut [u8]) {
        bytes[0] = self.page_type as u8;
        bytes[1] = 0;
        bytes[2..4].copy_from_slice(&self.slot_count.to_be_bytes());
        bytes[4..6].copy_from_slice(&self.content_start.to_be_bytes());
        bytes[6..8].copy_from_slice(&self.fragmented_bytes.to_be_bytes());
        bytes[8..12].copy_from_slice(&self.page_id.value().to_be_bytes());
        bytes[12..16].copy_from_slice(&PageId::to_link(self.next_page).to_be_bytes());
    }

    /// End of the slot directory
    pub fn slot_array_end(&self) -> usize {
        DATA_PAGE_HEADER_SIZE + self.slot_count as usize * super::SLOT_SIZE
    }

    /// Contiguous free bytes between the slot directory and record content
    pub fn free_space(&self) -> usize {
        (self.content_start as usize).saturating_sub(self.slot_array_end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_roundtrip() {
        let header = DataPageHeader {
            page_type: PageType::HeapData,
            slot_count: 5,
            content_start: 3500,
            fragmented_bytes: 10,
            page_id: PageId::new(9),
            next_page: Some(PageId::new(12)),
        };

        let mut bytes = [0u8; DATA_PAGE_HEADER_SIZE];
        header.write(&mut bytes);

        assert_eq!(DataPageHeader::read(&bytes), Some(header));
    }

    #[test]
    fn test_chain_end_is_none() {
        let header = DataPageHeader::new(PageId::new(3));
        let mut bytes = [0u8; DATA_PAGE_HEADER_SIZE];
        header.write(&mut bytes);

        assert_eq!(&bytes[12..16], &[0xFF; 4]);
        assert_eq!(DataPageHeader::read(&bytes).unwrap().next_page, None);
    }

    #[test]
    fn test_free_space() {
        let header = DataPageHeader::new(PageId::new(1));
        assert_eq!(header.free_space(), PAGE_SIZE - DATA_PAGE_HEADER_SIZE);
    }
}
