//! Slotted data page implementation.
//!
//! A data page uses the following layout:
//! ```text
//! ┌────────────────────────────────────────────────────┐
//! │                 Data Page Header                    │
//! ├────────────────────────────────────────────────────┤
//! │                  Slot Directory                     │
//! │  [slot0][slot1][slot2]...      →                   │
//! ├────────────────────────────────────────────────────┤
//! │                                                    │
//! │                   Free Space                        │
//! │                                                    │
//! ├────────────────────────────────────────────────────┤
//! │                 Record Content Area                 │
//! │      ←  [rec2][rec1][rec0]                         │
//! └────────────────────────────────────────────────────┘
//! ```
//!
//! Slots are never renumbered while their record is live. Deleting a record
//! empties its slot, and the next insert may reuse it.

use crate::error::{Result, StorageError};
use crate::page::{DataPageHeader, Slot, DATA_PAGE_HEADER_SIZE, SLOT_SIZE};
use crate::types::{PageId, PageType, RecordId, SlotId, PAGE_SIZE};

/// Largest record that fits on an empty page
pub const MAX_RECORD_SIZE: usize = PAGE_SIZE - DATA_PAGE_HEADER_SIZE - SLOT_SIZE;

/// A slotted view over the bytes of one data page.
///
/// `B` is usually `&[u8]` for reads or `&mut [u8]` for writes into a
/// pinned buffer frame.
pub struct SlottedPage<B> {
    /// The raw page data
    data: B,
    /// Cached header (kept in sync with data)
    header: DataPageHeader,
}

impl<B: AsRef<[u8]>> SlottedPage<B> {
    /// Interpret existing bytes as an initialized data page
    pub fn open(data: B) -> Result<Self> {
        let bytes = data.as_ref();
        if bytes.len() != PAGE_SIZE {
            return Err(StorageError::invalid_page(format!(
                "page data must be {} bytes, got {}",
                PAGE_SIZE,
                bytes.len()
            )));
        }

        let header = DataPageHeader::read(bytes)
            .ok_or_else(|| StorageError::invalid_page("unknown page type"))?;
        if header.page_type != PageType::HeapData {
            return Err(StorageError::invalid_page(format!(
                "expected a data page, found {:?}",
                header.page_type
            )));
        }
        if header.slot_array_end() > header.content_start as usize
            || header.content_start as usize > PAGE_SIZE
        {
            return Err(StorageError::corruption(format!(
                "page {}: slot directory overlaps record content",
                header.page_id
            )));
        }

        Ok(Self { data, header })
    }

    /// Get the page header
    pub fn header(&self) -> &DataPageHeader {
        &self.header
    }

    /// The number this page was initialized with
    pub fn page_id(&self) -> PageId {
        self.header.page_id
    }

    /// Next page in the chain, `None` at the end
    pub fn next_page(&self) -> Option<PageId> {
        self.header.next_page
    }

    /// Number of entries in the slot directory, empty ones included
    pub fn slot_count(&self) -> usize {
        self.header.slot_count as usize
    }

    /// Contiguous free space
    pub fn free_space(&self) -> usize {
        self.header.free_space()
    }

    /// Get the raw bytes of this page
    pub fn as_bytes(&self) -> &[u8] {
        self.data.as_ref()
    }

    fn slot(&self, slot: SlotId) -> Slot {
        let offset = DATA_PAGE_HEADER_SIZE + slot as usize * SLOT_SIZE;
        Slot::read(&self.data.as_ref()[offset..offset + SLOT_SIZE])
    }

    fn live_slot(&self, slot: SlotId) -> Result<Slot> {
        if (slot as usize) < self.slot_count() {
            let entry = self.slot(slot);
            if !entry.is_empty() && entry.range().end <= PAGE_SIZE {
                return Ok(entry);
            }
        }
        Err(StorageError::SlotNotFound(RecordId::new(self.page_id(), slot)))
    }

    fn live_from(&self, start: usize) -> Option<SlotId> {
        (start..self.slot_count())
            .map(|i| i as SlotId)
            .find(|&i| !self.slot(i).is_empty())
    }

    /// Get the bytes of the record in `slot`
    pub fn get_record(&self, slot: SlotId) -> Result<&[u8]> {
        let entry = self.live_slot(slot)?;
        Ok(&self.data.as_ref()[entry.range()])
    }

    /// First live slot, or `None` if the page holds no records
    pub fn first_record(&self) -> Option<SlotId> {
        self.live_from(0)
    }

    /// Next live slot after `after`, or `None` at the end of the page.
    ///
    /// `after` does not need to be live, so iteration can continue from a
    /// record that was just deleted.
    pub fn next_record(&self, after: SlotId) -> Option<SlotId> {
        self.live_from(after as usize + 1)
    }

    /// Number of live records on the page
    pub fn record_count(&self) -> usize {
        (0..self.slot_count())
            .filter(|&i| !self.slot(i as SlotId).is_empty())
            .count()
    }

    /// Iterate over live records in slot order
    pub fn records(&self) -> impl Iterator<Item = (SlotId, &[u8])> + '_ {
        (0..self.slot_count()).filter_map(move |i| {
            let slot = i as SlotId;
            self.get_record(slot).ok().map(|bytes| (slot, bytes))
        })
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> SlottedPage<B> {
    /// Format `data` as an empty data page
    pub fn init(mut data: B, page_id: PageId) -> Result<Self> {
        let bytes = data.as_mut();
        if bytes.len() != PAGE_SIZE {
            return Err(StorageError::invalid_page(format!(
                "page data must be {} bytes, got {}",
                PAGE_SIZE,
                bytes.len()
            )));
        }

        bytes.fill(0);
        let header = DataPageHeader::new(page_id);
        header.write(bytes);
        Ok(Self { data, header })
    }

    /// Link this page to the next one in the chain
    pub fn set_next_page(&mut self, next: Option<PageId>) {
        self.header.next_page = next;
        self.sync_header();
    }

    /// Insert a record, returning its slot.
    ///
    /// Fails with `PageFull` when the record does not fit even after the
    /// content area is compacted.
    pub fn insert_record(&mut self, record: &[u8]) -> Result<SlotId> {
        if record.len() > MAX_RECORD_SIZE {
            return Err(StorageError::InvalidRecordLength {
                size: record.len(),
                max: MAX_RECORD_SIZE,
            });
        }

        let reuse = (0..self.header.slot_count).find(|&i| self.slot(i).is_empty());
        let needed = record.len() + if reuse.is_some() { 0 } else { SLOT_SIZE };

        if self.free_space() < needed {
            let available = self.free_space() + self.header.fragmented_bytes as usize;
            if available < needed {
                return Err(StorageError::PageFull {
                    page_id: self.page_id(),
                    needed,
                    available,
                });
            }
            self.compact();
        }

        let slot = match reuse {
            Some(slot) => slot,
            None => {
                self.header.slot_count += 1;
                self.header.slot_count - 1
            }
        };

        let offset = self.header.content_start as usize - record.len();
        self.data.as_mut()[offset..offset + record.len()].copy_from_slice(record);
        self.header.content_start = offset as u16;
        self.set_slot(
            slot,
            Slot {
                offset: offset as u16,
                length: record.len() as u16,
            },
        );
        self.sync_header();

        Ok(slot)
    }

    /// Delete the record in `slot`
    pub fn delete_record(&mut self, slot: SlotId) -> Result<()> {
        let entry = self.live_slot(slot)?;
        self.set_slot(slot, Slot::EMPTY);
        self.header.fragmented_bytes += entry.length;

        // Trailing empty slots give their directory space back
        while self.header.slot_count > 0 && self.slot(self.header.slot_count - 1).is_empty() {
            self.header.slot_count -= 1;
        }

        self.sync_header();
        Ok(())
    }

    /// Mutable access to a record's bytes for in-place updates
    pub fn record_mut(&mut self, slot: SlotId) -> Result<&mut [u8]> {
        let entry = self.live_slot(slot)?;
        Ok(&mut self.data.as_mut()[entry.range()])
    }

    /// Move all live records to the end of the page, reclaiming the space
    /// left behind by deletions. Slot numbers do not change.
    pub fn compact(&mut self) {
        let live: Vec<(SlotId, Vec<u8>)> = self
            .records()
            .map(|(slot, bytes)| (slot, bytes.to_vec()))
            .collect();

        let mut content_start = PAGE_SIZE;
        for (slot, bytes) in live {
            content_start -= bytes.len();
            self.data.as_mut()[content_start..content_start + bytes.len()].copy_from_slice(&bytes);
            self.set_slot(
                slot,
                Slot {
                    offset: content_start as u16,
                    length: bytes.len() as u16,
                },
            );
        }

        self.header.content_start = content_start as u16;
        self.header.fragmented_bytes = 0;
        self.sync_header();
    }

    fn set_slot(&mut self, slot: SlotId, entry: Slot) {
        let offset = DATA_PAGE_HEADER_SIZE + slot as usize * SLOT_SIZE;
        entry.write(&mut self.data.as_mut()[offset..offset + SLOT_SIZE]);
    }

    /// Sync the header to the raw page data
    fn sync_header(&mut self) {
        self.header.write(self.data.as_mut());
    }
}
