//! Appending records to a heap file.

use crate::buffer::BufferPool;
use crate::error::{Result, StorageError};
use crate::heap::HeapFile;
use crate::page::{SlottedPage, MAX_RECORD_SIZE};
use crate::storage::FileManager;
use crate::types::RecordId;
use std::sync::Arc;
use tracing::debug;

/// Inserts records at the end of a heap file, growing the page chain as needed
#[derive(Debug)]
pub struct InsertFileScan {
    file: HeapFile,
}

impl InsertFileScan {
    /// Open `name` for inserts
    pub fn open(files: Arc<dyn FileManager>, pool: BufferPool, name: &str) -> Result<Self> {
        Ok(Self {
            file: HeapFile::open(files, pool, name)?,
        })
    }

    pub fn file(&self) -> &HeapFile {
        &self.file
    }

    pub fn record_count(&self) -> Result<u32> {
        self.file.record_count()
    }

    /// Store a copy of `record` and return its id
    pub fn insert_record(&mut self, record: &[u8]) -> Result<RecordId> {
        if record.len() > MAX_RECORD_SIZE {
            return Err(StorageError::InvalidRecordLength {
                size: record.len(),
                max: MAX_RECORD_SIZE,
            });
        }

        if self.file.current_page.is_none() {
            let last_page = self.file.header()?.last_page;
            self.file.switch_to(last_page)?;
        }

        loop {
            match self
                .file
                .with_current_page_mut(|page| page.insert_record(record))
            {
                Ok(slot) => {
                    let page_id = self
                        .file
                        .pinned_page_id()
                        .ok_or_else(|| StorageError::invalid_operation("no data page is pinned"))?;
                    let rid = RecordId::new(page_id, slot);

                    self.file.current_record = Some(rid);
                    self.file
                        .update_header(|header| header.record_count += 1)?;
                    return Ok(rid);
                }
                Err(e) if e.is_page_full() => {
                    // Another handle may have grown the chain since this page was pinned
                    let last_page = self.file.header()?.last_page;
                    if self.file.pinned_page_id() == Some(last_page) {
                        self.append_page()?;
                    } else {
                        self.file.switch_to(last_page)?;
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Link a fresh page after the last page and make it current
    fn append_page(&mut self) -> Result<()> {
        let file = &mut self.file;

        // Allocated pages are never returned to the file, so everything that
        // can fail on the old tail is checked before allocating.
        let is_tail = file.with_current_page(|page| Ok(page.next_page().is_none()))?;
        if !is_tail {
            return Err(StorageError::invalid_operation(
                "current page is not the end of the chain",
            ));
        }

        let (new_page_id, mut new_page) = file.pool.alloc_page(&file.file)?;
        {
            let mut guard = new_page.write();
            SlottedPage::init(guard.as_bytes_mut(), new_page_id)?;
        }

        file.with_current_page_mut(|page| {
            page.set_next_page(Some(new_page_id));
            Ok(())
        })?;
        let previous = file.update_header(|header| {
            let previous = header.last_page;
            header.last_page = new_page_id;
            header.page_count += 1;
            previous
        })?;
        debug!(
            file = %file.name(),
            page = %new_page_id,
            after = %previous,
            "appended heap page"
        );

        if let Some(mut full_page) = file.current_page.take() {
            full_page.mark_dirty();
            full_page.release()?;
        }
        file.current_page = Some(new_page);
        file.current_page_id = Some(new_page_id);
        file.current_record = None;
        Ok(())
    }

    /// Close the file, writing back the last page touched
    pub fn close(mut self) -> Result<()> {
        self.mark_current_dirty();
        self.file.shutdown()
    }

    fn mark_current_dirty(&mut self) {
        if let Some(page) = self.file.current_page.as_mut() {
            page.mark_dirty();
        }
    }
}

impl Drop for InsertFileScan {
    fn drop(&mut self) {
        self.mark_current_dirty();
    }
}
