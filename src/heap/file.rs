//! Open heap file handle.

use crate::buffer::{BufferPool, PinnedPage};
use crate::error::{Result, StorageError};
use crate::heap::HeapFileHeader;
use crate::page::SlottedPage;
use crate::storage::{FileHandle, FileManager};
use crate::types::{PageId, RecordId};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Summary of a heap file, as reported by `HeapFile::stats`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeapFileStats {
    pub file_name: String,
    pub page_count: u32,
    pub record_count: u32,
    pub first_page: PageId,
    pub last_page: PageId,
}

/// An open heap file.
///
/// The header page stays pinned while the file is open, and at most one
/// data page (the current page) is pinned alongside it.
pub struct HeapFile {
    pub(super) files: Arc<dyn FileManager>,
    pub(super) pool: BufferPool,
    pub(super) file: FileHandle,
    /// Shared with every other handle on the file; the header is decoded
    /// from it on each use
    pub(super) header_page: Option<PinnedPage>,
    name: String,
    pub(super) first_page: PageId,
    pub(super) current_page: Option<PinnedPage>,
    /// `None` once a scan has walked off the end of the chain
    pub(super) current_page_id: Option<PageId>,
    pub(super) current_record: Option<RecordId>,
    closed: bool,
}

impl HeapFile {
    /// Open a heap file, pinning its header page and first data page
    pub fn open(files: Arc<dyn FileManager>, pool: BufferPool, name: &str) -> Result<Self> {
        info!(file = name, "opening heap file");
        let file = files.open_file(name)?;

        let (header_page, header, first_page) = match Self::pin_initial_pages(&pool, &file) {
            Ok(pages) => pages,
            Err(e) => {
                if let Err(close_err) = files.close_file(&file) {
                    warn!(file = name, error = %close_err, "failed to close heap file after open error");
                }
                return Err(e);
            }
        };

        Ok(Self {
            files,
            pool,
            file,
            current_page_id: Some(header.first_page),
            header_page: Some(header_page),
            name: header.file_name,
            first_page: header.first_page,
            current_page: Some(first_page),
            current_record: None,
            closed: false,
        })
    }

    fn pin_initial_pages(
        pool: &BufferPool,
        file: &FileHandle,
    ) -> Result<(PinnedPage, HeapFileHeader, PinnedPage)> {
        let header_page = pool.pin(file, file.first_page()?)?;
        let header = HeapFileHeader::read(header_page.read().as_bytes())?;

        let first_page = pool.pin(file, header.first_page)?;
        SlottedPage::open(first_page.read().as_bytes())?;

        Ok((header_page, header, first_page))
    }

    /// Name the file was created with
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of live records in the file
    pub fn record_count(&self) -> Result<u32> {
        Ok(self.header()?.record_count)
    }

    /// Current header, including changes made through other handles
    pub fn header(&self) -> Result<HeapFileHeader> {
        let page = self
            .header_page
            .as_ref()
            .ok_or_else(|| StorageError::invalid_operation("heap file is closed"))?;
        let guard = page.read();
        HeapFileHeader::read(guard.as_bytes())
    }

    pub fn stats(&self) -> Result<HeapFileStats> {
        let header = self.header()?;
        Ok(HeapFileStats {
            file_name: header.file_name,
            page_count: header.page_count,
            record_count: header.record_count,
            first_page: header.first_page,
            last_page: header.last_page,
        })
    }

    /// Record the scan or insert is positioned on
    pub fn current_record_id(&self) -> Option<RecordId> {
        self.current_record
    }

    /// Copy out the record at `rid`, making its page the current page
    pub fn get_record(&mut self, rid: RecordId) -> Result<Vec<u8>> {
        self.switch_to(rid.page_id)?;
        let record = self.with_current_page(|page| {
            page.get_record(rid.slot)
                .map(|record| record.to_vec())
                .map_err(|_| StorageError::SlotNotFound(rid))
        })?;
        self.current_record = Some(rid);
        Ok(record)
    }

    /// Close the file, reporting the first error from releasing its pages
    pub fn close(mut self) -> Result<()> {
        self.shutdown()
    }

    /// Make `page_id` the current page, pinning it if it is not already
    pub(super) fn switch_to(&mut self, page_id: PageId) -> Result<()> {
        if self.pinned_page_id() != Some(page_id) {
            self.release_current()?;
            let page = self.pool.pin(&self.file, page_id)?;
            self.current_page = Some(page);
        }
        self.current_page_id = Some(page_id);
        Ok(())
    }

    /// Id of the data page currently pinned, if any
    pub(super) fn pinned_page_id(&self) -> Option<PageId> {
        self.current_page.as_ref().map(PinnedPage::page_id)
    }

    /// Unpin the current data page
    pub(super) fn release_current(&mut self) -> Result<()> {
        match self.current_page.take() {
            Some(page) => page.release(),
            None => Ok(()),
        }
    }

    pub(super) fn with_current_page<R>(
        &self,
        f: impl FnOnce(&SlottedPage<&[u8]>) -> Result<R>,
    ) -> Result<R> {
        let pinned = self
            .current_page
            .as_ref()
            .ok_or_else(|| StorageError::invalid_operation("no data page is pinned"))?;
        let guard = pinned.read();
        let page = SlottedPage::open(guard.as_bytes())?;
        f(&page)
    }

    /// Run `f` on the current page, marking it dirty
    pub(super) fn with_current_page_mut<R>(
        &mut self,
        f: impl FnOnce(&mut SlottedPage<&mut [u8]>) -> Result<R>,
    ) -> Result<R> {
        let pinned = self
            .current_page
            .as_mut()
            .ok_or_else(|| StorageError::invalid_operation("no data page is pinned"))?;
        let mut guard = pinned.write();
        let mut page = SlottedPage::open(guard.as_bytes_mut())?;
        f(&mut page)
    }

    /// Decode the header page, apply `f` and write the result back while
    /// holding the page's write lock
    pub(super) fn update_header<R>(&mut self, f: impl FnOnce(&mut HeapFileHeader) -> R) -> Result<R> {
        let page = self
            .header_page
            .as_mut()
            .ok_or_else(|| StorageError::invalid_operation("heap file is closed"))?;
        let mut guard = page.write();
        let mut header = HeapFileHeader::read(guard.as_bytes())?;
        let result = f(&mut header);
        header.write(guard.as_bytes_mut());
        Ok(result)
    }

    /// Release both pinned pages, flush the file and close it.
    ///
    /// Every step runs even if an earlier one fails.
    pub(super) fn shutdown(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        debug!(file = %self.name, "closing heap file");

        let mut result = Ok(());
        let mut keep_first = |step: Result<()>| {
            if result.is_ok() {
                result = step;
            }
        };

        if let Some(page) = self.current_page.take() {
            keep_first(page.release());
        }
        if let Some(page) = self.header_page.take() {
            keep_first(page.release());
        }
        keep_first(self.pool.flush_file(&self.file));
        keep_first(self.files.close_file(&self.file));

        self.current_page_id = None;
        self.current_record = None;
        result
    }
}

impl Drop for HeapFile {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!(file = %self.name, error = %e, "error closing heap file");
        }
    }
}

impl std::fmt::Debug for HeapFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeapFile")
            .field("name", &self.name)
            .field("current_page_id", &self.current_page_id)
            .field("current_record", &self.current_record)
            .finish()
    }
}
