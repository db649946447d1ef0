//! In-memory disk manager.
//!
//! Pages live in a `Vec` indexed by page number. Used for tests and for
//! databases that do not need to outlive the process.

use crate::error::{Result, StorageError};
use crate::page::PageBuf;
use crate::storage::DiskManager;
use crate::types::{FileId, PageId, PAGE_SIZE};
use parking_lot::Mutex;

/// In-memory page storage for one file
pub struct MemoryDiskManager {
    id: FileId,
    name: String,
    /// Index 0 stands in for the header page and is never handed out
    pages: Mutex<Vec<PageBuf>>,
}

impl MemoryDiskManager {
    pub fn new(id: FileId, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            pages: Mutex::new(vec![PageBuf::new()]),
        }
    }

    fn check_page(&self, page_id: PageId, page_count: usize) -> Result<()> {
        if page_id == PageId::HEADER {
            return Err(StorageError::invalid_operation(
                "cannot access file header page directly",
            ));
        }
        if page_id.value() as usize >= page_count {
            return Err(StorageError::PageNotFound(page_id));
        }
        Ok(())
    }
}

impl DiskManager for MemoryDiskManager {
    fn id(&self) -> FileId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn read_page(&self, page_id: PageId) -> Result<PageBuf> {
        let pages = self.pages.lock();
        self.check_page(page_id, pages.len())?;
        Ok(pages[page_id.value() as usize].clone())
    }

    fn write_page(&self, page_id: PageId, data: &[u8]) -> Result<()> {
        if data.len() != PAGE_SIZE {
            return Err(StorageError::invalid_operation(format!(
                "page data must be {} bytes, got {}",
                PAGE_SIZE,
                data.len()
            )));
        }

        let mut pages = self.pages.lock();
        self.check_page(page_id, pages.len())?;
        pages[page_id.value() as usize].copy_from_slice(data);
        Ok(())
    }

    fn allocate_page(&self) -> Result<PageId> {
        let mut pages = self.pages.lock();
        let page_id = PageId::new(pages.len() as u32);
        pages.push(PageBuf::new());
        Ok(page_id)
    }

    fn page_count(&self) -> u32 {
        self.pages.lock().len() as u32
    }

    fn sync(&self) -> Result<()> {
        Ok(())
    }
}
