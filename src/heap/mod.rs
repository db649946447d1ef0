//! Heap files: unordered record storage on a chain of slotted pages.
//!
//! A heap file is a header page followed by a singly linked list of data
//! pages. Records are addressed by `RecordId` and stay put until deleted.
//!
//! - `HeapFile` opens a file and fetches records by id
//! - `HeapFileScan` walks the chain returning records that pass a filter
//! - `InsertFileScan` appends records, linking new pages as pages fill up

mod file;
mod filter;
mod header;
mod insert;
mod scan;

pub use file::{HeapFile, HeapFileStats};
pub use filter::{Datatype, FilterValue, Operator, ScanFilter};
pub use header::{HeapFileHeader, HEAP_HEADER_SIZE, HEAP_MAGIC};
pub use insert::InsertFileScan;
pub use scan::HeapFileScan;

use crate::buffer::BufferPool;
use crate::error::Result;
use crate::page::SlottedPage;
use crate::storage::{FileHandle, FileManager};
use tracing::info;

/// Create an empty heap file: a header page and one empty data page.
///
/// Fails with `FileExists` if `name` is already present.
pub fn create_heap_file(files: &dyn FileManager, pool: &BufferPool, name: &str) -> Result<()> {
    files.create_file(name)?;
    let file = files.open_file(name)?;

    let result = format_heap_file(pool, &file, name);
    let closed = files.close_file(&file);
    result.and(closed)?;

    info!(file = name, "created heap file");
    Ok(())
}

fn format_heap_file(pool: &BufferPool, file: &FileHandle, name: &str) -> Result<()> {
    let (_, mut header_page) = pool.alloc_page(file)?;
    let (first_page_id, mut first_page) = pool.alloc_page(file)?;
    {
        let mut guard = first_page.write();
        SlottedPage::init(guard.as_bytes_mut(), first_page_id)?;
    }

    let header = HeapFileHeader::new(name, first_page_id)?;
    header.write(header_page.write().as_bytes_mut());

    header_page.release()?;
    first_page.release()?;
    pool.flush_file(file)
}

/// Remove a heap file that nobody has open
pub fn destroy_heap_file(files: &dyn FileManager, name: &str) -> Result<()> {
    files.destroy_file(name)?;
    info!(file = name, "destroyed heap file");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use crate::storage::MemoryFileManager;
    use crate::types::PageId;
    use std::sync::Arc;

    #[test]
    fn test_create_open_destroy() -> Result<()> {
        let files: Arc<dyn FileManager> = Arc::new(MemoryFileManager::new());
        let pool = BufferPool::new(3);

        create_heap_file(files.as_ref(), &pool, "t")?;
        assert!(matches!(
            create_heap_file(files.as_ref(), &pool, "t"),
            Err(StorageError::FileExists(_))
        ));
        assert!(pool.is_empty());

        let file = HeapFile::open(Arc::clone(&files), pool.clone(), "t")?;
        assert_eq!(file.name(), "t");
        let stats = file.stats()?;
        assert_eq!(stats.page_count, 1);
        assert_eq!(stats.record_count, 0);
        assert_eq!(stats.first_page, PageId::new(2));
        assert_eq!(stats.first_page, stats.last_page);
        assert_eq!(pool.pinned_count(), 2);

        assert!(matches!(
            destroy_heap_file(files.as_ref(), "t"),
            Err(StorageError::FileOpen(_))
        ));
        file.close()?;
        assert_eq!(pool.pinned_count(), 0);

        destroy_heap_file(files.as_ref(), "t")?;
        assert!(matches!(
            HeapFile::open(Arc::clone(&files), pool.clone(), "t"),
            Err(StorageError::FileNotFound(_))
        ));
        assert!(matches!(
            destroy_heap_file(files.as_ref(), "t"),
            Err(StorageError::FileNotFound(_))
        ));
        Ok(())
    }

    #[test]
    fn test_open_rejects_non_heap_file() -> Result<()> {
        let files: Arc<dyn FileManager> = Arc::new(MemoryFileManager::new());
        let pool = BufferPool::new(3);

        files.create_file("raw")?;
        let file = files.open_file("raw")?;
        file.allocate_page()?;
        files.close_file(&file)?;

        assert!(matches!(
            HeapFile::open(Arc::clone(&files), pool.clone(), "raw"),
            Err(StorageError::InvalidDatabaseFile(_))
        ));
        assert_eq!(pool.pinned_count(), 0);

        // The failed open released its reference
        files.destroy_file("raw")?;
        Ok(())
    }

    #[test]
    fn test_stats_serialize() -> Result<()> {
        let files: Arc<dyn FileManager> = Arc::new(MemoryFileManager::new());
        let pool = BufferPool::new(3);
        create_heap_file(files.as_ref(), &pool, "t")?;

        let file = HeapFile::open(files, pool, "t")?;
        let json = serde_json::to_value(file.stats()?).unwrap();
        assert_eq!(json["file_name"], "t");
        assert_eq!(json["first_page"], 2);
        assert_eq!(json["record_count"], 0);
        Ok(())
    }
}
