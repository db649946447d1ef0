//! Disk manager implementation.
//!
//! A disk manager owns one open file and is responsible for reading and
//! writing its pages. It abstracts the file I/O operations behind a trait
//! so that the rest of the system can be tested with in-memory files.

use crate::error::{Result, StorageError};
use crate::page::PageBuf;
use crate::storage::FileHeader;
use crate::types::{FileId, PageId, PAGE_SIZE};
use parking_lot::RwLock;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;

/// Shared handle to an open file
pub type FileHandle = Arc<dyn DiskManager>;

/// Trait for page I/O on one open file
///
/// Page 0 is reserved for the implementation's own header; callers allocate
/// and address pages from 1 upward.
pub trait DiskManager: Send + Sync {
    /// Identifier of this open file within the buffer pool
    fn id(&self) -> FileId;

    /// Name the file was opened under
    fn name(&self) -> &str;

    /// Read a page from disk
    fn read_page(&self, page_id: PageId) -> Result<PageBuf>;

    /// Write a page to disk
    fn write_page(&self, page_id: PageId, data: &[u8]) -> Result<()>;

    /// Allocate a new zeroed page at the end of the file
    fn allocate_page(&self) -> Result<PageId>;

    /// Total number of pages, header page included
    fn page_count(&self) -> u32;

    /// Sync all data to disk
    fn sync(&self) -> Result<()>;

    /// First page available to callers
    fn first_page(&self) -> Result<PageId> {
        let first = PageId::new(1);
        if self.page_count() > first.value() {
            Ok(first)
        } else {
            Err(StorageError::PageNotFound(first))
        }
    }
}

/// File-based disk manager implementation
pub struct DiskManagerImpl {
    id: FileId,
    name: String,
    /// The underlying file
    file: RwLock<File>,
    /// The file header (cached)
    header: RwLock<FileHeader>,
    /// Whether to sync on each write
    sync_on_write: bool,
}

impl DiskManagerImpl {
    /// Create a new file holding only the header page
    pub fn create(path: &Path) -> Result<()> {
        let mut file = match OpenOptions::new().read(true).write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StorageError::FileExists(path.display().to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        let mut buf = vec![0u8; PAGE_SIZE];
        FileHeader::new().write(&mut buf);
        file.write_all(&buf)?;
        file.sync_all()?;
        Ok(())
    }

    /// Open an existing file
    pub fn open(path: &Path, name: &str, id: FileId, sync_on_write: bool) -> Result<Self> {
        let mut file = match OpenOptions::new().read(true).write(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::FileNotFound(name.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        if file.metadata()?.len() < PAGE_SIZE as u64 {
            return Err(StorageError::invalid_db(format!("{} is shorter than one page", name)));
        }

        let mut buf = vec![0u8; PAGE_SIZE];
        file.read_exact(&mut buf)?;
        let header = FileHeader::read(&buf)?;

        Ok(Self {
            id,
            name: name.to_string(),
            file: RwLock::new(file),
            header: RwLock::new(header),
            sync_on_write,
        })
    }

    /// Get the file header
    pub fn header(&self) -> FileHeader {
        *self.header.read()
    }

    /// Flush the header to disk
    fn flush_header(&self) -> Result<()> {
        let header = self.header.read();
        let mut buf = vec![0u8; PAGE_SIZE];
        header.write(&mut buf);

        let mut file = self.file.write();
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&buf)?;

        if self.sync_on_write {
            file.sync_data()?;
        }

        Ok(())
    }

    fn check_page(&self, page_id: PageId) -> Result<()> {
        if page_id == PageId::HEADER {
            return Err(StorageError::invalid_operation(
                "cannot access file header page directly",
            ));
        }
        if page_id.value() >= self.header.read().page_count {
            return Err(StorageError::PageNotFound(page_id));
        }
        Ok(())
    }
}

impl DiskManager for DiskManagerImpl {
    fn id(&self) -> FileId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn read_page(&self, page_id: PageId) -> Result<PageBuf> {
        self.check_page(page_id)?;

        let offset = page_id.file_offset(PAGE_SIZE);
        let mut buf = PageBuf::new();

        let mut file = self.file.write();
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf.as_bytes_mut())?;

        Ok(buf)
    }

    fn write_page(&self, page_id: PageId, data: &[u8]) -> Result<()> {
        self.check_page(page_id)?;

        if data.len() != PAGE_SIZE {
            return Err(StorageError::invalid_operation(format!(
                "page data must be {} bytes, got {}",
                PAGE_SIZE,
                data.len()
            )));
        }

        let offset = page_id.file_offset(PAGE_SIZE);

        let mut file = self.file.write();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;

        if self.sync_on_write {
            file.sync_data()?;
        }

        Ok(())
    }

    fn allocate_page(&self) -> Result<PageId> {
        let page_id = self.header.write().allocate_page();

        // Extend the file
        let offset = page_id.file_offset(PAGE_SIZE);
        let zeros = vec![0u8; PAGE_SIZE];
        {
            let mut file = self.file.write();
            file.seek(SeekFrom::Start(offset))?;
            file.write_all(&zeros)?;
        }

        self.flush_header()?;

        Ok(page_id)
    }

    fn page_count(&self) -> u32 {
        self.header.read().page_count
    }

    fn sync(&self) -> Result<()> {
        self.flush_header()?;
        let file = self.file.write();
        file.sync_all()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open(path: &Path) -> Result<DiskManagerImpl> {
        DiskManagerImpl::open(path, "test", FileId(1), false)
    }

    #[test]
    fn test_create_new_file() -> Result<()> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        DiskManagerImpl::create(&path)?;
        let dm = open(&path)?;
        let header = dm.header();

        assert_eq!(header.page_count, 1);
        assert_eq!(header.page_size, PAGE_SIZE as u32);
        assert!(dm.first_page().is_err());

        Ok(())
    }

    #[test]
    fn test_create_existing_and_open_missing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        assert!(matches!(open(&path), Err(StorageError::FileNotFound(_))));
        DiskManagerImpl::create(&path).unwrap();
        assert!(matches!(
            DiskManagerImpl::create(&path),
            Err(StorageError::FileExists(_))
        ));
    }

    #[test]
    fn test_allocate_and_write_page() -> Result<()> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        DiskManagerImpl::create(&path)?;
        let dm = open(&path)?;

        let page_id = dm.allocate_page()?;
        assert_eq!(page_id, PageId::new(1));
        assert_eq!(dm.first_page()?, page_id);

        let mut data = vec![0u8; PAGE_SIZE];
        data[0..5].copy_from_slice(b"hello");
        dm.write_page(page_id, &data)?;

        let read_data = dm.read_page(page_id)?;
        assert_eq!(&read_data[0..5], b"hello");

        assert!(matches!(
            dm.read_page(PageId::new(9)),
            Err(StorageError::PageNotFound(_))
        ));
        assert!(dm.read_page(PageId::HEADER).is_err());

        Ok(())
    }

    #[test]
    fn test_reopen_file() -> Result<()> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        DiskManagerImpl::create(&path)?;

        {
            let dm = DiskManagerImpl::open(&path, "test", FileId(1), true)?;
            let page_id = dm.allocate_page()?;
            let mut data = vec![0u8; PAGE_SIZE];
            data[0..4].copy_from_slice(b"test");
            dm.write_page(page_id, &data)?;
        }

        {
            let dm = open(&path)?;
            assert_eq!(dm.page_count(), 2);

            let read_data = dm.read_page(PageId::new(1))?;
            assert_eq!(&read_data[0..4], b"test");
        }

        Ok(())
    }
}
