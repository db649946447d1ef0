//! File managers: create, open, close and destroy named files.
//!
//! Opening a name that is already open hands back the same handle, so every
//! object working on one file shares its pages in the buffer pool.

use crate::error::{Result, StorageError};
use crate::storage::{DiskManagerImpl, FileHandle, MemoryDiskManager};
use crate::types::FileId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Longest file name accepted by the file managers
pub const MAX_FILE_NAME_LEN: usize = 64;

/// Trait for file-level operations
pub trait FileManager: Send + Sync {
    /// Create an empty file; fails with `FileExists` if it is already there
    fn create_file(&self, name: &str) -> Result<()>;

    /// Open an existing file, or share the handle if it is already open
    fn open_file(&self, name: &str) -> Result<FileHandle>;

    /// Release one reference obtained from `open_file`
    fn close_file(&self, file: &FileHandle) -> Result<()>;

    /// Remove a file that nobody has open
    fn destroy_file(&self, name: &str) -> Result<()>;

    /// Whether a file with this name exists
    fn exists(&self, name: &str) -> bool;
}

/// Check that a name is usable as a single file name
pub fn validate_file_name(name: &str) -> Result<()> {
    if name.is_empty()
        || name.len() > MAX_FILE_NAME_LEN
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0'])
    {
        return Err(StorageError::InvalidFileName(name.to_string()));
    }
    Ok(())
}

struct OpenEntry {
    handle: FileHandle,
    refs: usize,
}

/// Reference-counted table of open files
#[derive(Default)]
struct OpenTable {
    entries: HashMap<String, OpenEntry>,
}

impl OpenTable {
    fn get(&mut self, name: &str) -> Option<FileHandle> {
        let entry = self.entries.get_mut(name)?;
        entry.refs += 1;
        Some(Arc::clone(&entry.handle))
    }

    fn insert(&mut self, handle: FileHandle) {
        self.entries.insert(
            handle.name().to_string(),
            OpenEntry {
                handle,
                refs: 1,
            },
        );
    }

    /// Drop one reference; returns the handle once the last one is gone
    fn release(&mut self, file: &FileHandle) -> Result<Option<FileHandle>> {
        let name = file.name();
        let entry = match self.entries.get_mut(name) {
            Some(entry) if entry.handle.id() == file.id() => entry,
            _ => {
                return Err(StorageError::invalid_operation(format!(
                    "file {} is not open",
                    name
                )))
            }
        };

        entry.refs -= 1;
        if entry.refs == 0 {
            Ok(self.entries.remove(name).map(|entry| entry.handle))
        } else {
            Ok(None)
        }
    }

    fn is_open(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }
}

struct DiskState {
    open: OpenTable,
    next_id: u32,
}

/// File manager keeping one file per name inside a directory
pub struct DiskFileManager {
    dir: PathBuf,
    sync_on_write: bool,
    state: Mutex<DiskState>,
}

impl DiskFileManager {
    /// Manage files inside `dir`, creating the directory if needed
    pub fn new(dir: &Path, sync_on_write: bool) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            sync_on_write,
            state: Mutex::new(DiskState {
                open: OpenTable::default(),
                next_id: 1,
            }),
        })
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

impl FileManager for DiskFileManager {
    fn create_file(&self, name: &str) -> Result<()> {
        validate_file_name(name)?;
        DiskManagerImpl::create(&self.path(name)).map_err(|e| match e {
            StorageError::FileExists(_) => StorageError::FileExists(name.to_string()),
            other => other,
        })
    }

    fn open_file(&self, name: &str) -> Result<FileHandle> {
        validate_file_name(name)?;
        let mut state = self.state.lock();
        if let Some(handle) = state.open.get(name) {
            return Ok(handle);
        }

        let id = FileId(state.next_id);
        let handle: FileHandle = Arc::new(DiskManagerImpl::open(
            &self.path(name),
            name,
            id,
            self.sync_on_write,
        )?);
        state.next_id += 1;
        state.open.insert(Arc::clone(&handle));
        Ok(handle)
    }

    fn close_file(&self, file: &FileHandle) -> Result<()> {
        let last = self.state.lock().open.release(file)?;
        if let Some(handle) = last {
            handle.sync()?;
        }
        Ok(())
    }

    fn destroy_file(&self, name: &str) -> Result<()> {
        validate_file_name(name)?;
        let state = self.state.lock();
        if state.open.is_open(name) {
            return Err(StorageError::FileOpen(name.to_string()));
        }

        match std::fs::remove_file(self.path(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::FileNotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self, name: &str) -> bool {
        validate_file_name(name).is_ok() && self.path(name).is_file()
    }
}

struct MemoryState {
    files: HashMap<String, FileHandle>,
    open: OpenTable,
    next_id: u32,
}

/// File manager whose files live only in memory
pub struct MemoryFileManager {
    state: Mutex<MemoryState>,
}

impl MemoryFileManager {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState {
                files: HashMap::new(),
                open: OpenTable::default(),
                next_id: 1,
            }),
        }
    }
}

impl Default for MemoryFileManager {
    fn default() -> Self {
        Self::new()
    }
}

impl FileManager for MemoryFileManager {
    fn create_file(&self, name: &str) -> Result<()> {
        validate_file_name(name)?;
        let mut state = self.state.lock();
        if state.files.contains_key(name) {
            return Err(StorageError::FileExists(name.to_string()));
        }

        let id = FileId(state.next_id);
        state.next_id += 1;
        state
            .files
            .insert(name.to_string(), Arc::new(MemoryDiskManager::new(id, name)));
        Ok(())
    }

    fn open_file(&self, name: &str) -> Result<FileHandle> {
        validate_file_name(name)?;
        let mut state = self.state.lock();
        if let Some(handle) = state.open.get(name) {
            return Ok(handle);
        }

        let handle = state
            .files
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::FileNotFound(name.to_string()))?;
        state.open.insert(Arc::clone(&handle));
        Ok(handle)
    }

    fn close_file(&self, file: &FileHandle) -> Result<()> {
        self.state.lock().open.release(file)?;
        Ok(())
    }

    fn destroy_file(&self, name: &str) -> Result<()> {
        validate_file_name(name)?;
        let mut state = self.state.lock();
        if state.open.is_open(name) {
            return Err(StorageError::FileOpen(name.to_string()));
        }
        state
            .files
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StorageError::FileNotFound(name.to_string()))
    }

    fn exists(&self, name: &str) -> bool {
        self.state.lock().files.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn exercise(files: &dyn FileManager) -> Result<()> {
        assert!(matches!(files.open_file("t1"), Err(StorageError::FileNotFound(_))));

        files.create_file("t1")?;
        assert!(files.exists("t1"));
        assert!(matches!(files.create_file("t1"), Err(StorageError::FileExists(_))));

        let a = files.open_file("t1")?;
        let b = files.open_file("t1")?;
        assert_eq!(a.id(), b.id());
        assert!(Arc::ptr_eq(&a, &b));

        let page = a.allocate_page()?;
        assert_eq!(b.page_count(), page.value() + 1);

        files.close_file(&a)?;
        assert!(matches!(files.destroy_file("t1"), Err(StorageError::FileOpen(_))));
        files.close_file(&b)?;
        assert!(files.close_file(&b).is_err());

        files.destroy_file("t1")?;
        assert!(!files.exists("t1"));
        assert!(matches!(files.destroy_file("t1"), Err(StorageError::FileNotFound(_))));
        Ok(())
    }

    #[test]
    fn test_memory_file_manager() -> Result<()> {
        exercise(&MemoryFileManager::new())
    }

    #[test]
    fn test_disk_file_manager() -> Result<()> {
        let dir = tempdir().unwrap();
        exercise(&DiskFileManager::new(dir.path(), false)?)
    }

    #[test]
    fn test_invalid_names() {
        let files = MemoryFileManager::new();
        for name in ["", "..", "a/b", "a\\b"] {
            assert!(matches!(
                files.create_file(name),
                Err(StorageError::InvalidFileName(_))
            ));
        }
        let long = "x".repeat(MAX_FILE_NAME_LEN + 1);
        assert!(files.create_file(&long).is_err());
        assert!(files.create_file(&"x".repeat(MAX_FILE_NAME_LEN)).is_ok());
    }
}
