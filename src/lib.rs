//! # Heap Storage
//!
//! Record storage built from heap files: unordered collections of
//! variable-length records kept on a chain of slotted pages.
//!
//! ## Architecture
//!
//! The storage engine is composed of modular, swappable components:
//!
//! - **Page Layer** (`page`): Slotted data page format with a slot directory
//! - **Storage Layer** (`storage`): File managers and page I/O
//! - **Buffer Pool** (`buffer`): LRU page cache with pin counts and dirty tracking
//! - **Heap Layer** (`heap`): Heap files, filtered scans and inserts
//!
//! ## Usage
//!
//! ```rust,ignore
//! use heap_storage::{Config, Database, Operator, ScanFilter};
//!
//! let db = Database::open(Config::new("data"))?;
//! db.create_heap_file("orders")?;
//!
//! let mut insert = db.open_insert("orders")?;
//! let rid = insert.insert_record(&42i32.to_le_bytes())?;
//! insert.close()?;
//!
//! let mut scan = db.open_scan("orders")?;
//! scan.set_filter(Some(ScanFilter::integer(0, 40, Operator::Gt)));
//! while let Some(rid) = scan.scan_next()? {
//!     println!("{} -> {:?}", rid, scan.get_record()?);
//! }
//! scan.close()?;
//! ```

pub mod buffer;
pub mod error;
pub mod heap;
pub mod page;
pub mod storage;
pub mod types;

pub use error::{Result, StorageError};
pub use types::{FileId, PageId, RecordId, SlotId, PAGE_SIZE};

// Re-export main public API
pub use buffer::{BufferPool, PinnedPage};
pub use heap::{
    create_heap_file, destroy_heap_file, Datatype, FilterValue, HeapFile, HeapFileScan,
    HeapFileStats, InsertFileScan, Operator, ScanFilter,
};
pub use page::MAX_RECORD_SIZE;
pub use storage::{DiskFileManager, FileManager, MemoryFileManager};

use std::path::PathBuf;
use std::sync::Arc;
use types::DEFAULT_BUFFER_POOL_SIZE;

/// Database configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding one file per heap file
    pub dir: PathBuf,
    /// Buffer pool size in number of pages (default: 1000)
    pub buffer_pool_size: usize,
    /// Whether to sync writes immediately (default: false for performance)
    pub sync_on_write: bool,
}

impl Config {
    /// Create a new configuration with default settings
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self {
            dir: dir.into(),
            buffer_pool_size: DEFAULT_BUFFER_POOL_SIZE,
            sync_on_write: false,
        }
    }

    /// Set buffer pool size
    pub fn buffer_pool_size(mut self, size: usize) -> Self {
        self.buffer_pool_size = size;
        self
    }

    /// Enable sync on write for durability
    pub fn sync_on_write(mut self, enabled: bool) -> Self {
        self.sync_on_write = enabled;
        self
    }
}

/// Main database handle: a file manager and the buffer pool shared by every
/// heap file opened through it.
#[derive(Clone)]
pub struct Database {
    files: Arc<dyn FileManager>,
    pool: BufferPool,
}

impl Database {
    /// Open a database directory, creating it if needed
    pub fn open(config: Config) -> Result<Self> {
        let files = DiskFileManager::new(&config.dir, config.sync_on_write)?;
        Ok(Self::with_parts(
            Arc::new(files),
            BufferPool::new(config.buffer_pool_size),
        ))
    }

    /// A database whose files live only in memory
    pub fn in_memory(buffer_pool_size: usize) -> Self {
        Self::with_parts(
            Arc::new(MemoryFileManager::new()),
            BufferPool::new(buffer_pool_size),
        )
    }

    /// Assemble a database from an existing file manager and pool
    pub fn with_parts(files: Arc<dyn FileManager>, pool: BufferPool) -> Self {
        Self { files, pool }
    }

    pub fn buffer_pool(&self) -> &BufferPool {
        &self.pool
    }

    pub fn file_manager(&self) -> &Arc<dyn FileManager> {
        &self.files
    }

    pub fn create_heap_file(&self, name: &str) -> Result<()> {
        create_heap_file(self.files.as_ref(), &self.pool, name)
    }

    pub fn destroy_heap_file(&self, name: &str) -> Result<()> {
        destroy_heap_file(self.files.as_ref(), name)
    }

    pub fn open_heap_file(&self, name: &str) -> Result<HeapFile> {
        HeapFile::open(Arc::clone(&self.files), self.pool.clone(), name)
    }

    pub fn open_scan(&self, name: &str) -> Result<HeapFileScan> {
        HeapFileScan::open(Arc::clone(&self.files), self.pool.clone(), name)
    }

    pub fn open_insert(&self, name: &str) -> Result<InsertFileScan> {
        InsertFileScan::open(Arc::clone(&self.files), self.pool.clone(), name)
    }

    /// Flush all dirty pages to disk
    pub fn flush(&self) -> Result<()> {
        self.pool.flush_all()
    }
}
