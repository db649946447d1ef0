//! Buffer pool implementation.
//!
//! The buffer pool manages a fixed number of in-memory page frames shared by
//! every open file, caching pages read from disk and writing dirty pages
//! back when they are evicted or flushed.

use crate::buffer::lru::LruCache;
use crate::error::{Result, StorageError};
use crate::page::PageBuf;
use crate::storage::FileHandle;
use crate::types::{FileId, PageId};
use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{trace, warn};

type FrameKey = (FileId, PageId);

/// A frame in the buffer pool
struct BufferFrame {
    /// File the page belongs to, for write-back
    file: FileHandle,
    /// The page data
    data: Arc<RwLock<PageBuf>>,
    /// Whether the page has been modified since it was last written
    dirty: bool,
    /// Pin count (number of active references)
    pin_count: u32,
}

struct PoolState {
    frames: HashMap<FrameKey, BufferFrame>,
    lru: LruCache<FrameKey>,
}

struct PoolInner {
    state: Mutex<PoolState>,
    capacity: usize,
}

/// Fixed-size page cache with pin counts and dirty tracking.
///
/// Cloning the pool hands out another handle to the same frames.
#[derive(Clone)]
pub struct BufferPool {
    inner: Arc<PoolInner>,
}

impl BufferPool {
    /// Create a pool with room for `capacity` pages
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                state: Mutex::new(PoolState {
                    frames: HashMap::with_capacity(capacity),
                    lru: LruCache::new(capacity),
                }),
                capacity,
            }),
        }
    }

    /// Maximum number of cached pages
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Number of pages currently cached
    pub fn len(&self) -> usize {
        self.inner.state.lock().frames.len()
    }

    /// Whether no pages are cached
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total outstanding pins across all frames
    pub fn pinned_count(&self) -> usize {
        let state = self.inner.state.lock();
        state.frames.values().map(|f| f.pin_count as usize).sum()
    }

    /// Pins held on one page
    pub fn pin_count(&self, file_id: FileId, page_id: PageId) -> u32 {
        let state = self.inner.state.lock();
        state
            .frames
            .get(&(file_id, page_id))
            .map_or(0, |f| f.pin_count)
    }

    /// Pin a page, reading it from its file if it is not cached
    pub fn pin(&self, file: &FileHandle, page_id: PageId) -> Result<PinnedPage> {
        let key = (file.id(), page_id);
        let mut guard = self.inner.state.lock();
        let state = &mut *guard;

        if let Some(frame) = state.frames.get_mut(&key) {
            frame.pin_count += 1;
            let data = Arc::clone(&frame.data);
            state.lru.access(key);
            return Ok(PinnedPage::new(self.clone(), key, data));
        }

        self.make_room(state)?;
        let page = file.read_page(page_id)?;
        let data = Arc::new(RwLock::new(page));
        state.frames.insert(
            key,
            BufferFrame {
                file: Arc::clone(file),
                data: Arc::clone(&data),
                dirty: false,
                pin_count: 1,
            },
        );
        state.lru.access(key);
        trace!(file = %key.0, page = %page_id, "page read into buffer pool");

        Ok(PinnedPage::new(self.clone(), key, data))
    }

    /// Drop one pin, recording whether the holder modified the page
    pub fn unpin(&self, file_id: FileId, page_id: PageId, dirty: bool) -> Result<()> {
        let key = (file_id, page_id);
        let mut guard = self.inner.state.lock();
        let state = &mut *guard;

        let frame = state
            .frames
            .get_mut(&key)
            .ok_or(StorageError::PageNotFound(page_id))?;
        if frame.pin_count == 0 {
            return Err(StorageError::PageNotPinned(page_id));
        }

        frame.pin_count -= 1;
        frame.dirty |= dirty;
        state.lru.access(key);
        Ok(())
    }

    /// Allocate a new zeroed page in `file` and pin it
    pub fn alloc_page(&self, file: &FileHandle) -> Result<(PageId, PinnedPage)> {
        let mut guard = self.inner.state.lock();
        let state = &mut *guard;

        self.make_room(state)?;
        let page_id = file.allocate_page()?;
        let key = (file.id(), page_id);
        let data = Arc::new(RwLock::new(PageBuf::new()));
        state.frames.insert(
            key,
            BufferFrame {
                file: Arc::clone(file),
                data: Arc::clone(&data),
                dirty: true,
                pin_count: 1,
            },
        );
        state.lru.access(key);

        let mut page = PinnedPage::new(self.clone(), key, data);
        page.mark_dirty();
        Ok((page_id, page))
    }

    /// Write back every dirty page of `file` and drop its unpinned frames
    pub fn flush_file(&self, file: &FileHandle) -> Result<()> {
        let mut guard = self.inner.state.lock();
        let state = &mut *guard;

        let keys: Vec<FrameKey> = state
            .frames
            .keys()
            .filter(|key| key.0 == file.id())
            .copied()
            .collect();

        for key in keys {
            let Some(frame) = state.frames.get_mut(&key) else {
                continue;
            };
            if frame.dirty {
                frame.file.write_page(key.1, frame.data.read().as_bytes())?;
                frame.dirty = false;
            }
            if frame.pin_count == 0 {
                state.frames.remove(&key);
                state.lru.remove(key);
            }
        }

        Ok(())
    }

    /// Write back all dirty pages and sync their files
    pub fn flush_all(&self) -> Result<()> {
        let mut state = self.inner.state.lock();
        let mut files: HashMap<FileId, FileHandle> = HashMap::new();

        for (&(file_id, page_id), frame) in state.frames.iter_mut() {
            if frame.dirty {
                frame.file.write_page(page_id, frame.data.read().as_bytes())?;
                frame.dirty = false;
            }
            files.entry(file_id).or_insert_with(|| Arc::clone(&frame.file));
        }

        for file in files.values() {
            file.sync()?;
        }
        Ok(())
    }

    /// Evict the least recently used unpinned frame if the pool is full
    fn make_room(&self, state: &mut PoolState) -> Result<()> {
        if state.frames.len() < self.inner.capacity {
            return Ok(());
        }

        let victim = state
            .lru
            .iter_lru()
            .find(|key| state.frames.get(key).map_or(true, |f| f.pin_count == 0))
            .ok_or(StorageError::BufferPoolExhausted)?;

        if let Some(frame) = state.frames.get(&victim) {
            if frame.dirty {
                frame.file.write_page(victim.1, frame.data.read().as_bytes())?;
            }
        }
        state.frames.remove(&victim);
        state.lru.remove(victim);
        trace!(file = %victim.0, page = %victim.1, "evicted page");

        Ok(())
    }
}

/// An owned pin on one buffered page.
///
/// The pin is released exactly once: by `release`, which reports unpin
/// failures, or otherwise when the value is dropped.
pub struct PinnedPage {
    pool: BufferPool,
    file_id: FileId,
    page_id: PageId,
    data: Arc<RwLock<PageBuf>>,
    dirty: bool,
    released: bool,
}

impl PinnedPage {
    fn new(pool: BufferPool, key: FrameKey, data: Arc<RwLock<PageBuf>>) -> Self {
        Self {
            pool,
            file_id: key.0,
            page_id: key.1,
            data,
            dirty: false,
            released: false,
        }
    }

    /// Get the page ID
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Get the file the page belongs to
    pub fn file_id(&self) -> FileId {
        self.file_id
    }

    /// Whether this holder has modified the page
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Record that the page must be written back
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Get a read lock on the page
    pub fn read(&self) -> PageRef<'_> {
        PageRef {
            guard: self.data.read(),
        }
    }

    /// Get a write lock on the page; marks it dirty
    pub fn write(&mut self) -> PageRefMut<'_> {
        self.dirty = true;
        PageRefMut {
            guard: self.data.write(),
        }
    }

    /// Unpin the page, passing on the dirty flag
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.pool.unpin(self.file_id, self.page_id, self.dirty)
    }
}

impl Drop for PinnedPage {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.pool.unpin(self.file_id, self.page_id, self.dirty) {
            warn!(file = %self.file_id, page = %self.page_id, error = %e, "failed to unpin page");
        }
    }
}

/// Reference to a page (through a read lock)
pub struct PageRef<'a> {
    guard: RwLockReadGuard<'a, PageBuf>,
}

impl<'a> std::ops::Deref for PageRef<'a> {
    type Target = PageBuf;

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

/// Mutable reference to a page (through a write lock)
pub struct PageRefMut<'a> {
    guard: RwLockWriteGuard<'a, PageBuf>,
}

impl<'a> std::ops::Deref for PageRefMut<'a> {
    type Target = PageBuf;

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl<'a> std::ops::DerefMut for PageRefMut<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}
